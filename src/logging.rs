//! Tracing setup for the CLI.

use tracing_subscriber::{EnvFilter, fmt};

/// Initialize the global tracing subscriber.
///
/// Respects `RUST_LOG` when set; otherwise logs the crate at `info`
/// (or `debug` with `verbose`).
pub fn init(verbose: bool) {
    let default_directive = if verbose {
        "task_assign_engine=debug"
    } else {
        "task_assign_engine=info"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
