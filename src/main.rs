//! Task Assignment Engine
//!
//! Command-line entry points over the assignment engine: automated and
//! manual assignment, scoring, and candidate pool inspection.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use task_assign_engine::config::Config;
use task_assign_engine::db::Database;
use task_assign_engine::engine::AssignmentEngine;
use task_assign_engine::types::{Actor, TaskDescriptor, TaskInput};
use tracing::info;

#[derive(Parser)]
#[command(name = "task-assign-engine", version, about)]
struct Cli {
    /// Path to a config file (default: .task-assign/config.yaml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a task from a JSON file and immediately try auto-assignment.
    CreateTask {
        /// Path to a JSON file with the task input.
        file: PathBuf,
        /// Skip the automated assignment after creation.
        #[arg(long)]
        no_auto_assign: bool,
    },
    /// Run automated assignment for an existing unassigned task.
    AutoAssign {
        task_id: String,
    },
    /// Suggest assignees for a batch of task descriptors (JSON array file).
    BatchAutoAssign {
        file: PathBuf,
    },
    /// Manually assign a task to a candidate.
    Assign {
        task_id: String,
        #[arg(long)]
        candidate: String,
        /// Acting identity id.
        #[arg(long)]
        actor: String,
        /// Treat the actor as staff.
        #[arg(long)]
        staff: bool,
        /// Override an assignment lock (staff only).
        #[arg(long)]
        force: bool,
    },
    /// Score one candidate against one task.
    Score {
        task_id: String,
        #[arg(long)]
        candidate: String,
    },
    /// Show the current candidate pool.
    Candidates {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List tasks visible to an identity, including unresolved suggestions.
    MyTasks {
        identity_id: String,
    },
    /// Show task counts for an identity.
    Stats {
        identity_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    task_assign_engine::logging::init(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(),
    };
    config.ensure_db_dir()?;

    let db = Database::open(&config.server.db_path)?;
    let mut engine = AssignmentEngine::new(db.clone(), config.engine.clone());

    match cli.command {
        Command::CreateTask { file, no_auto_assign } => {
            let input: TaskInput = serde_json::from_str(&std::fs::read_to_string(&file)?)?;
            let task = db.create_task(input)?;
            info!(task_id = %task.id, "task created");

            if no_auto_assign {
                println!("{}", serde_json::to_string_pretty(&task)?);
            } else {
                let outcome = engine.auto_assign(&task.id).await?;
                let fresh = db
                    .get_task(&task.id)?
                    .ok_or_else(|| anyhow!("task vanished after creation"))?;
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "task": fresh,
                        "choice": outcome.choice,
                        "diagnostics": outcome.diagnostics,
                    }))?
                );
            }
        }
        Command::AutoAssign { task_id } => {
            let outcome = engine.auto_assign(&task_id).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "assignee": outcome.assignee,
                    "choice": outcome.choice,
                    "diagnostics": outcome.diagnostics,
                }))?
            );
        }
        Command::BatchAutoAssign { file } => {
            let tasks: Vec<TaskDescriptor> =
                serde_json::from_str(&std::fs::read_to_string(&file)?)?;
            let choices = engine.batch_auto_assign(&tasks).await?;
            println!("{}", serde_json::to_string_pretty(&choices)?);
        }
        Command::Assign {
            task_id,
            candidate,
            actor,
            staff,
            force,
        } => {
            let actor = Actor {
                id: actor,
                is_staff: staff,
            };
            let task = engine.assign(&task_id, &candidate, &actor, force)?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        Command::Score { task_id, candidate } => {
            let task = db
                .get_task(&task_id)?
                .ok_or_else(|| anyhow!("task {} not found", task_id))?;
            let descriptor = TaskDescriptor::from_task(&task);
            let pool = engine.load_candidates()?;
            let cand = pool
                .into_iter()
                .find(|c| c.id == candidate)
                .ok_or_else(|| anyhow!("candidate {} not in the pool", candidate))?;

            let breakdown = engine.score(&descriptor, &cand);
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "score": breakdown.score,
                    "reason": breakdown.reason,
                    "overlap": breakdown.overlap,
                }))?
            );
        }
        Command::Candidates { limit } => {
            let pool = match limit {
                Some(limit) => {
                    let mut cfg = config.engine.clone();
                    cfg.candidate_limit = limit;
                    AssignmentEngine::new(db.clone(), cfg).load_candidates()?
                }
                None => engine.load_candidates()?,
            };
            println!("{}", serde_json::to_string_pretty(&pool)?);
        }
        Command::MyTasks { identity_id } => {
            let tasks = db.list_tasks_for_identity(&identity_id)?;
            println!("{}", serde_json::to_string_pretty(&tasks)?);
        }
        Command::Stats { identity_id } => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "total_created": db.count_tasks_created_by(&identity_id)?,
                    "currently_assigned": db.count_assigned_to(&identity_id)?,
                }))?
            );
        }
    }

    Ok(())
}
