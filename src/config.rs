//! Configuration loading and management.
//!
//! The engine takes an explicit [`EngineConfig`] value at construction time;
//! nothing reads ambient global state after startup.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub engine: EngineConfig,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".task-assign/tasks.db")
}

/// Assignment engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum candidates loaded per invocation (bounds downstream cost).
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: usize,

    /// Maximum tasks per batch auto-assign call.
    #[serde(default = "default_max_batch")]
    pub max_batch_size: usize,

    #[serde(default)]
    pub advisor: AdvisorConfig,

    #[serde(default)]
    pub weights: ScoringWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            candidate_limit: default_candidate_limit(),
            max_batch_size: default_max_batch(),
            advisor: AdvisorConfig::default(),
            weights: ScoringWeights::default(),
        }
    }
}

fn default_candidate_limit() -> usize {
    200
}

fn default_max_batch() -> usize {
    25
}

/// External advisor (LLM service) configuration. The advisor is only used
/// when an API key is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorConfig {
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    /// Chat-completions endpoint. Overridable for testing.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout; on expiry the engine falls back deterministically.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            endpoint: default_endpoint(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl AdvisorConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_max_tokens() -> u32 {
    800
}

fn default_timeout_seconds() -> u64 {
    20
}

/// Scoring constants. These are ad hoc tuning values carried over from the
/// original heuristic; they are named and overridable rather than fixed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Cap on the skill-overlap component.
    #[serde(default = "d_skill_cap")]
    pub skill_cap: f64,
    /// Points per overlapping required skill.
    #[serde(default = "d_skill_per_overlap")]
    pub skill_per_overlap: f64,
    /// Years of experience beyond this cap do not add score.
    #[serde(default = "d_experience_cap_years")]
    pub experience_cap_years: f64,
    /// Weight of the experience component at the cap.
    #[serde(default = "d_experience_weight")]
    pub experience_weight: f64,
    /// Points for a developer-type match.
    #[serde(default = "d_dev_type_match")]
    pub dev_type_match: f64,
    /// Seniority bonus at >= 8 years.
    #[serde(default = "d_senior_bonus")]
    pub senior_bonus: f64,
    /// Seniority bonus at >= 5 years.
    #[serde(default = "d_mid_bonus")]
    pub mid_bonus: f64,
    /// Experience deduction when required skills exist but none overlap.
    #[serde(default = "d_no_overlap_penalty")]
    pub no_overlap_penalty: f64,
    /// Experience floor granted when dev-type matches despite zero overlap.
    #[serde(default = "d_no_overlap_floor")]
    pub no_overlap_floor: f64,
    /// Penalty per currently-assigned task.
    #[serde(default = "d_load_penalty_per_task")]
    pub load_penalty_per_task: f64,
    /// Cap on the workload penalty.
    #[serde(default = "d_load_penalty_cap")]
    pub load_penalty_cap: f64,
    /// Per-prior-selection deduction within one batch call.
    #[serde(default = "d_diversity_penalty")]
    pub diversity_penalty: f64,
    /// Width of the top band considered tied for selection.
    #[serde(default = "d_tie_band")]
    pub tie_band: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            skill_cap: d_skill_cap(),
            skill_per_overlap: d_skill_per_overlap(),
            experience_cap_years: d_experience_cap_years(),
            experience_weight: d_experience_weight(),
            dev_type_match: d_dev_type_match(),
            senior_bonus: d_senior_bonus(),
            mid_bonus: d_mid_bonus(),
            no_overlap_penalty: d_no_overlap_penalty(),
            no_overlap_floor: d_no_overlap_floor(),
            load_penalty_per_task: d_load_penalty_per_task(),
            load_penalty_cap: d_load_penalty_cap(),
            diversity_penalty: d_diversity_penalty(),
            tie_band: d_tie_band(),
        }
    }
}

fn d_skill_cap() -> f64 {
    60.0
}
fn d_skill_per_overlap() -> f64 {
    15.0
}
fn d_experience_cap_years() -> f64 {
    20.0
}
fn d_experience_weight() -> f64 {
    25.0
}
fn d_dev_type_match() -> f64 {
    15.0
}
fn d_senior_bonus() -> f64 {
    5.0
}
fn d_mid_bonus() -> f64 {
    3.0
}
fn d_no_overlap_penalty() -> f64 {
    10.0
}
fn d_no_overlap_floor() -> f64 {
    18.0
}
fn d_load_penalty_per_task() -> f64 {
    5.0
}
fn d_load_penalty_cap() -> f64 {
    20.0
}
fn d_diversity_penalty() -> f64 {
    8.0
}
fn d_tie_band() -> f64 {
    3.0
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from the default location, then apply environment
    /// variable overrides.
    pub fn load_or_default() -> Self {
        let mut config =
            Self::load(".task-assign/config.yaml").unwrap_or_default();

        if let Ok(db_path) = std::env::var("TASK_ASSIGN_DB_PATH") {
            config.server.db_path = PathBuf::from(db_path);
        }

        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.is_empty() {
                config.engine.advisor.api_key = Some(key);
            }
        }

        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            config.engine.advisor.model = model;
        }

        if let Ok(max_tokens) = std::env::var("OPENAI_MAX_TOKENS") {
            if let Ok(max_tokens) = max_tokens.parse() {
                config.engine.advisor.max_tokens = max_tokens;
            }
        }

        if let Ok(limit) = std::env::var("OPENAI_MAX_CANDIDATES") {
            if let Ok(limit) = limit.parse() {
                config.engine.candidate_limit = limit;
            }
        }

        if let Ok(timeout) = std::env::var("ADVISOR_TIMEOUT_SECONDS") {
            if let Ok(timeout) = timeout.parse() {
                config.engine.advisor.timeout_seconds = timeout;
            }
        }

        config
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.server.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}
