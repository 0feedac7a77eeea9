use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_i64(profile: &str, key: &str, default: i64) -> i64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub controller: ControllerConfig,
    pub server: ServerConfig,
    pub aws: AwsConfig,
    pub queue: QueueConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `CAIRN_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("CAIRN_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            controller: ControllerConfig::from_env_profiled(p),
            server: ServerConfig::from_env_profiled(p),
            aws: AwsConfig::from_env_profiled(p),
            queue: QueueConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  controller:  frequency={}s, leader={}, tables={}",
            self.controller.task_manager_frequency_secs,
            self.controller.leader,
            self.controller.table_config_dir.display()
        );
        tracing::info!("  server:      {}:{}", self.server.host, self.server.port);
        tracing::info!("  queue:       backend={}, prefix={}", self.queue.backend, self.queue.name_prefix);
        tracing::info!(
            "  aws:         region={}, credentials={}",
            self.aws.region,
            if self.aws.has_static_credentials() { "static" } else { "(default chain)" }
        );
    }

    /// Return a redacted view safe for API responses (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "controller": {
                "task_manager_frequency_secs": self.controller.task_manager_frequency_secs,
                "leader": self.controller.leader,
                "table_config_dir": self.controller.table_config_dir,
            },
            "server": { "host": self.server.host, "port": self.server.port },
            "queue": { "backend": self.queue.backend, "name_prefix": self.queue.name_prefix },
            "aws": { "region": self.aws.region, "endpoint_url": self.aws.endpoint_url },
        })
    }
}

// ── Controller ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Seconds between scheduling passes. Validated by the periodic runner,
    /// so a non-positive value here is kept as-is and rejected at startup.
    pub task_manager_frequency_secs: i64,
    /// Standalone controllers are always leader; followers never schedule.
    pub leader: bool,
    /// Directory holding one JSON or TOML file per table config.
    pub table_config_dir: PathBuf,
    /// Optional TOML file declaring the generators to register at startup.
    pub generators_config: Option<PathBuf>,
}

impl ControllerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            task_manager_frequency_secs: profiled_env_i64(p, "TASK_MANAGER_FREQUENCY_SECS", 3600),
            leader: profiled_env_bool(p, "CONTROLLER_LEADER", true),
            table_config_dir: PathBuf::from(profiled_env_or(p, "TABLE_CONFIG_DIR", "data/tables")),
            generators_config: profiled_env_opt(p, "GENERATORS_CONFIG").map(PathBuf::from),
        }
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_u16(p, "PORT", 9000),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ── AWS ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub endpoint_url: Option<String>,
}

impl AwsConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            region: profiled_env_or(p, "AWS_REGION", "us-east-1"),
            access_key_id: profiled_env_opt(p, "AWS_ACCESS_KEY_ID"),
            secret_access_key: profiled_env_opt(p, "AWS_SECRET_ACCESS_KEY"),
            session_token: profiled_env_opt(p, "AWS_SESSION_TOKEN"),
            endpoint_url: profiled_env_opt(p, "QUEUE_AWS_ENDPOINT_URL"),
        }
    }

    pub fn has_static_credentials(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }
}

// ── Task queue ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// "memory" or "sqs"
    pub backend: String,
    /// Prepended to the job type to build the queue name.
    pub name_prefix: String,
}

impl QueueConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            backend: profiled_env_or(p, "QUEUE_BACKEND", "memory").to_lowercase(),
            name_prefix: profiled_env_or(p, "QUEUE_NAME_PREFIX", "TaskQueue_"),
        }
    }

    pub fn is_sqs(&self) -> bool {
        self.backend == "sqs"
    }

    /// Queue name for a job type, e.g. `TaskQueue_merge`.
    pub fn queue_name(&self, job_type: &str) -> String {
        format!("{}{}", self.name_prefix, job_type)
    }
}
