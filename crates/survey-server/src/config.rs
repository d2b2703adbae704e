//! Server configuration from environment.

use std::env;
use std::time::Duration;

use survey_core::LifecycleRules;

/// Which mission store backs the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub store: StoreKind,
    pub database_path: String,
    pub database_max_connections: u32,
    /// Connection attempts before giving up at startup
    pub database_connect_retries: u32,
    pub database_retry_base_ms: u64,
    /// Upper bound on any single store call made by the orchestrator
    pub store_timeout_ms: u64,
    pub event_capacity: usize,
    pub strict_resume: bool,
    pub strict_complete: bool,
    pub log_json: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server_port: parse_env("SURVEY_PORT", 3000),
            store: match env::var("SURVEY_STORE").as_deref() {
                Ok("memory") => StoreKind::Memory,
                _ => StoreKind::Sqlite,
            },
            database_path: env::var("SURVEY_DATABASE_PATH")
                .unwrap_or_else(|_| "data/survey.db".to_string()),
            database_max_connections: parse_env("SURVEY_DB_MAX_CONNECTIONS", 5),
            database_connect_retries: parse_env("SURVEY_DB_CONNECT_RETRIES", 5),
            database_retry_base_ms: parse_env("SURVEY_DB_RETRY_BASE_MS", 500),
            store_timeout_ms: parse_env("SURVEY_STORE_TIMEOUT_MS", 5000),
            event_capacity: parse_env("SURVEY_EVENT_CAPACITY", 256),
            strict_resume: parse_flag("SURVEY_STRICT_RESUME"),
            strict_complete: parse_flag("SURVEY_STRICT_COMPLETE"),
            log_json: parse_flag("SURVEY_LOG_JSON"),
        }
    }

    pub fn lifecycle_rules(&self) -> LifecycleRules {
        LifecycleRules {
            strict_resume: self.strict_resume,
            strict_complete: self.strict_complete,
        }
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            store: StoreKind::Memory,
            database_path: "data/survey.db".to_string(),
            database_max_connections: 5,
            database_connect_retries: 5,
            database_retry_base_ms: 500,
            store_timeout_ms: 5000,
            event_capacity: 256,
            strict_resume: false,
            strict_complete: false,
            log_json: false,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_flag(key: &str) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}
