//! Solver and logging configuration

use std::time::Duration;

use clap::Args;

/// Solver connection settings.
#[derive(Debug, Clone, Args)]
pub struct SolverConfig {
    /// Base URL of the packing solver
    #[arg(long, env = "LADING_SOLVER_URL", default_value = "http://localhost:8000")]
    pub solver_url: String,

    /// Session token sent as a bearer credential
    #[arg(long, env = "LADING_SESSION_TOKEN", hide_env_values = true)]
    pub session_token: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = "LADING_SOLVER_TIMEOUT_SECONDS", default_value_t = 30_u64)]
    pub timeout_seconds: u64,
}

impl SolverConfig {
    /// Request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Compact, human-readable logs.
    Compact,

    /// Structured JSON logs.
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, Args)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Log format (compact, json)
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}
