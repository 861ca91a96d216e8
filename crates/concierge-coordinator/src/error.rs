//! Error types for the coordinator.

use concierge_agent::DispatchError;
use thiserror::Error;

/// Errors that can occur while loading coordinator configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable '{key}': {message}")]
    InvalidEnvVar { key: String, message: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Errors surfaced by the coordinator itself.
///
/// Specialist failures never appear here: they end the pattern in its
/// `Failed` state and are reported inside the outcome.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Registry or proxy misconfiguration detected at construction.
    #[error("Coordinator startup failed: {0}")]
    Startup(#[from] DispatchError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The caller cancelled the request before it completed.
    #[error("Request cancelled")]
    Cancelled,
}

impl CoordinatorError {
    /// Get the error code suitable for logging or reporting.
    pub fn error_code(&self) -> &'static str {
        match self {
            CoordinatorError::Startup(_) => "STARTUP_FAILED",
            CoordinatorError::Config(_) => "CONFIG_ERROR",
            CoordinatorError::Cancelled => "CANCELLED",
        }
    }
}

/// Result type for coordinator operations.
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
