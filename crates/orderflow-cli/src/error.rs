//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// A scenario ran but did not pass
    #[error("Scenario {scenario:?} failed: {message}")]
    ScenarioFailed {
        /// Scenario name
        scenario: String,
        /// Halting error
        message: String,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Orderflow library error
    #[error("{0}")]
    Flow(#[from] orderflow::FlowError),

    /// JSON output error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Feature not compiled in
    #[error("{feature} support not enabled. Rebuild with --features {feature}")]
    FeatureDisabled {
        /// Cargo feature name
        feature: &'static str,
    },
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a scenario failure
    #[must_use]
    pub fn scenario_failed(scenario: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ScenarioFailed {
            scenario: scenario.into(),
            message: message.into(),
        }
    }
}
