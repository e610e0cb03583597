//! Result and error types for orderflow.

use thiserror::Error;

/// Result type for orderflow operations
pub type FlowResult<T> = Result<T, FlowError>;

/// Errors that can occur while driving a flow
#[derive(Debug, Error)]
pub enum FlowError {
    /// Every descriptor in a target chain was tried without a match
    #[error("Element not found (tried: {})", attempted.join(" | "))]
    ElementNotFound {
        /// Descriptors that were attempted, in order
        attempted: Vec<String>,
    },

    /// A wait condition never became true within its deadline
    #[error("Timed out after {ms}ms waiting for {condition}")]
    ConditionTimedOut {
        /// Description of the awaited condition
        condition: String,
        /// Deadline in milliseconds
        ms: u64,
    },

    /// A retry-governed action exhausted its policy
    #[error("{action} failed after {attempts} attempt(s): {cause}")]
    ActionFailed {
        /// Label of the governed action
        action: String,
        /// Number of attempts made
        attempts: u32,
        /// Last underlying failure
        cause: Box<FlowError>,
    },

    /// No matching secondary context appeared within one attempt's window
    #[error("No matching popup appeared within {ms}ms")]
    AcquisitionFailed {
        /// Acquisition window in milliseconds
        ms: u64,
    },

    /// Required configuration is missing or invalid
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Browser driver error
    #[error("Driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// A content check failed
    #[error("Assertion failed: {message}")]
    Assertion {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl FlowError {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a driver error
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Create an assertion error
    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::Assertion {
            message: message.into(),
        }
    }

    /// Number of attempts recorded on an exhausted action, if any
    #[must_use]
    pub const fn attempts(&self) -> Option<u32> {
        match self {
            Self::ActionFailed { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }

    /// The innermost cause, unwrapping nested `ActionFailed` layers
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::ActionFailed { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}
