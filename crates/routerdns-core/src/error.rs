//! Error types for the router DNS updater
//!
//! [`Error`] covers configuration, session and liveness failures. The
//! per-cycle classification that the scheduler acts on lives in
//! [`crate::workflow::FailureKind`].

use thiserror::Error;

/// Result type alias for updater operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the router DNS updater
#[derive(Error, Debug)]
pub enum Error {
    /// One or more required settings are absent (startup-fatal)
    #[error("Missing configuration: {0}")]
    ConfigurationMissing(String),

    /// A setting is present but malformed (startup-fatal)
    #[error("Invalid configuration: {0}")]
    ConfigurationInvalid(String),

    /// Remote UI session errors (driver refused a command, session gone)
    #[error("Session error: {0}")]
    Session(String),

    /// The page did not contain the requested element
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// A remote interaction exceeded its time bound
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Transport errors talking to the automation endpoint
    #[error("HTTP error: {0}")]
    Http(String),

    /// Liveness marker could not be written or read
    #[error("Liveness marker error: {0}")]
    Liveness(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a missing-configuration error
    pub fn config_missing(msg: impl Into<String>) -> Self {
        Self::ConfigurationMissing(msg.into())
    }

    /// Create an invalid-configuration error
    pub fn config_invalid(msg: impl Into<String>) -> Self {
        Self::ConfigurationInvalid(msg.into())
    }

    /// Create a session error
    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session(msg.into())
    }

    /// Create an element-not-found error
    pub fn element_not_found(msg: impl Into<String>) -> Self {
        Self::ElementNotFound(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a liveness marker error
    pub fn liveness(msg: impl Into<String>) -> Self {
        Self::Liveness(msg.into())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
