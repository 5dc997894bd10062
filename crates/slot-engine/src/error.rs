//! Error types for slot-engine operations.

use thiserror::Error;

/// Failures reported by a [`CalendarGateway`](crate::gateway::CalendarGateway).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Credentials missing, expired or rejected by the backend.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The request never produced a response (DNS, TLS, timeout, I/O).
    #[error("transport failure: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("backend rejected request (status {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The calendar or event does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The backend answered with a payload we could not interpret.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Errors surfaced by the public slot operations.
///
/// Every variant is recoverable: operations return it to the caller instead of
/// aborting, and a failed operation never leaves the engine in a state that
/// affects later queries.
#[derive(Error, Debug)]
pub enum SlotError {
    #[error("calendar unavailable: {0}")]
    GatewayUnavailable(#[from] GatewayError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("slot conflict: {0}")]
    SlotConflict(String),
}

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing config field: {0}")]
    MissingField(String),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

impl From<SlotError> for ConfigError {
    fn from(err: SlotError) -> Self {
        ConfigError::Invalid(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SlotError>;
