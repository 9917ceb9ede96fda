//! Error taxonomy for the Affect Core, per the error handling design.

use thiserror::Error;

/// Errors that can occur anywhere in the Affect Core.
#[derive(Debug, Error)]
pub enum VesperError {
    /// Invariant violation on an `EmotionState` mutation. Impossible by
    /// construction; only ever raised from a `debug_assert!`-guarded path.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Unknown event kind or out-of-tolerance instant. Rejected at ingress;
    /// never mutates state.
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// A bounded external call (Generate, transport send) exceeded its
    /// deadline.
    #[error("external call timed out: {0}")]
    ExternalTimeout(String),

    /// Persistence I/O failure, from the SQL driver.
    #[error("persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    /// Persistence failure with a custom message (schema/version issues that
    /// are not themselves a driver error).
    #[error("persistence error: {0}")]
    PersistenceMessage(String),

    /// Snapshot blob failed to (de)serialize.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error underneath persistence or config loading.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP failure from a `Generator` implementation.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Configuration load or validation failure.
    #[error("config error: {0}")]
    Config(String),

    /// Transport delivery failure that isn't a timeout.
    #[error("transport error: {0}")]
    Transport(String),

    /// Generic error with context, for cases the taxonomy above doesn't fit.
    #[error("{0}")]
    Other(String),
}

/// Convenience `Result` alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, VesperError>;

impl VesperError {
    /// Construct an [`VesperError::InvariantViolation`].
    pub fn invariant_violation(msg: impl Into<String>) -> Self {
        VesperError::InvariantViolation(msg.into())
    }

    /// Construct an [`VesperError::InvalidEvent`].
    pub fn invalid_event(msg: impl Into<String>) -> Self {
        VesperError::InvalidEvent(msg.into())
    }

    /// Construct an [`VesperError::ExternalTimeout`].
    pub fn external_timeout(msg: impl Into<String>) -> Self {
        VesperError::ExternalTimeout(msg.into())
    }

    /// Construct a [`VesperError::PersistenceMessage`].
    pub fn persistence(msg: impl Into<String>) -> Self {
        VesperError::PersistenceMessage(msg.into())
    }

    /// Construct a [`VesperError::Config`].
    pub fn config(msg: impl Into<String>) -> Self {
        VesperError::Config(msg.into())
    }

    /// Construct a [`VesperError::Transport`].
    pub fn transport(msg: impl Into<String>) -> Self {
        VesperError::Transport(msg.into())
    }

    /// Construct a [`VesperError::Other`].
    pub fn other(msg: impl Into<String>) -> Self {
        VesperError::Other(msg.into())
    }
}
