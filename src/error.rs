//! Top-level error types for Frontdesk.

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum wrapping domain-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("missing required config key: {0}")]
    MissingKey(String),
}

/// Model backend errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("model request timed out")]
    Timeout,

    #[error("model request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("model returned no usable candidate")]
    EmptyResponse,

    #[error("model response malformed: {0}")]
    Malformed(String),
}

/// Persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("query rejected: {0}")]
    Rejected(String),
}

/// Outbound gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("gateway request timed out")]
    Timeout,

    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway rejected the message (status {status})")]
    Gateway { status: u16 },
}

/// Orchestration errors.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("cycle for {sender} failed: {reason}")]
    CycleFailed { sender: String, reason: String },
}
