use thiserror::Error;

/// Result type alias used across the workspace's lower-level crates.
pub type Result<T> = std::result::Result<T, KilnError>;

/// Error kinds the core distinguishes, per the error handling design.
///
/// `ParseSoftFail` has no variant here: the parser never fails, so there is
/// nothing for callers to handle.
#[derive(Debug, Error)]
pub enum KilnError {
    /// Malformed query or request payload; no state change occurs.
    #[error("invalid input: {0}")]
    InputInvalid(String),

    /// No document/chunk exists for the given identifier.
    #[error("not found: {0}")]
    NotFound(String),

    /// I/O failure during a queue step. Callers should retry; the queue
    /// itself turns this into an attempts-counter increment.
    #[error("transient storage failure: {0}")]
    StorageTransient(String),

    /// Schema initialization failure or constraint violation. The
    /// transaction that raised this is rolled back.
    #[error("fatal storage failure: {0}")]
    StorageFatal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
