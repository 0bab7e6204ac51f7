use kiln_core::KilnError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid input: {0}")]
    InputInvalid(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transient storage failure: {0}")]
    Transient(String),

    #[error("fatal storage failure: {0}")]
    Fatal(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<StoreError> for KilnError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InputInvalid(msg) => KilnError::InputInvalid(msg),
            StoreError::NotFound(msg) => KilnError::NotFound(msg),
            StoreError::Transient(msg) => KilnError::StorageTransient(msg),
            StoreError::Fatal(msg) => KilnError::StorageFatal(msg),
            StoreError::Sqlite(e) => KilnError::StorageFatal(e.to_string()),
            StoreError::Serialization(e) => KilnError::StorageFatal(e.to_string()),
            StoreError::Other(e) => KilnError::Other(e),
        }
    }
}
