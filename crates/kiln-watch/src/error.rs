use thiserror::Error;

pub type Result<T> = std::result::Result<T, WatchError>;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("storage error: {0}")]
    Store(#[from] kiln_store::StoreError),

    #[error("filesystem notification error: {0}")]
    Notify(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
