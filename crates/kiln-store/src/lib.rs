//! Embedded SQL storage: schema, repository, hybrid semantic ranker, event
//! queue, and link validator, all built on a single `rusqlite` connection
//! shared behind a mutex.

pub mod error;
pub mod links;
pub mod queue;
pub mod ranker;
pub mod repository;
pub mod schema;

pub use error::{Result, StoreError};
pub use repository::Repository;
