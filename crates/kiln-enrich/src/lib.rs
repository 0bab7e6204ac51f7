//! Default embedding provider (`token-hash-v1`) and the metadata/summary
//! helpers: schema enforcement, auto-fill, and structured summary
//! generation.

mod embedding;
mod metadata;

pub use embedding::HashEmbeddingProvider;
pub use metadata::{auto_fill, enforce_schema, generate_summary, AutoFilled};
