use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a link target has been resolved and what was found.
///
/// A closed set, modeled as a tagged variant rather than a free string at
/// the storage boundary (see design note on ad-hoc records becoming typed
/// variants).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Unknown,
    Ok,
    Broken,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Unknown => "unknown",
            LinkStatus::Ok => "ok",
            LinkStatus::Broken => "broken",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "ok" => LinkStatus::Ok,
            "broken" => LinkStatus::Broken,
            _ => LinkStatus::Unknown,
        }
    }
}

/// Desired action for a queue event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueEventType {
    Upsert,
    Delete,
}

impl QueueEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueEventType::Upsert => "upsert",
            QueueEventType::Delete => "delete",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "delete" => QueueEventType::Delete,
            _ => QueueEventType::Upsert,
        }
    }
}

/// Queue event lifecycle state. `Queued` and `Processing` are the only
/// non-terminal states; at most one such row may exist per path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Queued,
    Processing,
    Done,
    Failed,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Queued => "queued",
            QueueStatus::Processing => "processing",
            QueueStatus::Done => "done",
            QueueStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "processing" => QueueStatus::Processing,
            "done" => QueueStatus::Done,
            "failed" => QueueStatus::Failed,
            _ => QueueStatus::Queued,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QueueStatus::Done | QueueStatus::Failed)
    }
}

/// How the observer should watch filesystem roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObserverMode {
    Polling,
    Push,
    Auto,
}

/// A heading extracted from a document body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedHeading {
    pub level: u8,
    pub text: String,
    pub anchor: String,
    pub position: u32,
}

/// A markdown link extracted from a document body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedLink {
    pub target: String,
    pub is_external: bool,
}

/// A bounded slice of a document's body, the parser's chunking output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedChunk {
    pub chunk_index: u32,
    pub heading_path: String,
    pub content: String,
    pub token_count: u32,
}

/// The parser's immutable output. Construction never fails; degenerate
/// inputs simply yield a sparse record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub title: String,
    pub summary: String,
    pub category: Option<String>,
    pub body: String,
    pub tags: Vec<String>,
    pub concepts: Vec<String>,
    pub headings: Vec<ParsedHeading>,
    pub links: Vec<ParsedLink>,
    pub chunks: Vec<ParsedChunk>,
    pub content_hash: String,
    pub token_estimate: u32,
    /// The raw `key: value` frontmatter pairs, kept alongside the derived
    /// fields above so schema-enforcement can check for arbitrary required
    /// keys, not just the ones the parser special-cases.
    pub frontmatter: std::collections::BTreeMap<String, String>,
}

/// A document projection without body, chunks, or vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: i64,
    pub path: String,
    pub title: String,
    pub summary: String,
    pub category: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Full document detail, optionally including assembled content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentDetail {
    pub id: i64,
    pub path: String,
    pub title: String,
    pub summary: String,
    pub category: Option<String>,
    pub content_hash: String,
    pub token_estimate: u32,
    pub updated_at: DateTime<Utc>,
    pub processed_at: DateTime<Utc>,
    pub headings: Vec<Heading>,
    pub links: Vec<Link>,
    pub tags: Vec<String>,
    pub concepts: Vec<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    pub id: i64,
    pub document_id: i64,
    pub level: u8,
    pub text: String,
    pub anchor: String,
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: i64,
    pub document_id: i64,
    pub target: String,
    pub is_external: bool,
    pub status: LinkStatus,
    pub checked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEvent {
    pub id: i64,
    pub path: String,
    pub event_type: QueueEventType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: QueueStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// Counts of documents and links, queue backlog, and embedding coverage, as
/// returned by `Repository::system_stats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStats {
    pub document_count: u64,
    pub link_count: u64,
    pub queue_queued: u64,
    pub queue_processing: u64,
    pub queue_done: u64,
    pub queue_failed: u64,
    pub queue_lag_seconds: i64,
    pub embedding_coverage: EmbeddingCoverage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EmbeddingCoverage {
    pub document_count: u64,
    pub embedded_document_count: u64,
    pub chunk_count: u64,
    pub embedded_chunk_count: u64,
}

/// A single precision-evaluation case: a query and the ids expected in the
/// top-k result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecisionCase {
    pub query: String,
    pub expected_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecisionCaseResult {
    pub query: String,
    pub precision: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecisionReport {
    pub mean_precision: f64,
    pub cases: Vec<PrecisionCaseResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub average_ms: f64,
    pub median_ms: f64,
    pub p95_ms: f64,
    pub max_ms: f64,
    pub precision: PrecisionReport,
}

/// Result of validating one link, per `Repository`/`kiln-store::links`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkCheckResult {
    pub link_id: i64,
    pub status: LinkStatus,
    pub checked_at: DateTime<Utc>,
}
