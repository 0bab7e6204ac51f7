use std::collections::HashSet;
use std::sync::OnceLock;

use chrono::{Datelike, Utc};
use regex::Regex;
use rusqlite::{params, OptionalExtension};
use sha2::{Digest, Sha256};

use kiln_core::{cosine_similarity, DocumentSummary};

use crate::error::{Result, StoreError};
use crate::repository::Repository;

const WEIGHT_VEC: f64 = 0.45;
const WEIGHT_CHUNK: f64 = 0.30;
const WEIGHT_LEX: f64 = 0.20;
const WEIGHT_CONCEPT: f64 = 0.05;
const FRESHNESS_BONUS: f64 = 0.05;

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[a-z0-9]+").unwrap())
}

fn tokenize(text: &str) -> HashSet<String> {
    let lowered = text.to_lowercase();
    token_re()
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn query_hash(normalized_query: &str, limit: usize) -> String {
    let input = format!("semantic:{normalized_query}:{limit}");
    hex::encode(Sha256::digest(input.as_bytes()))
}

struct ScoredDoc {
    summary: DocumentSummary,
    score: f64,
}

impl Repository {
    /// Hybrid semantic ranking: vector similarity, chunk-level similarity,
    /// lexical overlap, concept match, and a freshness bonus, with
    /// invalidate-on-write result caching.
    pub fn semantic_search(&self, query: &str, limit: usize) -> Result<Vec<DocumentSummary>> {
        let normalized = query.trim().to_lowercase();
        if normalized.is_empty() {
            return Ok(Vec::new());
        }

        let hash = query_hash(&normalized, limit);

        if let Some(cached) = self.cache_lookup(&hash)? {
            return Ok(cached);
        }

        let qt = tokenize(&normalized);
        let (qv, _) = self.embedder.embed(&normalized, None);

        let candidates = self.load_scoring_candidates()?;
        let current_year = Utc::now().year();

        let mut scored: Vec<ScoredDoc> = candidates
            .into_iter()
            .filter_map(|candidate| {
                let vec_score = cosine_similarity(&qv, &candidate.doc_vector);
                let chunk_score = candidate
                    .chunk_vectors
                    .iter()
                    .map(|cv| cosine_similarity(&qv, cv))
                    .fold(0.0_f32, f32::max);
                let dt = tokenize(&candidate.body);
                let lex = if qt.is_empty() {
                    0.0
                } else {
                    qt.intersection(&dt).count() as f64 / qt.len().max(1) as f64
                };
                let concept_hit = if qt.intersection(&candidate.concepts).next().is_some() {
                    1.0
                } else {
                    0.0
                };
                let fresh = if candidate.summary.updated_at.year() == current_year {
                    FRESHNESS_BONUS
                } else {
                    0.0
                };

                let score = WEIGHT_VEC * vec_score as f64
                    + WEIGHT_CHUNK * chunk_score as f64
                    + WEIGHT_LEX * lex
                    + WEIGHT_CONCEPT * concept_hit
                    + fresh;

                if score > 0.0 {
                    Some(ScoredDoc {
                        summary: candidate.summary,
                        score,
                    })
                } else {
                    None
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.summary.updated_at.cmp(&a.summary.updated_at))
                .then_with(|| a.summary.id.cmp(&b.summary.id))
        });

        let take = limit.max(1);
        let top: Vec<DocumentSummary> = scored.into_iter().take(take).map(|s| s.summary).collect();

        if top.is_empty() {
            let fallback = self.search(query, limit)?;
            self.cache_store(&hash, query, &fallback)?;
            return Ok(fallback);
        }

        self.cache_store(&hash, query, &top)?;
        Ok(top)
    }

    fn cache_lookup(&self, hash: &str) -> Result<Option<Vec<DocumentSummary>>> {
        let conn = self.conn.lock();
        let row: Option<(i64, String)> = conn
            .query_row(
                "SELECT id, result_ids FROM query_cache WHERE query_hash = ?1",
                [hash],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(StoreError::Sqlite)?;

        let Some((cache_id, result_ids_json)) = row else {
            return Ok(None);
        };

        let ids: Vec<i64> = serde_json::from_str(&result_ids_json).map_err(StoreError::Serialization)?;

        let mut summaries = Vec::with_capacity(ids.len());
        for id in &ids {
            let summary = conn
                .query_row(
                    "SELECT id, path, title, summary, category, updated_at FROM documents
                     WHERE id = ?1",
                    [id],
                    crate::repository::row_to_summary,
                )
                .optional()
                .map_err(StoreError::Sqlite)?;
            if let Some(summary) = summary {
                summaries.push(summary);
            }
        }

        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE query_cache SET hit_count = hit_count + 1, last_accessed = ?1 WHERE id = ?2",
            params![now, cache_id],
        )
        .map_err(StoreError::Sqlite)?;

        Ok(Some(summaries))
    }

    fn cache_store(&self, hash: &str, query_text: &str, results: &[DocumentSummary]) -> Result<()> {
        let ids: Vec<i64> = results.iter().map(|r| r.id).collect();
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO query_cache (query_hash, query_text, result_ids, created_at,
             last_accessed, hit_count) VALUES (?1, ?2, ?3, ?4, ?5, 0)
             ON CONFLICT(query_hash) DO UPDATE SET
                result_ids = excluded.result_ids, query_text = excluded.query_text,
                created_at = excluded.created_at, last_accessed = excluded.last_accessed,
                hit_count = 0",
            params![
                hash,
                query_text,
                serde_json::to_string(&ids).map_err(StoreError::Serialization)?,
                now,
                now
            ],
        )
        .map_err(StoreError::Sqlite)?;
        Ok(())
    }

    fn load_scoring_candidates(&self) -> Result<Vec<ScoringCandidate>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT d.id, d.path, d.title, d.summary, d.category, d.updated_at, d.body,
                 de.vector
                 FROM documents d
                 LEFT JOIN document_embeddings de ON de.document_id = d.id",
            )
            .map_err(StoreError::Sqlite)?;

        let rows: Vec<(i64, String, String, String, Option<String>, String, String, Option<String>)> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                ))
            })
            .map_err(StoreError::Sqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)?;

        let mut candidates = Vec::with_capacity(rows.len());
        for (id, path, title, summary, category, updated_at, body, vector_json) in rows {
            let doc_vector: Vec<f32> = match vector_json {
                Some(json) => serde_json::from_str(&json).unwrap_or_default(),
                None => Vec::new(),
            };

            let chunk_vectors = load_chunk_vectors(&conn, id)?;
            let concepts = crate::repository::load_joined_names(
                &conn,
                "concepts",
                "document_concepts",
                "concept_id",
                id,
            )?
            .into_iter()
            .collect::<HashSet<_>>();

            candidates.push(ScoringCandidate {
                summary: DocumentSummary {
                    id,
                    path,
                    title,
                    summary,
                    category,
                    updated_at: crate::repository::parse_ts(&updated_at),
                },
                body,
                doc_vector,
                chunk_vectors,
                concepts,
            });
        }

        Ok(candidates)
    }
}

struct ScoringCandidate {
    summary: DocumentSummary,
    body: String,
    doc_vector: Vec<f32>,
    chunk_vectors: Vec<Vec<f32>>,
    concepts: HashSet<String>,
}

fn load_chunk_vectors(conn: &rusqlite::Connection, document_id: i64) -> Result<Vec<Vec<f32>>> {
    let mut stmt = conn
        .prepare("SELECT vector FROM chunks WHERE document_id = ?1")
        .map_err(StoreError::Sqlite)?;
    let rows: Vec<String> = stmt
        .query_map([document_id], |row| row.get(0))
        .map_err(StoreError::Sqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(StoreError::Sqlite)?;
    Ok(rows
        .into_iter()
        .map(|json| serde_json::from_str(&json).unwrap_or_default())
        .collect())
}
