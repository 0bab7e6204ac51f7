use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use kiln_core::{
    BenchmarkReport, DocumentDetail, DocumentSummary, EmbeddingCoverage, EmbeddingProvider,
    Heading, Link, LinkStatus, ParsedDocument, PrecisionCase, PrecisionCaseResult, PrecisionReport,
    SystemStats,
};

use crate::error::{Result, StoreError};
use crate::schema;

/// Single embedded SQL store: one writer, many readers, guarded by a
/// process-wide mutex around the (synchronous) `rusqlite` connection.
pub struct Repository {
    pub(crate) conn: Arc<Mutex<Connection>>,
    pub(crate) embedder: Arc<dyn EmbeddingProvider>,
}

impl Repository {
    pub fn open(
        path: impl AsRef<std::path::Path>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let conn = Connection::open(path).map_err(StoreError::Sqlite)?;
        schema::initialize(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            embedder,
        })
    }

    pub fn open_in_memory(embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(StoreError::Sqlite)?;
        schema::initialize(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            embedder,
        })
    }

    /// Atomically replace a document's row and all child relations.
    /// Returns (`id`, `was_existing`).
    pub fn upsert(&self, path: &str, parsed: &ParsedDocument) -> Result<(i64, bool)> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(StoreError::Sqlite)?;

        let existing_id: Option<i64> = tx
            .query_row("SELECT id FROM documents WHERE path = ?1", [path], |row| {
                row.get(0)
            })
            .optional()
            .map_err(StoreError::Sqlite)?;
        let was_existing = existing_id.is_some();

        let now = Utc::now().to_rfc3339();
        let id = if let Some(id) = existing_id {
            tx.execute(
                "UPDATE documents SET title = ?1, summary = ?2, category = ?3, body = ?4,
                 content_hash = ?5, token_estimate = ?6, updated_at = ?7, processed_at = ?8
                 WHERE id = ?9",
                params![
                    parsed.title,
                    parsed.summary,
                    parsed.category,
                    parsed.body,
                    parsed.content_hash,
                    parsed.token_estimate,
                    now,
                    now,
                    id
                ],
            )
            .map_err(StoreError::Sqlite)?;
            delete_children(&tx, id)?;
            id
        } else {
            tx.execute(
                "INSERT INTO documents (path, title, summary, category, body, content_hash,
                 token_estimate, updated_at, processed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    path,
                    parsed.title,
                    parsed.summary,
                    parsed.category,
                    parsed.body,
                    parsed.content_hash,
                    parsed.token_estimate,
                    now,
                    now
                ],
            )
            .map_err(StoreError::Sqlite)?;
            tx.last_insert_rowid()
        };

        for heading in &parsed.headings {
            tx.execute(
                "INSERT INTO headings (document_id, level, text, anchor, position)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, heading.level, heading.text, heading.anchor, heading.position],
            )
            .map_err(StoreError::Sqlite)?;
        }

        for link in &parsed.links {
            tx.execute(
                "INSERT INTO links (document_id, target, is_external, status, checked_at)
                 VALUES (?1, ?2, ?3, 'unknown', NULL)",
                params![id, link.target, link.is_external as i64],
            )
            .map_err(StoreError::Sqlite)?;
        }

        for tag in &parsed.tags {
            let tag_id = intern(&tx, "tags", tag)?;
            tx.execute(
                "INSERT OR IGNORE INTO document_tags (document_id, tag_id) VALUES (?1, ?2)",
                params![id, tag_id],
            )
            .map_err(StoreError::Sqlite)?;
        }

        for concept in &parsed.concepts {
            let concept_id = intern(&tx, "concepts", concept)?;
            tx.execute(
                "INSERT OR IGNORE INTO document_concepts (document_id, concept_id, score)
                 VALUES (?1, ?2, 1.0)",
                params![id, concept_id],
            )
            .map_err(StoreError::Sqlite)?;
        }

        let embedding_text = format!(
            "{} {} {} {}",
            parsed.title,
            parsed.summary,
            parsed.category.clone().unwrap_or_default(),
            parsed.body
        );
        let (doc_vector, model_id) = self.embedder.embed(&embedding_text, None);
        tx.execute(
            "INSERT INTO document_embeddings (document_id, vector, model_id, generated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                id,
                serde_json::to_string(&doc_vector).map_err(StoreError::Serialization)?,
                model_id,
                now
            ],
        )
        .map_err(StoreError::Sqlite)?;

        for chunk in &parsed.chunks {
            let (vector, _) = self.embedder.embed(&chunk.content, None);
            tx.execute(
                "INSERT INTO chunks (document_id, chunk_index, heading_path, content,
                 token_count, vector) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    chunk.chunk_index,
                    chunk.heading_path,
                    chunk.content,
                    chunk.token_count,
                    serde_json::to_string(&vector).map_err(StoreError::Serialization)?
                ],
            )
            .map_err(StoreError::Sqlite)?;
        }

        clear_cache(&tx)?;
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok((id, was_existing))
    }

    /// Remove the document row at `path`; cascades to all child relations.
    /// Returns whether a row was removed.
    pub fn delete_by_path(&self, path: &str) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(StoreError::Sqlite)?;
        let affected = tx
            .execute("DELETE FROM documents WHERE path = ?1", [path])
            .map_err(StoreError::Sqlite)?;
        clear_cache(&tx)?;
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(affected > 0)
    }

    pub fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, path, title, summary, category, updated_at FROM documents
                 ORDER BY updated_at DESC",
            )
            .map_err(StoreError::Sqlite)?;
        let rows = stmt
            .query_map([], row_to_summary)
            .map_err(StoreError::Sqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)?;
        Ok(rows)
    }

    pub fn get_document(
        &self,
        id: i64,
        include_content: bool,
        max_tokens: Option<u32>,
        section: Option<&str>,
    ) -> Result<Option<DocumentDetail>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT id, path, title, summary, category, content_hash, token_estimate,
                 updated_at, processed_at FROM documents WHERE id = ?1",
                [id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, u32>(6)?,
                        row.get::<_, String>(7)?,
                        row.get::<_, String>(8)?,
                    ))
                },
            )
            .optional()
            .map_err(StoreError::Sqlite)?;

        let Some((id, path, title, summary, category, content_hash, token_estimate, updated_at, processed_at)) =
            row
        else {
            return Ok(None);
        };
        let _ = &path;

        let headings = load_headings(&conn, id)?;
        let links = load_links(&conn, id)?;
        let tags = load_joined_names(&conn, "tags", "document_tags", "tag_id", id)?;
        let concepts = load_joined_names(&conn, "concepts", "document_concepts", "concept_id", id)?;

        let content = if include_content {
            Some(assemble_content(&conn, id, max_tokens, section)?)
        } else {
            None
        };

        Ok(Some(DocumentDetail {
            id,
            path,
            title,
            summary,
            category,
            content_hash,
            token_estimate,
            updated_at: parse_ts(&updated_at),
            processed_at: parse_ts(&processed_at),
            headings,
            links,
            tags,
            concepts,
            content,
        }))
    }

    /// Lexical substring match of the trimmed query against title, summary,
    /// path, ordered by updated_at descending, capped at `limit`.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<DocumentSummary>> {
        let trimmed = query.trim();
        let pattern = format!("%{trimmed}%");
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, path, title, summary, category, updated_at FROM documents
                 WHERE title LIKE ?1 OR summary LIKE ?1 OR path LIKE ?1
                 ORDER BY updated_at DESC LIMIT ?2",
            )
            .map_err(StoreError::Sqlite)?;
        let rows = stmt
            .query_map(params![pattern, limit as i64], row_to_summary)
            .map_err(StoreError::Sqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)?;
        Ok(rows)
    }

    pub fn find_by_concept(&self, concept: &str, limit: usize) -> Result<Vec<DocumentSummary>> {
        let lowered = concept.to_lowercase();
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT d.id, d.path, d.title, d.summary, d.category, d.updated_at
                 FROM documents d
                 JOIN document_concepts dc ON dc.document_id = d.id
                 JOIN concepts c ON c.id = dc.concept_id
                 WHERE c.name = ?1
                 ORDER BY d.updated_at DESC LIMIT ?2",
            )
            .map_err(StoreError::Sqlite)?;
        let rows = stmt
            .query_map(params![lowered, limit as i64], row_to_summary)
            .map_err(StoreError::Sqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)?;
        Ok(rows)
    }

    pub fn regenerate_embeddings(&self, model_hint: Option<&str>) -> Result<u64> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT id, title, summary, category, body FROM documents")
            .map_err(StoreError::Sqlite)?;
        let docs: Vec<(i64, String, String, Option<String>, String)> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            })
            .map_err(StoreError::Sqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)?;

        let now = Utc::now().to_rfc3339();
        let mut count = 0u64;
        for (id, title, summary, category, body) in docs {
            let text = format!("{title} {summary} {} {body}", category.unwrap_or_default());
            let (vector, model_id) = self.embedder.embed(&text, model_hint);
            conn.execute(
                "INSERT INTO document_embeddings (document_id, vector, model_id, generated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(document_id) DO UPDATE SET
                    vector = excluded.vector, model_id = excluded.model_id,
                    generated_at = excluded.generated_at",
                params![
                    id,
                    serde_json::to_string(&vector).map_err(StoreError::Serialization)?,
                    model_id,
                    now
                ],
            )
            .map_err(StoreError::Sqlite)?;
            count += 1;
        }
        clear_cache(&conn)?;
        Ok(count)
    }

    pub fn embedding_coverage(&self) -> Result<EmbeddingCoverage> {
        let conn = self.conn.lock();
        let document_count: u64 = conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .map_err(StoreError::Sqlite)?;
        let embedded_document_count: u64 = conn
            .query_row("SELECT COUNT(*) FROM document_embeddings", [], |row| row.get(0))
            .map_err(StoreError::Sqlite)?;
        let chunk_count: u64 = conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
            .map_err(StoreError::Sqlite)?;
        let embedded_chunk_count: u64 = conn
            .query_row(
                "SELECT COUNT(*) FROM chunks WHERE vector IS NOT NULL AND vector != '[]'",
                [],
                |row| row.get(0),
            )
            .map_err(StoreError::Sqlite)?;
        Ok(EmbeddingCoverage {
            document_count,
            embedded_document_count,
            chunk_count,
            embedded_chunk_count,
        })
    }

    /// Mean precision@k across a batch of labeled cases, where a case's
    /// precision is `|expected ∩ top-k| / k`.
    pub fn evaluate_precision(&self, cases: &[PrecisionCase], k: usize) -> Result<PrecisionReport> {
        let k = k.max(1);
        let mut results = Vec::with_capacity(cases.len());
        for case in cases {
            let top = self.semantic_search(&case.query, k)?;
            let hit_count = top
                .iter()
                .filter(|doc| case.expected_ids.contains(&doc.id))
                .count();
            let precision = hit_count as f64 / k as f64;
            results.push(PrecisionCaseResult {
                query: case.query.clone(),
                precision,
            });
        }
        let mean_precision = if results.is_empty() {
            0.0
        } else {
            results.iter().map(|r| r.precision).sum::<f64>() / results.len() as f64
        };
        Ok(PrecisionReport {
            mean_precision,
            cases: results,
        })
    }

    /// Time `iterations` passes of `semantic_search` over each case's query
    /// and report average/median/p95/max latency alongside precision.
    pub fn benchmark(
        &self,
        cases: &[PrecisionCase],
        k: usize,
        iterations: usize,
    ) -> Result<BenchmarkReport> {
        let iterations = iterations.max(1);
        let mut durations_ms: Vec<f64> = Vec::with_capacity(cases.len() * iterations);
        for _ in 0..iterations {
            for case in cases {
                let start = std::time::Instant::now();
                self.semantic_search(&case.query, k)?;
                durations_ms.push(start.elapsed().as_secs_f64() * 1000.0);
            }
        }

        let precision = self.evaluate_precision(cases, k)?;

        if durations_ms.is_empty() {
            return Ok(BenchmarkReport {
                average_ms: 0.0,
                median_ms: 0.0,
                p95_ms: 0.0,
                max_ms: 0.0,
                precision,
            });
        }

        durations_ms.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let n = durations_ms.len();
        let average_ms = durations_ms.iter().sum::<f64>() / n as f64;
        let median_ms = durations_ms[n / 2];
        let p95_index = ((0.95 * (n - 1) as f64).ceil() as usize).min(n - 1);
        let p95_ms = durations_ms[p95_index];
        let max_ms = durations_ms[n - 1];

        Ok(BenchmarkReport {
            average_ms,
            median_ms,
            p95_ms,
            max_ms,
            precision,
        })
    }

    /// Document/link counts, queue backlog by status, queue lag, and
    /// embedding coverage.
    pub fn system_stats(&self) -> Result<SystemStats> {
        let embedding_coverage = self.embedding_coverage()?;
        let conn = self.conn.lock();

        let document_count: u64 = conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .map_err(StoreError::Sqlite)?;
        let link_count: u64 = conn
            .query_row("SELECT COUNT(*) FROM links", [], |row| row.get(0))
            .map_err(StoreError::Sqlite)?;

        let count_by_status = |status: &str| -> Result<u64> {
            conn.query_row(
                "SELECT COUNT(*) FROM queue_events WHERE status = ?1",
                [status],
                |row| row.get(0),
            )
            .map_err(StoreError::Sqlite)
        };
        let queue_queued = count_by_status("queued")?;
        let queue_processing = count_by_status("processing")?;
        let queue_done = count_by_status("done")?;
        let queue_failed = count_by_status("failed")?;

        let oldest_pending: Option<String> = conn
            .query_row(
                "SELECT created_at FROM queue_events WHERE status IN ('queued', 'processing')
                 ORDER BY created_at ASC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::Sqlite)?;
        let queue_lag_seconds = oldest_pending
            .map(|ts| (Utc::now() - parse_ts(&ts)).num_seconds().max(0))
            .unwrap_or(0);

        Ok(SystemStats {
            document_count,
            link_count,
            queue_queued,
            queue_processing,
            queue_done,
            queue_failed,
            queue_lag_seconds,
            embedding_coverage,
        })
    }
}

fn intern(tx: &rusqlite::Transaction, table: &str, name: &str) -> Result<i64> {
    let lowered = name.to_lowercase();
    tx.execute(
        &format!("INSERT OR IGNORE INTO {table} (name) VALUES (?1)"),
        [&lowered],
    )
    .map_err(StoreError::Sqlite)?;
    tx.query_row(
        &format!("SELECT id FROM {table} WHERE name = ?1"),
        [&lowered],
        |row| row.get(0),
    )
    .map_err(StoreError::Sqlite)
}

fn delete_children(tx: &rusqlite::Transaction, document_id: i64) -> Result<()> {
    for table in [
        "headings",
        "links",
        "document_tags",
        "document_concepts",
        "chunks",
        "document_embeddings",
    ] {
        tx.execute(
            &format!("DELETE FROM {table} WHERE document_id = ?1"),
            [document_id],
        )
        .map_err(StoreError::Sqlite)?;
    }
    Ok(())
}

pub(crate) fn clear_cache(conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM query_cache", []).map_err(StoreError::Sqlite)?;
    Ok(())
}

pub(crate) fn row_to_summary(row: &rusqlite::Row) -> rusqlite::Result<DocumentSummary> {
    Ok(DocumentSummary {
        id: row.get(0)?,
        path: row.get(1)?,
        title: row.get(2)?,
        summary: row.get(3)?,
        category: row.get(4)?,
        updated_at: parse_ts(&row.get::<_, String>(5)?),
    })
}

pub(crate) fn parse_ts(value: &str) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn load_headings(conn: &Connection, document_id: i64) -> Result<Vec<Heading>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, document_id, level, text, anchor, position FROM headings
             WHERE document_id = ?1 ORDER BY position ASC",
        )
        .map_err(StoreError::Sqlite)?;
    let rows = stmt
        .query_map([document_id], |row| {
            Ok(Heading {
                id: row.get(0)?,
                document_id: row.get(1)?,
                level: row.get(2)?,
                text: row.get(3)?,
                anchor: row.get(4)?,
                position: row.get(5)?,
            })
        })
        .map_err(StoreError::Sqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(StoreError::Sqlite)?;
    Ok(rows)
}

fn load_links(conn: &Connection, document_id: i64) -> Result<Vec<Link>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, document_id, target, is_external, status, checked_at FROM links
             WHERE document_id = ?1 ORDER BY id ASC",
        )
        .map_err(StoreError::Sqlite)?;
    let rows = stmt
        .query_map([document_id], |row| {
            let checked_at: Option<String> = row.get(5)?;
            Ok(Link {
                id: row.get(0)?,
                document_id: row.get(1)?,
                target: row.get(2)?,
                is_external: row.get::<_, i64>(3)? != 0,
                status: LinkStatus::parse(&row.get::<_, String>(4)?),
                checked_at: checked_at.map(|v| parse_ts(&v)),
            })
        })
        .map_err(StoreError::Sqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(StoreError::Sqlite)?;
    Ok(rows)
}

pub(crate) fn load_joined_names(
    conn: &Connection,
    table: &str,
    join_table: &str,
    join_column: &str,
    document_id: i64,
) -> Result<Vec<String>> {
    let sql = format!(
        "SELECT t.name FROM {table} t
         JOIN {join_table} j ON j.{join_column} = t.id
         WHERE j.document_id = ?1 ORDER BY t.name ASC"
    );
    let mut stmt = conn.prepare(&sql).map_err(StoreError::Sqlite)?;
    let rows = stmt
        .query_map([document_id], |row| row.get::<_, String>(0))
        .map_err(StoreError::Sqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(StoreError::Sqlite)?;
    Ok(rows)
}

/// Assemble content from a document's chunks, honoring an optional section
/// filter and a running token budget. Whole chunks are appended until the
/// next would overflow, then a word-sliced prefix of that next chunk
/// exactly fills the remaining budget.
fn assemble_content(
    conn: &Connection,
    document_id: i64,
    max_tokens: Option<u32>,
    section: Option<&str>,
) -> Result<String> {
    let mut stmt = conn
        .prepare(
            "SELECT heading_path, content, token_count FROM chunks
             WHERE document_id = ?1 ORDER BY chunk_index ASC",
        )
        .map_err(StoreError::Sqlite)?;
    let chunks: Vec<(String, String, u32)> = stmt
        .query_map([document_id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .map_err(StoreError::Sqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(StoreError::Sqlite)?;

    let filtered: Vec<&(String, String, u32)> = match section {
        Some(section) => {
            let needle = section.to_lowercase();
            chunks
                .iter()
                .filter(|(heading_path, _, _)| heading_path.to_lowercase().contains(&needle))
                .collect()
        }
        None => chunks.iter().collect(),
    };

    let Some(budget) = max_tokens else {
        return Ok(filtered
            .iter()
            .map(|(_, content, _)| content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"));
    };

    let mut remaining = budget;
    let mut selected: Vec<String> = Vec::new();
    for (_, content, token_count) in filtered {
        if *token_count <= remaining {
            selected.push(content.clone());
            remaining -= token_count;
        } else if remaining > 0 {
            let words: Vec<&str> = content.split_whitespace().collect();
            selected.push(words[..remaining as usize].join(" "));
            remaining = 0;
            break;
        } else {
            break;
        }
    }

    Ok(selected.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_enrich::HashEmbeddingProvider;
    use kiln_parser::parse_markdown;

    fn repo() -> Repository {
        Repository::open_in_memory(Arc::new(HashEmbeddingProvider::new())).unwrap()
    }

    #[test]
    fn upsert_then_get_document_round_trips() {
        let repo = repo();
        let parsed = parse_markdown("# Title\nbody text");
        let (id, was_existing) = repo.upsert("note.md", &parsed).unwrap();
        assert!(!was_existing);

        let detail = repo.get_document(id, false, None, None).unwrap().unwrap();
        assert_eq!(detail.title, "Title");
        assert_eq!(detail.headings.len(), 1);
        assert_eq!(detail.headings[0].level, 1);
        assert_eq!(detail.headings[0].anchor, "title");
        assert_eq!(detail.headings[0].position, 1);
        assert!(detail.links.is_empty());
        assert!(detail.token_estimate >= 1);
    }

    #[test]
    fn get_document_with_token_budget_slices_last_chunk() {
        let repo = repo();
        let parsed = parse_markdown("# Budget\none two three four five six");
        let (id, _) = repo.upsert("budget.md", &parsed).unwrap();

        let detail = repo
            .get_document(id, true, Some(3), None)
            .unwrap()
            .unwrap();
        let content = detail.content.unwrap();
        let words: Vec<&str> = content.split_whitespace().collect();
        assert_eq!(words, vec!["#", "Budget", "one"]);
    }

    #[test]
    fn upsert_is_idempotent_on_same_path() {
        let repo = repo();
        let first = parse_markdown("# One\nfirst body");
        let (id_first, _) = repo.upsert("note.md", &first).unwrap();

        let second = parse_markdown("# Two\nsecond body");
        let (id_second, was_existing) = repo.upsert("note.md", &second).unwrap();

        assert_eq!(id_first, id_second);
        assert!(was_existing);

        let detail = repo.get_document(id_second, false, None, None).unwrap().unwrap();
        assert_eq!(detail.title, "Two");
    }

    #[test]
    fn delete_by_path_clears_cache_and_row() {
        let repo = repo();
        let parsed = parse_markdown("# Title\nbody text");
        repo.upsert("note.md", &parsed).unwrap();
        let _ = repo.semantic_search("body", 5).unwrap();

        let removed = repo.delete_by_path("note.md").unwrap();
        assert!(removed);

        let cache_rows: i64 = repo
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM query_cache", [], |row| row.get(0))
            .unwrap();
        assert_eq!(cache_rows, 0);

        let docs = repo.list_documents().unwrap();
        assert!(docs.is_empty());
    }

    #[test]
    fn find_by_concept_matches_extracted_concepts() {
        let repo = repo();
        let parsed = parse_markdown(
            "# Kubernetes\nkubernetes kubernetes kubernetes cluster rollout procedure details",
        );
        repo.upsert("infra.md", &parsed).unwrap();

        assert!(!parsed.concepts.is_empty());
        let concept = parsed.concepts[0].clone();
        let found = repo.find_by_concept(&concept, 5).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, "infra.md");
    }

    #[test]
    fn system_stats_reports_counts() {
        let repo = repo();
        let parsed = parse_markdown("# Title\n[a link](https://example.com)");
        repo.upsert("note.md", &parsed).unwrap();

        let stats = repo.system_stats().unwrap();
        assert_eq!(stats.document_count, 1);
        assert_eq!(stats.link_count, 1);
        assert_eq!(stats.queue_queued, 0);
        assert_eq!(stats.embedding_coverage.document_count, 1);
    }

    #[test]
    fn evaluate_precision_scores_known_hit() {
        let repo = repo();
        let parsed = parse_markdown("# Infra\nkubernetes cluster rollout procedure");
        let (id, _) = repo.upsert("infra.md", &parsed).unwrap();

        let cases = vec![PrecisionCase {
            query: "kubernetes".to_string(),
            expected_ids: vec![id],
        }];
        let report = repo.evaluate_precision(&cases, 1).unwrap();
        assert_eq!(report.cases.len(), 1);
        assert!(report.mean_precision > 0.0);
    }
}
