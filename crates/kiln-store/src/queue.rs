use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use kiln_core::{QueueEvent, QueueEventType, QueueStatus};

use crate::error::{Result, StoreError};
use crate::repository::Repository;

const MAX_ATTEMPTS: u32 = 5;

impl Repository {
    /// Enqueue upsert events for `changed_paths` and delete events for
    /// `deleted_paths`, coalescing with any existing non-terminal event for
    /// the same path: same event type leaves the row untouched, a different
    /// event type updates it in place, otherwise a new `queued` row is
    /// inserted.
    pub fn enqueue(&self, changed_paths: &[String], deleted_paths: &[String]) -> Result<()> {
        let conn = self.conn.lock();
        let now = Utc::now().to_rfc3339();

        for path in changed_paths {
            coalesce(&conn, path, QueueEventType::Upsert, &now)?;
        }
        for path in deleted_paths {
            coalesce(&conn, path, QueueEventType::Delete, &now)?;
        }
        Ok(())
    }

    /// Pull up to `batch_size` queued events in `(created_at, id)` order,
    /// mark them `processing`, and hand them back for the caller to act on
    /// and then resolve via `complete_event`/`fail_event`.
    pub fn dequeue_batch(&self, batch_size: usize) -> Result<Vec<QueueEvent>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, path, event_type, created_at, updated_at, status, attempts,
                 last_error FROM queue_events WHERE status = 'queued'
                 ORDER BY created_at ASC, id ASC LIMIT ?1",
            )
            .map_err(StoreError::Sqlite)?;
        let events: Vec<QueueEvent> = stmt
            .query_map([batch_size as i64], row_to_event)
            .map_err(StoreError::Sqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)?;

        let now = Utc::now().to_rfc3339();
        for event in &events {
            conn.execute(
                "UPDATE queue_events SET status = 'processing', updated_at = ?1 WHERE id = ?2",
                params![now, event.id],
            )
            .map_err(StoreError::Sqlite)?;
        }
        Ok(events)
    }

    /// Mark an event `done`.
    pub fn complete_event(&self, event_id: i64) -> Result<()> {
        let conn = self.conn.lock();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE queue_events SET status = 'done', updated_at = ?1 WHERE id = ?2",
            params![now, event_id],
        )
        .map_err(StoreError::Sqlite)?;
        Ok(())
    }

    /// Record a processing failure. Below `MAX_ATTEMPTS` the event returns to
    /// `queued` for another pass; at `MAX_ATTEMPTS` it is marked `failed`.
    pub fn fail_event(&self, event_id: i64, error: &str) -> Result<()> {
        let conn = self.conn.lock();
        let attempts: u32 = conn
            .query_row(
                "SELECT attempts FROM queue_events WHERE id = ?1",
                [event_id],
                |row| row.get(0),
            )
            .map_err(StoreError::Sqlite)?;
        let next_attempts = attempts + 1;
        let now = Utc::now().to_rfc3339();
        let status = if next_attempts >= MAX_ATTEMPTS {
            "failed"
        } else {
            "queued"
        };
        conn.execute(
            "UPDATE queue_events SET status = ?1, attempts = ?2, last_error = ?3,
             updated_at = ?4 WHERE id = ?5",
            params![status, next_attempts, error, now, event_id],
        )
        .map_err(StoreError::Sqlite)?;
        Ok(())
    }

    /// Drain up to `batch_size` queued events, applying `upsert`/`delete`
    /// via the provided callbacks, retrying failures until `MAX_ATTEMPTS`.
    /// Returns the number of events resolved as `done`.
    pub fn drain<F, D>(&self, batch_size: usize, mut on_upsert: F, mut on_delete: D) -> Result<u64>
    where
        F: FnMut(&str) -> std::result::Result<(), String>,
        D: FnMut(&str) -> std::result::Result<(), String>,
    {
        let batch = self.dequeue_batch(batch_size)?;
        let mut done = 0u64;
        for event in batch {
            let outcome = match event.event_type {
                QueueEventType::Upsert => on_upsert(&event.path),
                QueueEventType::Delete => on_delete(&event.path),
            };
            match outcome {
                Ok(()) => {
                    self.complete_event(event.id)?;
                    done += 1;
                }
                Err(msg) => self.fail_event(event.id, &msg)?,
            }
        }
        Ok(done)
    }

    pub fn queue_events(&self) -> Result<Vec<QueueEvent>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, path, event_type, created_at, updated_at, status, attempts,
                 last_error FROM queue_events ORDER BY created_at ASC, id ASC",
            )
            .map_err(StoreError::Sqlite)?;
        let events = stmt
            .query_map([], row_to_event)
            .map_err(StoreError::Sqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)?;
        Ok(events)
    }
}

fn coalesce(
    conn: &rusqlite::Connection,
    path: &str,
    event_type: QueueEventType,
    now: &str,
) -> Result<()> {
    let existing: Option<(i64, String)> = conn
        .query_row(
            "SELECT id, event_type FROM queue_events
             WHERE path = ?1 AND status IN ('queued', 'processing')",
            [path],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(StoreError::Sqlite)?;

    match existing {
        Some((id, existing_type)) if existing_type == event_type.as_str() => {
            let _ = id;
        }
        Some((id, _)) => {
            conn.execute(
                "UPDATE queue_events SET event_type = ?1, status = 'queued',
                 updated_at = ?2 WHERE id = ?3",
                params![event_type.as_str(), now, id],
            )
            .map_err(StoreError::Sqlite)?;
        }
        None => {
            conn.execute(
                "INSERT INTO queue_events (path, event_type, created_at, updated_at,
                 status, attempts, last_error) VALUES (?1, ?2, ?3, ?3, 'queued', 0, NULL)",
                params![path, event_type.as_str(), now],
            )
            .map_err(StoreError::Sqlite)?;
        }
    }
    Ok(())
}

fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<QueueEvent> {
    let created_at: String = row.get(3)?;
    let updated_at: String = row.get(4)?;
    Ok(QueueEvent {
        id: row.get(0)?,
        path: row.get(1)?,
        event_type: QueueEventType::parse(&row.get::<_, String>(2)?),
        created_at: crate::repository::parse_ts(&created_at),
        updated_at: crate::repository::parse_ts(&updated_at),
        status: QueueStatus::parse(&row.get::<_, String>(5)?),
        attempts: row.get(6)?,
        last_error: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_enrich::HashEmbeddingProvider;
    use std::sync::Arc;

    fn repo() -> Repository {
        Repository::open_in_memory(Arc::new(HashEmbeddingProvider::new())).unwrap()
    }

    #[test]
    fn enqueue_then_delete_same_path_coalesces_to_delete() {
        let repo = repo();
        repo.enqueue(&["note.md".to_string()], &[]).unwrap();
        repo.enqueue(&[], &["note.md".to_string()]).unwrap();

        let events = repo.queue_events().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, QueueEventType::Delete);
        assert_eq!(events[0].status, QueueStatus::Queued);
    }

    #[test]
    fn same_event_type_does_not_duplicate() {
        let repo = repo();
        repo.enqueue(&["note.md".to_string()], &[]).unwrap();
        repo.enqueue(&["note.md".to_string()], &[]).unwrap();

        let events = repo.queue_events().unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn drain_processes_in_order_and_marks_done() {
        let repo = repo();
        repo.enqueue(&["a.md".to_string(), "b.md".to_string()], &[])
            .unwrap();

        let mut seen = Vec::new();
        let done = repo
            .drain(
                10,
                |path| {
                    seen.push(path.to_string());
                    Ok(())
                },
                |_| Ok(()),
            )
            .unwrap();

        assert_eq!(done, 2);
        assert_eq!(seen, vec!["a.md".to_string(), "b.md".to_string()]);

        let events = repo.queue_events().unwrap();
        assert!(events.iter().all(|e| e.status == QueueStatus::Done));
    }

    #[test]
    fn failure_retries_until_max_attempts_then_fails() {
        let repo = repo();
        repo.enqueue(&["bad.md".to_string()], &[]).unwrap();

        for _ in 0..MAX_ATTEMPTS {
            repo.drain(10, |_| Err("boom".to_string()), |_| Ok(()))
                .unwrap();
        }

        let events = repo.queue_events().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, QueueStatus::Failed);
        assert_eq!(events[0].attempts, MAX_ATTEMPTS);
        assert_eq!(events[0].last_error.as_deref(), Some("boom"));
    }
}
