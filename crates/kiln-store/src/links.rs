use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex as SyncMutex;
use rusqlite::params;

use kiln_core::{LinkCheckResult, LinkStatus};

use crate::error::{Result, StoreError};
use crate::repository::Repository;

const EXTERNAL_TIMEOUT: Duration = Duration::from_secs(3);
const MIN_HOST_SPACING: Duration = Duration::from_secs(1);

/// Tracks the last request time per host so external checks never hit the
/// same host more than once per second.
struct RateLimiter {
    last_seen: SyncMutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    fn new() -> Self {
        Self {
            last_seen: SyncMutex::new(HashMap::new()),
        }
    }

    fn wait_for(&self, host: &str) {
        let mut guard = self.last_seen.lock();
        if let Some(last) = guard.get(host) {
            let elapsed = last.elapsed();
            if elapsed < MIN_HOST_SPACING {
                std::thread::sleep(MIN_HOST_SPACING - elapsed);
            }
        }
        guard.insert(host.to_string(), Instant::now());
    }
}

impl Repository {
    /// Validate every link belonging to `document_id`: internal links
    /// against the filesystem relative to `document_path`'s parent
    /// directory; external links with a rate-limited HTTP probe, but only
    /// when `check_external` is set (the network probe is opt-in).
    pub async fn validate_links(
        &self,
        document_id: i64,
        document_path: &str,
        check_external: bool,
    ) -> Result<Vec<LinkCheckResult>> {
        let links: Vec<(i64, String, bool)> = {
            let conn = self.conn.lock();
            let mut stmt = conn
                .prepare(
                    "SELECT id, target, is_external FROM links WHERE document_id = ?1
                     ORDER BY id ASC",
                )
                .map_err(StoreError::Sqlite)?;
            stmt.query_map([document_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get::<_, i64>(2)? != 0))
            })
            .map_err(StoreError::Sqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)?
        };

        let base_dir = Path::new(document_path)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let client = reqwest::Client::builder()
            .timeout(EXTERNAL_TIMEOUT)
            .build()
            .map_err(|e| StoreError::Other(e.into()))?;
        let limiter = RateLimiter::new();

        let mut results = Vec::with_capacity(links.len());
        for (link_id, target, is_external) in links {
            if is_external && !check_external {
                continue;
            }
            let status = if is_external {
                check_external_link(&client, &limiter, &target).await
            } else {
                check_internal(&base_dir, &target)
            };
            let checked_at = Utc::now();
            {
                let conn = self.conn.lock();
                conn.execute(
                    "UPDATE links SET status = ?1, checked_at = ?2 WHERE id = ?3",
                    params![status.as_str(), checked_at.to_rfc3339(), link_id],
                )
                .map_err(StoreError::Sqlite)?;
            }
            results.push(LinkCheckResult {
                link_id,
                status,
                checked_at,
            });
        }
        Ok(results)
    }
}

fn check_internal(base_dir: &Path, target: &str) -> LinkStatus {
    let path_part = target.split('#').next().unwrap_or("");
    if path_part.is_empty() {
        return LinkStatus::Ok;
    }
    let resolved = base_dir.join(path_part);
    if resolved.exists() {
        LinkStatus::Ok
    } else {
        LinkStatus::Broken
    }
}

async fn check_external_link(client: &reqwest::Client, limiter: &RateLimiter, target: &str) -> LinkStatus {
    let host = match reqwest::Url::parse(target) {
        Ok(url) => url.host_str().unwrap_or("").to_string(),
        Err(_) => return LinkStatus::Broken,
    };
    limiter.wait_for(&host);

    match client.head(target).send().await {
        Ok(resp) if resp.status().as_u16() == 405 => match client.get(target).send().await {
            Ok(resp) => status_from_code(resp.status().as_u16()),
            Err(_) => LinkStatus::Broken,
        },
        Ok(resp) => status_from_code(resp.status().as_u16()),
        Err(_) => LinkStatus::Broken,
    }
}

fn status_from_code(code: u16) -> LinkStatus {
    if (200..400).contains(&code) {
        LinkStatus::Ok
    } else {
        LinkStatus::Broken
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_enrich::HashEmbeddingProvider;
    use kiln_parser::parse_markdown;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn repo() -> Repository {
        Repository::open_in_memory(Arc::new(HashEmbeddingProvider::new())).unwrap()
    }

    #[tokio::test]
    async fn internal_link_to_existing_file_is_ok() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("target.md"), "hello").unwrap();
        let source_path = dir.path().join("source.md");

        let repo = repo();
        let parsed = parse_markdown("# Title\n[see](target.md)");
        let (id, _) = repo.upsert(source_path.to_str().unwrap(), &parsed).unwrap();

        let results = repo
            .validate_links(id, source_path.to_str().unwrap(), true)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, LinkStatus::Ok);
    }

    #[tokio::test]
    async fn internal_link_to_missing_file_is_broken() {
        let dir = TempDir::new().unwrap();
        let source_path = dir.path().join("source.md");

        let repo = repo();
        let parsed = parse_markdown("# Title\n[see](missing.md)");
        let (id, _) = repo.upsert(source_path.to_str().unwrap(), &parsed).unwrap();

        let results = repo
            .validate_links(id, source_path.to_str().unwrap(), true)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, LinkStatus::Broken);
    }

    #[tokio::test]
    async fn anchor_only_internal_link_is_ok() {
        let dir = TempDir::new().unwrap();
        let source_path = dir.path().join("source.md");

        let repo = repo();
        let parsed = parse_markdown("# Title\n[see](#section)");
        let (id, _) = repo.upsert(source_path.to_str().unwrap(), &parsed).unwrap();

        let results = repo
            .validate_links(id, source_path.to_str().unwrap(), true)
            .await
            .unwrap();
        assert_eq!(results[0].status, LinkStatus::Ok);
    }

    #[tokio::test]
    async fn external_link_is_skipped_when_check_external_is_false() {
        let dir = TempDir::new().unwrap();
        let source_path = dir.path().join("source.md");

        let repo = repo();
        let parsed = parse_markdown("# Title\n[see](https://example.invalid/page)");
        let (id, _) = repo.upsert(source_path.to_str().unwrap(), &parsed).unwrap();

        let results = repo
            .validate_links(id, source_path.to_str().unwrap(), false)
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
