use std::collections::HashMap;
use std::path::PathBuf;
use std::time::SystemTime;

use kiln_store::Repository;

use crate::error::Result;
use crate::{drain_and_apply, WatchRunResult};

/// `path -> mtime` over every file under `roots` whose lowercased extension
/// is in `extensions`.
fn snapshot(roots: &[PathBuf], extensions: &[String]) -> HashMap<PathBuf, SystemTime> {
    let lowered: Vec<String> = extensions.iter().map(|e| e.to_lowercase()).collect();
    let mut snap = HashMap::new();

    for root in roots {
        if !root.exists() {
            continue;
        }
        walk(root, &lowered, &mut snap);
    }
    snap
}

fn walk(dir: &std::path::Path, extensions: &[String], snap: &mut HashMap<PathBuf, SystemTime>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk(&path, extensions, snap);
            continue;
        }
        let matches_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| extensions.iter().any(|ext| ext.trim_start_matches('.') == e.to_lowercase()))
            .unwrap_or(false);
        if !matches_ext {
            continue;
        }
        if let Ok(metadata) = entry.metadata() {
            if let Ok(modified) = metadata.modified() {
                let resolved = path.canonicalize().unwrap_or(path);
                snap.insert(resolved, modified);
            }
        }
    }
}

/// Run a single polling tick: diff `previous` against a fresh snapshot,
/// enqueue created/modified as upserts and deleted as deletes, then drain.
pub fn watch_once(
    repo: &Repository,
    roots: &[PathBuf],
    extensions: &[String],
    previous: Option<HashMap<PathBuf, SystemTime>>,
) -> Result<(HashMap<PathBuf, SystemTime>, WatchRunResult)> {
    let old = previous.unwrap_or_default();
    let new = snapshot(roots, extensions);

    let created: Vec<PathBuf> = new.keys().filter(|p| !old.contains_key(*p)).cloned().collect();
    let deleted: Vec<PathBuf> = old.keys().filter(|p| !new.contains_key(*p)).cloned().collect();
    let modified: Vec<PathBuf> = new
        .iter()
        .filter(|(p, mtime)| old.get(*p).map(|old_mtime| old_mtime != *mtime).unwrap_or(false))
        .map(|(p, _)| p.clone())
        .collect();

    let created_count = created.len() as u64;
    let modified_count = modified.len() as u64;
    let deleted_count = deleted.len() as u64;

    let changed: Vec<String> = created
        .into_iter()
        .chain(modified)
        .map(|p| p.to_string_lossy().to_string())
        .collect();
    let removed: Vec<String> = deleted.iter().map(|p| p.to_string_lossy().to_string()).collect();

    repo.enqueue(&changed, &removed)?;
    drain_and_apply(repo)?;

    Ok((
        new,
        WatchRunResult {
            created: created_count,
            modified: modified_count,
            deleted: deleted_count,
        },
    ))
}

/// Repeatedly tick with a bounded sleep between polls. `iterations`, if
/// given, caps the number of ticks (used by tests); otherwise loops until
/// the process is interrupted.
pub fn watch_loop(
    repo: &Repository,
    roots: &[PathBuf],
    extensions: &[String],
    interval: std::time::Duration,
    iterations: Option<u64>,
) -> Result<WatchRunResult> {
    let mut total = WatchRunResult::default();
    let mut snapshot_state = None;
    let mut runs = 0u64;

    loop {
        let (new_snapshot, result) = watch_once(repo, roots, extensions, snapshot_state)?;
        snapshot_state = Some(new_snapshot);
        total.created += result.created;
        total.modified += result.modified;
        total.deleted += result.deleted;

        runs += 1;
        if let Some(cap) = iterations {
            if runs >= cap {
                return Ok(total);
            }
        }
        std::thread::sleep(interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_enrich::HashEmbeddingProvider;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn repo() -> Repository {
        Repository::open_in_memory(Arc::new(HashEmbeddingProvider::new())).unwrap()
    }

    #[test]
    fn first_tick_enqueues_all_existing_files_as_created() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.md"), "# A\nbody").unwrap();

        let repo = repo();
        let roots = vec![dir.path().to_path_buf()];
        let extensions = vec![".md".to_string()];

        let (_, result) = watch_once(&repo, &roots, &extensions, None).unwrap();
        assert_eq!(result.created, 1);
        assert_eq!(result.deleted, 0);

        let docs = repo.list_documents().unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn second_tick_detects_no_changes() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.md"), "# A\nbody").unwrap();

        let repo = repo();
        let roots = vec![dir.path().to_path_buf()];
        let extensions = vec![".md".to_string()];

        let (snap, _) = watch_once(&repo, &roots, &extensions, None).unwrap();
        let (_, result) = watch_once(&repo, &roots, &extensions, Some(snap)).unwrap();
        assert_eq!(result.created, 0);
        assert_eq!(result.modified, 0);
        assert_eq!(result.deleted, 0);
    }

    #[test]
    fn deleted_file_is_removed_from_store() {
        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("a.md");
        std::fs::write(&file_path, "# A\nbody").unwrap();

        let repo = repo();
        let roots = vec![dir.path().to_path_buf()];
        let extensions = vec![".md".to_string()];

        let (snap, _) = watch_once(&repo, &roots, &extensions, None).unwrap();
        std::fs::remove_file(&file_path).unwrap();
        let (_, result) = watch_once(&repo, &roots, &extensions, Some(snap)).unwrap();

        assert_eq!(result.deleted, 1);
        assert!(repo.list_documents().unwrap().is_empty());
    }

    #[test]
    fn ignores_files_with_non_matching_extension() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "irrelevant").unwrap();

        let repo = repo();
        let roots = vec![dir.path().to_path_buf()];
        let extensions = vec![".md".to_string()];

        let (_, result) = watch_once(&repo, &roots, &extensions, None).unwrap();
        assert_eq!(result.created, 0);
    }

    #[test]
    fn watch_loop_respects_iteration_cap() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.md"), "# A\nbody").unwrap();

        let repo = repo();
        let roots = vec![dir.path().to_path_buf()];
        let extensions = vec![".md".to_string()];

        let result = watch_loop(
            &repo,
            &roots,
            &extensions,
            std::time::Duration::from_millis(1),
            Some(3),
        )
        .unwrap();
        assert_eq!(result.created, 1);
    }
}
