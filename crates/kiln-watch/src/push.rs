use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use notify::event::ModifyKind;
use notify::{EventKind, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, DebouncedEvent};

use kiln_store::Repository;

use crate::error::{Result, WatchError};
use crate::{drain_and_apply, WatchRunResult};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Watch `roots` recursively via OS filesystem notifications, filtered by
/// `extensions`. Each debounced batch is enqueued and drained immediately.
/// Runs until `duration` elapses (or forever if `None`), performing one
/// final flush before returning.
pub fn watch_loop_push(
    repo: &Repository,
    roots: &[PathBuf],
    extensions: &[String],
    debounce: Duration,
    duration: Option<Duration>,
) -> Result<WatchRunResult> {
    let lowered: Vec<String> = extensions
        .iter()
        .map(|e| e.trim_start_matches('.').to_lowercase())
        .collect();

    let (tx, rx) = mpsc::channel::<DebounceEventResult>();
    let mut debouncer =
        new_debouncer(debounce, None, tx).map_err(|e| WatchError::Notify(e.to_string()))?;

    for root in roots {
        std::fs::create_dir_all(root)?;
        debouncer
            .watch(root.as_path(), RecursiveMode::Recursive)
            .map_err(|e| WatchError::Notify(e.to_string()))?;
    }

    let mut total = WatchRunResult::default();
    let started = Instant::now();

    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(Ok(events)) => {
                apply_batch(repo, events, &lowered, &mut total)?;
            }
            Ok(Err(_errors)) => {}
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }

        if let Some(cap) = duration {
            if started.elapsed() >= cap {
                break;
            }
        }
    }

    while let Ok(Ok(events)) = rx.try_recv() {
        apply_batch(repo, events, &lowered, &mut total)?;
    }
    drain_and_apply(repo)?;

    Ok(total)
}

fn apply_batch(
    repo: &Repository,
    events: Vec<DebouncedEvent>,
    extensions: &[String],
    total: &mut WatchRunResult,
) -> Result<()> {
    let (changed, deleted) = partition_events(events, extensions);
    if changed.is_empty() && deleted.is_empty() {
        return Ok(());
    }

    let changed_strs: Vec<String> = changed.iter().map(path_to_string).collect();
    let deleted_strs: Vec<String> = deleted.iter().map(path_to_string).collect();

    repo.enqueue(&changed_strs, &deleted_strs)?;
    drain_and_apply(repo)?;

    total.modified += changed.len() as u64;
    total.deleted += deleted.len() as u64;
    Ok(())
}

fn path_to_string(path: &PathBuf) -> String {
    path.to_string_lossy().to_string()
}

fn matches_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|ext| ext == &e.to_lowercase()))
        .unwrap_or(false)
}

/// Accumulate changed/deleted sets from a debounced batch. A rename is
/// modelled as delete(source) + change(destination).
fn partition_events(
    events: Vec<DebouncedEvent>,
    extensions: &[String],
) -> (HashSet<PathBuf>, HashSet<PathBuf>) {
    let mut changed = HashSet::new();
    let mut deleted = HashSet::new();

    for debounced in events {
        let event = debounced.event;
        let is_rename = matches!(event.kind, EventKind::Modify(ModifyKind::Name(_)));

        if is_rename && event.paths.len() == 2 {
            let (from, to) = (&event.paths[0], &event.paths[1]);
            if matches_extension(from, extensions) {
                changed.remove(from);
                deleted.insert(from.clone());
            }
            if matches_extension(to, extensions) {
                deleted.remove(to);
                changed.insert(to.clone());
            }
            continue;
        }

        let is_remove = matches!(event.kind, EventKind::Remove(_));
        for path in &event.paths {
            if !matches_extension(path, extensions) {
                continue;
            }
            if is_remove {
                deleted.insert(path.clone());
                changed.remove(path);
            } else {
                changed.insert(path.clone());
                deleted.remove(path);
            }
        }
    }

    (changed, deleted)
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
    fn created_file_is_ingested_within_duration_window() {
        let dir = TempDir::new().unwrap();
        let repo = repo();
        let roots = vec![dir.path().to_path_buf()];
        let extensions = vec!["md".to_string()];

        let watch_dir = dir.path().to_path_buf();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(150));
            std::fs::write(watch_dir.join("a.md"), "# A\nbody").unwrap();
        });

        let result = watch_loop_push(
            &repo,
            &roots,
            &extensions,
            Duration::from_millis(50),
            Some(Duration::from_secs(2)),
        )
        .unwrap();
        handle.join().unwrap();

        assert!(result.modified >= 1);
        assert_eq!(repo.list_documents().unwrap().len(), 1);
    }
}
