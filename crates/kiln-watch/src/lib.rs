//! Filesystem observer: polling (snapshot diff) and push (`notify` +
//! `notify-debouncer-full`) modes, both driving the same event queue and
//! drain step on `kiln-store::Repository`.

pub mod error;
mod poll;
mod push;

use std::path::PathBuf;
use std::time::Duration;

use kiln_core::ObserverMode;
use kiln_store::Repository;

pub use error::{Result, WatchError};
pub use poll::{watch_loop as watch_loop_poll, watch_once};
pub use push::watch_loop_push;

const DRAIN_BATCH_SIZE: usize = 64;

/// Totals for one run of either observer mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchRunResult {
    pub created: u64,
    pub modified: u64,
    pub deleted: u64,
}

/// Drain the queue in batches of `DRAIN_BATCH_SIZE` until a scan finds no
/// queued rows, reading, parsing, and upserting changed files and deleting
/// removed ones. An upsert whose file has since disappeared falls back to a
/// delete rather than failing. Read or parse failures (for files that do
/// exist) surface as a transient queue failure so the event is retried per
/// §4.6.
fn drain_and_apply(repo: &Repository) -> error::Result<()> {
    loop {
        let attempted = std::cell::Cell::new(0u64);
        repo.drain(
            DRAIN_BATCH_SIZE,
            |path| {
                attempted.set(attempted.get() + 1);
                if !std::path::Path::new(path).exists() {
                    repo.delete_by_path(path).map_err(|e| e.to_string())?;
                    return Ok(());
                }
                let bytes = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
                let parsed = kiln_parser::parse_markdown(&bytes);
                repo.upsert(path, &parsed).map_err(|e| e.to_string())?;
                Ok(())
            },
            |path| {
                attempted.set(attempted.get() + 1);
                repo.delete_by_path(path).map_err(|e| e.to_string())?;
                Ok(())
            },
        )?;

        if attempted.get() == 0 {
            break;
        }
    }
    Ok(())
}

/// Run the observer according to `mode` until `iterations` (polling) or
/// `duration` (push) elapses. `auto` tries push first and falls back to
/// polling if the platform watcher cannot be constructed.
pub fn run(
    repo: &Repository,
    mode: ObserverMode,
    roots: &[PathBuf],
    extensions: &[String],
    poll_interval: Duration,
    debounce: Duration,
    iterations: Option<u64>,
    duration: Option<Duration>,
) -> error::Result<WatchRunResult> {
    match mode {
        ObserverMode::Polling => poll::watch_loop(repo, roots, extensions, poll_interval, iterations),
        ObserverMode::Push => push::watch_loop_push(repo, roots, extensions, debounce, duration),
        ObserverMode::Auto => {
            match push::watch_loop_push(repo, roots, extensions, debounce, duration) {
                Ok(result) => Ok(result),
                Err(WatchError::Notify(_)) => {
                    poll::watch_loop(repo, roots, extensions, poll_interval, iterations)
                }
                Err(other) => Err(other),
            }
        }
    }
}
