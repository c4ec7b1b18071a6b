//! Change watcher.
//!
//! Samples the modification time of a fixed set of files at a fixed interval
//! and broadcasts a reload for every strictly newer timestamp observed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::fanout::NotificationFanout;

/// A file being watched and the newest modification time seen for it.
#[derive(Debug)]
struct WatchedFile {
    path: PathBuf,
    last_modified: SystemTime,
}

/// Polls watched files for modification time increases.
#[derive(Debug)]
pub(crate) struct ChangeWatcher {
    files: Vec<WatchedFile>,
    poll_interval: Duration,
    debounce: Duration,
}

impl ChangeWatcher {
    /// Start watching `paths`.
    ///
    /// Paths that do not exist now are skipped and never retried.
    pub(crate) async fn new(
        paths: impl IntoIterator<Item = PathBuf>,
        poll_interval: Duration,
        debounce: Duration,
    ) -> Self {
        let mut files = Vec::new();
        for path in paths {
            match modified_time(&path).await {
                Some(last_modified) => {
                    tracing::info!(path = %path.display(), "Watching");
                    files.push(WatchedFile {
                        path,
                        last_modified,
                    });
                }
                None => {
                    tracing::warn!(path = %path.display(), "Not watching missing file");
                }
            }
        }

        Self {
            files,
            poll_interval,
            debounce,
        }
    }

    /// Paths currently being watched.
    pub(crate) fn watched(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(|f| f.path.as_path())
    }

    /// Sample every watched file once.
    ///
    /// Returns the paths whose modification time is strictly newer than the
    /// last one seen, in watch order. A file that vanished or can't be read
    /// counts as unchanged.
    pub(crate) async fn poll(&mut self) -> Vec<PathBuf> {
        let mut changed = Vec::new();
        for file in &mut self.files {
            if let Some(modified) = modified_time(&file.path).await
                && modified > file.last_modified
            {
                file.last_modified = modified;
                changed.push(file.path.clone());
            }
        }
        changed
    }

    /// Poll until `shutdown` is cancelled, broadcasting one reload per change.
    ///
    /// Changes found in one poll share a single debounce delay before their
    /// broadcasts go out.
    pub(crate) async fn run(mut self, fanout: Arc<NotificationFanout>, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }

            let changed = self.poll().await;
            if changed.is_empty() {
                continue;
            }

            for path in &changed {
                tracing::info!(path = %path.display(), "File changed");
            }

            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(self.debounce) => {}
            }

            for _ in &changed {
                fanout.broadcast();
            }
        }

        tracing::debug!("Change watcher stopped");
    }
}

async fn modified_time(path: &Path) -> Option<SystemTime> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    metadata.modified().ok()
}
