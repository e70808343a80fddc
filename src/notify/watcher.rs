//! Per-file polling for modification-time changes.
//!
//! Each watched file gets its own task that stats the file once per
//! interval. A change is reported when the observed modification time is
//! strictly newer than the last one recorded. Two writes that land within
//! the filesystem's timestamp resolution look identical and produce a
//! single signal; polling cannot tell them apart.

use crate::error::{Result, WatchError};
use crate::sources::FileKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace};

/// Definition of a file to supervise, not yet polled.
///
/// The baseline modification time is taken when the definition is created,
/// so edits made before registration are not reported.
#[derive(Debug, Clone)]
pub struct WatchedFile {
    path: PathBuf,
    kind: FileKind,
    interval: Duration,
    last_modified: SystemTime,
}

impl WatchedFile {
    /// Create a definition polling `path` every `interval`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::InvalidInterval`] if `interval` is zero.
    pub fn new(path: impl Into<PathBuf>, kind: FileKind, interval: Duration) -> Result<Self> {
        let path = path.into();
        if interval.is_zero() {
            return Err(WatchError::InvalidInterval { path });
        }

        Ok(Self {
            path,
            kind,
            interval,
            last_modified: SystemTime::now(),
        })
    }

    /// Path being watched.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Format recorded for the file.
    pub fn kind(&self) -> FileKind {
        self.kind
    }

    /// Time between two stat calls.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Spawn the polling task on `tracker`.
    pub(crate) fn spawn(self, stop: CancellationToken, tracker: &TaskTracker) -> FileWatch {
        // Capacity 1 plus an awaited send: a busy supervisor stalls polling
        // for this file instead of losing the event.
        let (tx, changes) = mpsc::channel(1);

        debug!(
            path = %self.path.display(),
            interval_ms = self.interval.as_millis() as u64,
            "starting file watch"
        );

        let task = tracker.spawn(poll(
            self.path.clone(),
            self.interval,
            self.last_modified,
            tx,
            stop.clone(),
        ));

        FileWatch {
            path: self.path,
            kind: self.kind,
            changes,
            stop,
            task,
        }
    }
}

/// A running watcher: the receiving end of its change signal plus the means
/// to stop it.
pub(crate) struct FileWatch {
    path: PathBuf,
    kind: FileKind,
    changes: mpsc::Receiver<()>,
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl FileWatch {
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn kind(&self) -> FileKind {
        self.kind
    }

    /// Wait for the next change signal.
    ///
    /// Hands the watch back so the caller can re-arm it. `false` means the
    /// polling task is gone.
    pub(crate) async fn next_change(&mut self) -> (&mut Self, bool) {
        let changed = self.changes.recv().await.is_some();
        (self, changed)
    }

    /// Signal the polling task and wait for it to return.
    pub(crate) async fn stop(self) {
        self.stop.cancel();
        if let Err(err) = self.task.await {
            debug!(path = %self.path.display(), error = %err, "file watch task ended abnormally");
        }
        debug!(path = %self.path.display(), "file watch stopped");
    }
}

async fn poll(
    path: PathBuf,
    interval: Duration,
    mut last_modified: SystemTime,
    tx: mpsc::Sender<()>,
    stop: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => return,
            _ = ticker.tick() => {}
        }

        // Missing or unreadable files are expected mid-rewrite; try again next tick.
        let modified = match tokio::fs::metadata(&path).await.and_then(|meta| meta.modified()) {
            Ok(modified) => modified,
            Err(err) => {
                trace!(path = %path.display(), error = %err, "stat failed, skipping tick");
                continue;
            }
        };

        if modified <= last_modified {
            continue;
        }
        last_modified = modified;
        trace!(path = %path.display(), "modification detected");

        tokio::select! {
            biased;
            _ = stop.cancelled() => return,
            sent = tx.send(()) => {
                if sent.is_err() {
                    return;
                }
            }
        }
    }
}
