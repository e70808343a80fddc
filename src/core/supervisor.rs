//! The supervisor: owner of every file watch and of the loop that
//! multiplexes their change signals.

use crate::core::membership::PendingMembership;
use crate::error::{Result, WatchError};
use crate::notify::watcher::FileWatch;
use crate::notify::{Dispatcher, Subscriber, SubscriberRegistry, SubscriptionHandle, WatchedFile};
use crate::sources::FileKind;
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

#[cfg(feature = "metrics")]
use crate::metrics::WatchMetrics;

const NOT_STARTED: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

/// Lifecycle of a [`Supervisor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Neither `start` nor `watch` has been called
    NotStarted,
    /// The watch loop is running
    Running,
    /// The watch loop has exited and every watcher has been stopped
    Stopped,
}

struct Shared {
    state: AtomicU8,
    membership: Mutex<PendingMembership>,
    membership_changed: Notify,
    dispatcher: Dispatcher,
    shutdown: CancellationToken,
    finished: CancellationToken,
    watchers: TaskTracker,
    #[cfg(feature = "metrics")]
    metrics: Option<WatchMetrics>,
}

/// Polls a changing set of files and tells a changing set of subscribers
/// whenever one of them is modified.
///
/// Files and subscribers can be added or removed at any time, before or
/// after the loop starts. The supervisor is a cheap handle; clones share
/// the same loop.
///
/// # Examples
///
/// ```rust,no_run
/// use hotswap_supervisor::prelude::*;
/// use std::time::Duration;
///
/// # async fn example() -> Result<()> {
/// let supervisor = Supervisor::new();
/// supervisor.register("conf/app.ini", FileKind::Ini, Duration::from_secs(1))?;
///
/// let _handle = supervisor.subscribe(|path| {
///     println!("{} changed", path.display());
/// });
///
/// supervisor.start()?;
/// // ...
/// supervisor.stop().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Supervisor {
    shared: Arc<Shared>,
}

impl Supervisor {
    /// Create a supervisor with no files, no subscribers and no
    /// notification bound.
    pub fn new() -> Self {
        Self::from_dispatcher(Dispatcher::new(SubscriberRegistry::new()))
    }

    pub(crate) fn from_dispatcher(dispatcher: Dispatcher) -> Self {
        Self {
            shared: Arc::new(Shared::new(dispatcher)),
        }
    }

    #[cfg(feature = "metrics")]
    pub(crate) fn from_dispatcher_with_metrics(
        dispatcher: Dispatcher,
        metrics: Option<WatchMetrics>,
    ) -> Self {
        let mut shared = Shared::new(dispatcher);
        shared.metrics = metrics;
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Watch `path`, polling it every `interval`.
    ///
    /// Registering a path again replaces its definition; the new watcher
    /// takes over at the loop's next synchronization point.
    ///
    /// # Errors
    ///
    /// - [`WatchError::InvalidInterval`] if `interval` is zero
    /// - [`WatchError::KindConflict`] if the path is registered with another kind
    pub fn register(
        &self,
        path: impl Into<PathBuf>,
        kind: FileKind,
        interval: Duration,
    ) -> Result<()> {
        let file = WatchedFile::new(path, kind, interval)?;
        debug!(
            path = %file.path().display(),
            kind = %kind,
            interval_ms = interval.as_millis() as u64,
            "registering file"
        );

        self.shared.membership.lock().register(file)?;
        self.shared.membership_changed.notify_one();
        Ok(())
    }

    /// Watch `path`, detecting its kind from the extension.
    pub fn register_file(&self, path: impl Into<PathBuf>, interval: Duration) -> Result<()> {
        let path = path.into();
        let kind = FileKind::from_path(&path)?;
        self.register(path, kind, interval)
    }

    /// Stop watching `path`. Unknown paths are ignored.
    pub fn unregister(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let queued = self.shared.membership.lock().unregister(path);
        if queued {
            debug!(path = %path.display(), "unregistering file");
            self.shared.membership_changed.notify_one();
        }
    }

    /// Whether `path` is registered, active or pending.
    pub fn is_registered(&self, path: impl AsRef<Path>) -> bool {
        self.shared.membership.lock().is_registered(path.as_ref())
    }

    /// Number of registered paths.
    pub fn registered_count(&self) -> usize {
        self.shared.membership.lock().registered_len()
    }

    /// Add a subscriber to every future broadcast.
    pub fn add_subscriber(&self, subscriber: Arc<dyn Subscriber>) {
        self.subscribers().add(subscriber);
    }

    /// Remove the first registration of `subscriber`.
    ///
    /// Matching is by instance: the same `Arc` (or a clone of it) that was
    /// added. Two separately built closures never match, even with the same
    /// body. Returns `false` if it was not registered.
    pub fn remove_subscriber(&self, subscriber: &Arc<dyn Subscriber>) -> bool {
        self.subscribers().remove(subscriber)
    }

    /// Subscribe a closure; dropping the handle unsubscribes it.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&Path) + Send + Sync + 'static,
    {
        self.subscribers().subscribe(callback)
    }

    /// Registry backing this supervisor's broadcasts.
    pub fn subscribers(&self) -> &SubscriberRegistry {
        self.shared.dispatcher.registry()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SupervisorState {
        match self.shared.state.load(Ordering::Acquire) {
            NOT_STARTED => SupervisorState::NotStarted,
            RUNNING => SupervisorState::Running,
            _ => SupervisorState::Stopped,
        }
    }

    /// Number of polling tasks that have not returned yet.
    pub fn live_watchers(&self) -> usize {
        self.shared.watchers.len()
    }

    /// Spawn the watch loop onto the Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::AlreadyStarted`] if the loop was already entered.
    pub fn start(&self) -> Result<JoinHandle<()>> {
        let run = self.enter()?;
        Ok(tokio::spawn(supervise(run)))
    }

    /// Run the watch loop on the current task until [`stop`](Self::stop).
    ///
    /// Dropping the returned future also ends the loop, and the supervisor
    /// moves to [`SupervisorState::Stopped`].
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::AlreadyStarted`] if the loop was already entered.
    pub async fn watch(&self) -> Result<()> {
        let run = self.enter()?;
        supervise(run).await;
        Ok(())
    }

    /// Shut the loop down and wait until every watcher has stopped.
    ///
    /// Calling it again after the loop stopped returns immediately.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::NotStarted`] if the loop was never entered.
    pub async fn stop(&self) -> Result<()> {
        if self.state() == SupervisorState::NotStarted {
            return Err(WatchError::NotStarted);
        }

        self.shared.shutdown.cancel();
        self.shared.finished.cancelled().await;
        self.shared.watchers.wait().await;
        Ok(())
    }

    fn enter(&self) -> Result<LoopGuard> {
        self.shared
            .state
            .compare_exchange(NOT_STARTED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| WatchError::AlreadyStarted)?;
        Ok(LoopGuard {
            shared: Arc::clone(&self.shared),
        })
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Shared {
    fn new(dispatcher: Dispatcher) -> Self {
        Self {
            state: AtomicU8::new(NOT_STARTED),
            membership: Mutex::new(PendingMembership::default()),
            membership_changed: Notify::new(),
            dispatcher,
            shutdown: CancellationToken::new(),
            finished: CancellationToken::new(),
            watchers: TaskTracker::new(),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Apply queued registrations and removals to the active set.
    async fn sync_membership(&self, active: &mut HashMap<PathBuf, FileWatch>) {
        let changes = {
            let mut pending = self.membership.lock();
            if pending.is_settled() {
                return;
            }
            pending.drain()
        };

        let added = changes.add.len();
        for path in &changes.remove {
            if let Some(watch) = active.remove(path) {
                watch.stop().await;
            }
        }

        for (path, file) in changes.add {
            if let Some(previous) = active.remove(&path) {
                previous.stop().await;
            }
            let watch = file.spawn(self.shutdown.child_token(), &self.watchers);
            active.insert(path, watch);
        }

        debug!(
            added,
            removed = changes.remove.len(),
            watchers = active.len(),
            "membership synchronized"
        );

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_sync(active.len());
        }
    }

    fn broadcast(&self, watch: &FileWatch) {
        let subscribers = self.dispatcher.dispatch(watch.path());
        debug!(
            path = %watch.path().display(),
            kind = %watch.kind(),
            subscribers,
            "file changed"
        );

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_change(watch.path());
            metrics.record_dispatch(subscribers);
        }
    }
}

/// Ownership of a running loop, taken when the loop is entered.
///
/// Dropping it marks the loop finished, whether the loop ran to its end or
/// its future was dropped mid-await. Watchers left behind in the second
/// case exit through their child tokens; `stop` waits for them on the
/// tracker.
struct LoopGuard {
    shared: Arc<Shared>,
}

impl Drop for LoopGuard {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
        self.shared.watchers.close();
        self.shared.state.store(STOPPED, Ordering::Release);
        self.shared.finished.cancel();
        info!("supervisor stopped");
    }
}

/// The watch loop.
///
/// `active` is owned by this task alone. Callers reach it only through the
/// pending membership, which is applied at the top of every cycle. The wait
/// set built after a cycle is reused across events and only rebuilt once
/// membership changes again.
async fn supervise(run: LoopGuard) {
    let shared = &run.shared;
    let mut active: HashMap<PathBuf, FileWatch> = HashMap::new();
    info!("supervisor running");

    'supervise: loop {
        shared.sync_membership(&mut active).await;

        let mut wait_set: FuturesUnordered<_> =
            active.values_mut().map(FileWatch::next_change).collect();

        loop {
            tokio::select! {
                biased;
                _ = shared.shutdown.cancelled() => break 'supervise,
                _ = shared.membership_changed.notified() => break,
                Some((watch, changed)) = wait_set.next() => {
                    // A watch whose task is gone drops out until the next cycle.
                    if changed {
                        shared.broadcast(watch);
                        wait_set.push(watch.next_change());
                    }
                }
            }
        }
    }

    let watchers = active.len();
    for (_, watch) in active.drain() {
        watch.stop().await;
    }
    debug!(watchers, "watchers stopped");
}
