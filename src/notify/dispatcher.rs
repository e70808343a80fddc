//! Fan-out of change notifications to subscribers.

use super::subscriber::{Snapshot, Subscriber, SubscriberRegistry};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::trace;

/// Broadcasts one change to every subscriber in a registry snapshot.
///
/// Each subscriber runs in its own task, so a slow, hung or panicking
/// subscriber affects neither its peers nor the caller. Delivery is best
/// effort with no ordering among subscribers.
///
/// An optional limit caps how many notifications run at once for each
/// subscriber. Further notifications for that subscriber wait for a
/// permit. A hung subscriber holds only its own permits, so its peers
/// keep receiving every change.
#[derive(Clone)]
pub struct Dispatcher {
    registry: SubscriberRegistry,
    limit: Option<PerSubscriberLimit>,
}

#[derive(Clone)]
struct PerSubscriberLimit {
    max: usize,
    permits: Arc<Mutex<HashMap<u64, Arc<Semaphore>>>>,
}

impl PerSubscriberLimit {
    /// One semaphore per snapshot entry, in snapshot order. Semaphores of
    /// entries that left the registry are released.
    fn semaphores(&self, snapshot: &Snapshot) -> Vec<Arc<Semaphore>> {
        let ids: HashSet<u64> = snapshot.entries().map(|(id, _)| id).collect();
        let mut permits = self.permits.lock();
        permits.retain(|id, _| ids.contains(id));

        snapshot
            .entries()
            .map(|(id, _)| {
                Arc::clone(
                    permits
                        .entry(id)
                        .or_insert_with(|| Arc::new(Semaphore::new(self.max))),
                )
            })
            .collect()
    }
}

impl Dispatcher {
    /// Create a dispatcher over `registry` with no concurrency bound.
    pub fn new(registry: SubscriberRegistry) -> Self {
        Self {
            registry,
            limit: None,
        }
    }

    /// Bound the number of notifications running at the same time for any
    /// one subscriber.
    ///
    /// A limit of zero is treated as one.
    pub fn with_limit(mut self, max_concurrent: usize) -> Self {
        self.limit = Some(PerSubscriberLimit {
            max: max_concurrent.max(1),
            permits: Arc::new(Mutex::new(HashMap::new())),
        });
        self
    }

    /// Registry this dispatcher reads from.
    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    /// Notify every current subscriber that `path` changed.
    ///
    /// Returns immediately with the number of subscribers in the snapshot.
    /// Must be called from within a Tokio runtime.
    pub fn dispatch(&self, path: &Path) -> usize {
        let snapshot = self.registry.snapshot();
        let path: Arc<Path> = Arc::from(path);

        trace!(path = %path.display(), subscribers = snapshot.len(), "dispatching change");

        match &self.limit {
            Some(limit) => {
                for (subscriber, permits) in snapshot.iter().zip(limit.semaphores(&snapshot)) {
                    spawn_notify(Arc::clone(subscriber), Arc::clone(&path), Some(permits));
                }
            }
            None => {
                for subscriber in snapshot.iter() {
                    spawn_notify(Arc::clone(subscriber), Arc::clone(&path), None);
                }
            }
        }

        snapshot.len()
    }
}

fn spawn_notify(subscriber: Arc<dyn Subscriber>, path: Arc<Path>, limit: Option<Arc<Semaphore>>) {
    tokio::spawn(async move {
        let _permit = match limit {
            Some(limit) => match limit.acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(_) => return,
            },
            None => None,
        };
        subscriber.notify(&path).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::subscriber::subscriber_fn;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    struct Forward(mpsc::UnboundedSender<PathBuf>);

    #[async_trait]
    impl Subscriber for Forward {
        async fn notify(&self, path: &Path) {
            let _ = self.0.send(path.to_path_buf());
        }
    }

    struct Hang;

    #[async_trait]
    impl Subscriber for Hang {
        async fn notify(&self, _path: &Path) {
            std::future::pending::<()>().await;
        }
    }

    struct Gate {
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Subscriber for Gate {
        async fn notify(&self, _path: &Path) {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_dispatch_reaches_every_subscriber() {
        let registry = SubscriberRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.add(Arc::new(Forward(tx.clone())));
        registry.add(Arc::new(Forward(tx)));

        let dispatcher = Dispatcher::new(registry);
        assert_eq!(dispatcher.dispatch(Path::new("a.ini")), 2);

        for _ in 0..2 {
            let path = timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
            assert_eq!(path, Some(PathBuf::from("a.ini")));
        }
    }

    #[tokio::test]
    async fn test_failing_subscribers_are_isolated() {
        let registry = SubscriberRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.add(subscriber_fn(|_| panic!("subscriber blew up")));
        registry.add(Arc::new(Hang));
        registry.add(Arc::new(Forward(tx)));

        let dispatcher = Dispatcher::new(registry);
        dispatcher.dispatch(Path::new("a.ini"));
        dispatcher.dispatch(Path::new("b.ini"));

        let mut seen = Vec::new();
        for _ in 0..2 {
            seen.push(timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap());
        }
        seen.sort();
        assert_eq!(seen, vec![PathBuf::from("a.ini"), PathBuf::from("b.ini")]);
    }

    #[tokio::test]
    async fn test_limit_bounds_concurrency_per_subscriber() {
        let registry = SubscriberRegistry::new();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        registry.add(Arc::new(Gate {
            running: Arc::clone(&running),
            peak: Arc::clone(&peak),
        }));

        let dispatcher = Dispatcher::new(registry).with_limit(2);
        for _ in 0..6 {
            dispatcher.dispatch(Path::new("a.ini"));
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(running.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_hung_subscriber_under_limit_does_not_starve_peers() {
        let registry = SubscriberRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.add(Arc::new(Hang));
        registry.add(Arc::new(Forward(tx)));

        let dispatcher = Dispatcher::new(registry).with_limit(1);
        dispatcher.dispatch(Path::new("a.ini"));
        dispatcher.dispatch(Path::new("b.ini"));

        let first = timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        let second = timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert_eq!(first, Some(PathBuf::from("a.ini")));
        assert_eq!(second, Some(PathBuf::from("b.ini")));
    }

    #[tokio::test]
    async fn test_removed_subscriber_releases_its_limit() {
        let registry = SubscriberRegistry::new();
        let kept = subscriber_fn(|_| {});
        let removed = subscriber_fn(|_| {});
        registry.add(kept);
        registry.add(removed.clone());

        let dispatcher = Dispatcher::new(registry.clone()).with_limit(1);
        dispatcher.dispatch(Path::new("a.ini"));
        assert_eq!(dispatcher.limit.as_ref().unwrap().permits.lock().len(), 2);

        registry.remove(&removed);
        dispatcher.dispatch(Path::new("a.ini"));
        assert_eq!(dispatcher.limit.as_ref().unwrap().permits.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_with_no_subscribers() {
        let dispatcher = Dispatcher::new(SubscriberRegistry::new());
        assert_eq!(dispatcher.dispatch(Path::new("a.ini")), 0);
    }
}
