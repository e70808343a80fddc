//! Subscribers and the registry they live in.

use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Something that wants to hear about file changes.
///
/// Only the path is delivered; implementations re-read the file themselves.
/// Failures are the subscriber's own business: a panic inside `notify` is
/// contained in the task that ran it.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Called once per detected change of `path`.
    async fn notify(&self, path: &Path);
}

/// Adapter turning a plain closure into a [`Subscriber`].
pub struct FnSubscriber<F>(F);

#[async_trait]
impl<F> Subscriber for FnSubscriber<F>
where
    F: Fn(&Path) + Send + Sync,
{
    async fn notify(&self, path: &Path) {
        (self.0)(path)
    }
}

/// Wrap a closure as a shareable subscriber.
///
/// # Examples
///
/// ```rust
/// use hotswap_supervisor::notify::subscriber_fn;
///
/// let subscriber = subscriber_fn(|path| println!("{} changed", path.display()));
/// ```
pub fn subscriber_fn<F>(callback: F) -> Arc<dyn Subscriber>
where
    F: Fn(&Path) + Send + Sync + 'static,
{
    Arc::new(FnSubscriber(callback))
}

#[derive(Clone)]
struct Entry {
    id: u64,
    subscriber: Arc<dyn Subscriber>,
}

struct RegistryInner {
    entries: ArcSwap<Vec<Entry>>,
    next_id: AtomicU64,
}

impl RegistryInner {
    fn remove_id(&self, id: u64) {
        self.entries.rcu(|current| {
            current
                .iter()
                .filter(|entry| entry.id != id)
                .cloned()
                .collect::<Vec<_>>()
        });
    }
}

fn same_instance(a: &Arc<dyn Subscriber>, b: &Arc<dyn Subscriber>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Handle for a subscription that can be dropped to unsubscribe.
///
/// When the handle is dropped, the subscription is removed immediately. A
/// broadcast already in flight still completes with the snapshot it took.
pub struct SubscriptionHandle {
    id: u64,
    registry: Arc<RegistryInner>,
}

impl SubscriptionHandle {
    /// Keep the subscription alive for the lifetime of the registry.
    pub fn detach(self) {
        std::mem::forget(self);
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.registry.remove_id(self.id);
    }
}

/// An immutable view of the subscribers at one instant.
///
/// Later additions and removals never show up in a snapshot that has
/// already been taken.
pub struct Snapshot(Arc<Vec<Entry>>);

impl Snapshot {
    /// Subscribers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Subscriber>> {
        self.0.iter().map(|entry| &entry.subscriber)
    }

    /// Subscribers paired with their registry entry id.
    pub(crate) fn entries(&self) -> impl Iterator<Item = (u64, &Arc<dyn Subscriber>)> {
        self.0.iter().map(|entry| (entry.id, &entry.subscriber))
    }

    /// Number of subscribers captured.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no subscriber was captured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Ordered set of subscribers, safe to mutate while broadcasts run.
///
/// Duplicates are allowed. Writers publish a fresh sequence with
/// copy-on-write, so readers only ever see whole versions.
///
/// # Examples
///
/// ```rust
/// use hotswap_supervisor::notify::{SubscriberRegistry, subscriber_fn};
///
/// let registry = SubscriberRegistry::new();
/// let subscriber = subscriber_fn(|_| {});
///
/// registry.add(subscriber.clone());
/// assert_eq!(registry.len(), 1);
///
/// assert!(registry.remove(&subscriber));
/// assert!(registry.is_empty());
/// ```
pub struct SubscriberRegistry {
    inner: Arc<RegistryInner>,
}

impl SubscriberRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                entries: ArcSwap::from_pointee(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    fn push(&self, subscriber: Arc<dyn Subscriber>) -> u64 {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = Entry { id, subscriber };
        self.inner.entries.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(entry.clone());
            next
        });
        id
    }

    /// Append a subscriber.
    pub fn add(&self, subscriber: Arc<dyn Subscriber>) {
        self.push(subscriber);
    }

    /// Append a closure subscriber, removed again when the handle drops.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&Path) + Send + Sync + 'static,
    {
        let id = self.push(subscriber_fn(callback));
        SubscriptionHandle {
            id,
            registry: Arc::clone(&self.inner),
        }
    }

    /// Remove the first entry referring to the same subscriber instance.
    ///
    /// Returns `false` if it was not registered; that is not an error.
    pub fn remove(&self, subscriber: &Arc<dyn Subscriber>) -> bool {
        let mut removed = false;
        self.inner.entries.rcu(|current| {
            removed = false;
            let mut next = Vec::with_capacity(current.len());
            for entry in current.iter() {
                if !removed && same_instance(&entry.subscriber, subscriber) {
                    removed = true;
                } else {
                    next.push(entry.clone());
                }
            }
            next
        });
        removed
    }

    /// Take a snapshot for one broadcast round.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot(self.inner.entries.load_full())
    }

    /// Get the number of registered subscribers.
    pub fn len(&self) -> usize {
        self.inner.entries.load().len()
    }

    /// Whether no subscriber is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SubscriberRegistry {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
