//! Change detection and notification.
//!
//! Provides the per-file polling watchers, the subscriber registry and the
//! dispatcher that fans a detected change out to subscribers.

pub mod dispatcher;
pub mod subscriber;
pub mod watcher;

pub use dispatcher::Dispatcher;
pub use subscriber::{
    FnSubscriber, Snapshot, Subscriber, SubscriberRegistry, SubscriptionHandle, subscriber_fn,
};
pub use watcher::WatchedFile;
