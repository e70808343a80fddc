//! Supervisor metrics tracking using OpenTelemetry.

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Gauge, Meter};
use std::path::Path;

/// Metrics collector for the watch loop.
///
/// # Examples
///
/// ```rust,no_run
/// use hotswap_supervisor::metrics::WatchMetrics;
/// use opentelemetry::global;
/// use std::path::Path;
///
/// let metrics = WatchMetrics::new(global::meter("hotswap-supervisor"));
///
/// metrics.record_change(Path::new("conf/app.ini"));
/// metrics.record_dispatch(3);
/// ```
#[derive(Clone)]
pub struct WatchMetrics {
    changes_detected: Counter<u64>,
    notifications_dispatched: Counter<u64>,
    sync_cycles: Counter<u64>,
    active_watchers: Gauge<i64>,
}

impl WatchMetrics {
    /// Create a new metrics collector with the provided meter.
    pub fn new(meter: Meter) -> Self {
        let changes_detected = meter
            .u64_counter("hotswap_supervisor.changes.detected")
            .with_description("Number of file modifications observed")
            .build();

        let notifications_dispatched = meter
            .u64_counter("hotswap_supervisor.notifications.dispatched")
            .with_description("Number of subscriber notifications spawned")
            .build();

        let sync_cycles = meter
            .u64_counter("hotswap_supervisor.sync.cycles")
            .with_description("Number of membership synchronization cycles")
            .build();

        let active_watchers = meter
            .i64_gauge("hotswap_supervisor.watchers.active")
            .with_description("Number of files currently polled")
            .build();

        Self {
            changes_detected,
            notifications_dispatched,
            sync_cycles,
            active_watchers,
        }
    }

    /// Record one detected change of `path`.
    pub fn record_change(&self, path: &Path) {
        self.changes_detected
            .add(1, &[KeyValue::new("path", path.display().to_string())]);
    }

    /// Record a broadcast that reached `subscribers` subscribers.
    pub fn record_dispatch(&self, subscribers: usize) {
        self.notifications_dispatched.add(subscribers as u64, &[]);
    }

    /// Record a synchronization cycle that left `watchers` files active.
    pub fn record_sync(&self, watchers: usize) {
        self.sync_cycles.add(1, &[]);
        self.active_watchers.record(watchers as i64, &[]);
    }
}
