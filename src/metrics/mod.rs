//! Built-in metrics for supervisor activity.
//!
//! Provides OpenTelemetry metrics tracking:
//! - Changes detected per file
//! - Notifications dispatched to subscribers
//! - Membership synchronization cycles
//! - Active watchers
//!
//! # Examples
//!
//! ```rust,no_run
//! use hotswap_supervisor::prelude::*;
//! use opentelemetry::global;
//!
//! # fn example() -> Result<()> {
//! let meter = global::meter("my-app");
//!
//! let supervisor = Supervisor::builder()
//!     .with_file("conf/app.ini")
//!     .with_metrics(meter)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod watch_metrics;

pub use watch_metrics::WatchMetrics;
