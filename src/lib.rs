//! # hotswap-supervisor
//!
//! Polling file-change supervision with broadcast notifications, the engine
//! behind hot reload of externally stored configuration.
//!
//! ## Overview
//!
//! `hotswap-supervisor` watches a set of files that can change while it runs:
//! - One polling task per file compares modification times every interval
//! - A single watch loop multiplexes every file's change signal
//! - Each change is broadcast to every subscriber in its own task
//! - Files and subscribers can be added or removed at any time
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hotswap_supervisor::prelude::*;
//! use hotswap_supervisor::sources::ReloadingFile;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<()> {
//! let supervisor = Supervisor::builder()
//!     .with_file_kind("conf/app.ini", FileKind::Ini, Duration::from_secs(1))
//!     .build()?;
//!
//! // Keep a parsed copy that refreshes itself on every change
//! let app = Arc::new(ReloadingFile::load("conf/app.ini", FileKind::Ini)?);
//! supervisor.add_subscriber(app.clone());
//!
//! supervisor.start()?;
//!
//! // Lock-free read of the latest content
//! let ip = app.get().get_string("server.ip");
//!
//! supervisor.stop().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Detection limits
//!
//! Changes are found by polling modification times, not by OS file events.
//! Two writes within the filesystem's timestamp resolution count as one,
//! and a file that is missing during a poll is simply checked again on the
//! next tick.
//!
//! ## Feature Flags
//!
//! - `metrics`: OpenTelemetry counters and gauges for the watch loop

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod notify;
pub mod sources;

#[cfg(feature = "metrics")]
pub mod metrics;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{Supervisor, SupervisorBuilder, SupervisorConfig, SupervisorState};
    pub use crate::error::{Result, WatchError};
    pub use crate::notify::{Subscriber, SubscriptionHandle, subscriber_fn};
    pub use crate::sources::FileKind;
}
