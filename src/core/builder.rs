//! Builder for constructing Supervisor instances.

use crate::core::{Supervisor, SupervisorConfig};
use crate::error::Result;
use crate::notify::{Dispatcher, Subscriber, SubscriberRegistry};
use crate::sources::FileKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "metrics")]
use crate::metrics::WatchMetrics;

struct FileSpec {
    path: PathBuf,
    kind: Option<FileKind>,
    interval: Option<Duration>,
}

impl FileSpec {
    /// Fill in the kind from the extension and the interval from `default`.
    fn resolve(self, default: Duration) -> Result<(PathBuf, FileKind, Duration)> {
        let kind = match self.kind {
            Some(kind) => kind,
            None => FileKind::from_path(&self.path)?,
        };
        Ok((self.path, kind, self.interval.unwrap_or(default)))
    }
}

/// Builder for constructing a [`Supervisor`].
///
/// Provides a fluent interface for the initial file set, subscribers and
/// notification limits.
///
/// # Examples
///
/// ```rust,no_run
/// use hotswap_supervisor::prelude::*;
/// use std::time::Duration;
///
/// # fn example() -> Result<()> {
/// let supervisor = Supervisor::builder()
///     .with_default_interval(Duration::from_secs(1))
///     .with_file("conf/app.ini")
///     .with_file_kind("conf/feature.data", FileKind::Json, Duration::from_secs(5))
///     .with_max_concurrent_notifications(16)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct SupervisorBuilder {
    files: Vec<FileSpec>,
    default_interval: Duration,
    subscribers: Vec<Arc<dyn Subscriber>>,
    max_concurrent: Option<usize>,
    #[cfg(feature = "metrics")]
    metrics: Option<WatchMetrics>,
}

impl SupervisorBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        let defaults = SupervisorConfig::default();
        Self {
            files: Vec::new(),
            default_interval: defaults.default_interval(),
            subscribers: Vec::new(),
            max_concurrent: defaults.max_concurrent_notifications,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Apply settings loaded from a [`SupervisorConfig`].
    ///
    /// Files listed in the config are added after any already on the builder.
    pub fn with_config(mut self, config: SupervisorConfig) -> Self {
        self.default_interval = config.default_interval();
        self.max_concurrent = config.max_concurrent_notifications;
        for entry in config.files {
            self.files.push(FileSpec {
                path: entry.path,
                kind: entry.kind,
                interval: entry.interval_secs.map(Duration::from_secs),
            });
        }
        self
    }

    /// Watch a file, detecting its kind from the extension and polling at
    /// the default interval.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push(FileSpec {
            path: path.into(),
            kind: None,
            interval: None,
        });
        self
    }

    /// Watch a file with an explicit kind and interval.
    pub fn with_file_kind(
        mut self,
        path: impl Into<PathBuf>,
        kind: FileKind,
        interval: Duration,
    ) -> Self {
        self.files.push(FileSpec {
            path: path.into(),
            kind: Some(kind),
            interval: Some(interval),
        });
        self
    }

    /// Polling interval for files added without one.
    pub fn with_default_interval(mut self, interval: Duration) -> Self {
        self.default_interval = interval;
        self
    }

    /// Register a subscriber before the supervisor starts.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscriber>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Cap the number of notifications running at once for each subscriber.
    pub fn with_max_concurrent_notifications(mut self, max: usize) -> Self {
        self.max_concurrent = Some(max);
        self
    }

    /// Report loop activity through OpenTelemetry.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, meter: opentelemetry::metrics::Meter) -> Self {
        self.metrics = Some(WatchMetrics::new(meter));
        self
    }

    /// Build the supervisor and register every listed file.
    ///
    /// The supervisor is returned not yet started.
    ///
    /// # Errors
    ///
    /// Returns an error if any file has an unknown extension, a zero
    /// interval, or conflicting kinds.
    pub fn build(self) -> Result<Supervisor> {
        let registry = SubscriberRegistry::new();
        for subscriber in self.subscribers {
            registry.add(subscriber);
        }

        let mut dispatcher = Dispatcher::new(registry);
        if let Some(max) = self.max_concurrent {
            dispatcher = dispatcher.with_limit(max);
        }

        #[cfg(feature = "metrics")]
        let supervisor = Supervisor::from_dispatcher_with_metrics(dispatcher, self.metrics);
        #[cfg(not(feature = "metrics"))]
        let supervisor = Supervisor::from_dispatcher(dispatcher);

        for file in self.files {
            let (path, kind, interval) = file.resolve(self.default_interval)?;
            supervisor.register(path, kind, interval)?;
        }

        Ok(supervisor)
    }
}

impl Default for SupervisorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    /// Create a new builder for constructing a supervisor.
    pub fn builder() -> SupervisorBuilder {
        SupervisorBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WatchError;
    use crate::notify::subscriber_fn;
    use std::path::Path;

    #[test]
    fn test_builder_accumulates_files() {
        let builder = SupervisorBuilder::new()
            .with_file("config1.yaml")
            .with_file("config2.toml")
            .with_file_kind("config3.data", FileKind::Ini, Duration::from_secs(1));

        assert_eq!(builder.files.len(), 3);
    }

    #[tokio::test]
    async fn test_build_registers_files_and_subscribers() {
        let supervisor = SupervisorBuilder::new()
            .with_file("conf/app.ini")
            .with_file_kind("conf/feature.data", FileKind::Json, Duration::from_secs(5))
            .with_subscriber(subscriber_fn(|_| {}))
            .build()
            .unwrap();

        assert!(supervisor.is_registered(Path::new("conf/app.ini")));
        assert!(supervisor.is_registered(Path::new("conf/feature.data")));
        assert_eq!(supervisor.subscribers().len(), 1);
    }

    #[test]
    fn test_build_rejects_unknown_extension() {
        let result = SupervisorBuilder::new().with_file("conf/app.data").build();
        assert!(matches!(result, Err(WatchError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_build_rejects_zero_default_interval() {
        let result = SupervisorBuilder::new()
            .with_default_interval(Duration::ZERO)
            .with_file("conf/app.ini")
            .build();
        assert!(matches!(result, Err(WatchError::InvalidInterval { .. })));
    }

    #[test]
    fn test_with_config() {
        let config = SupervisorConfig {
            default_interval_secs: 7,
            max_concurrent_notifications: Some(4),
            files: vec![crate::core::WatchEntry {
                path: PathBuf::from("conf/app.yaml"),
                kind: None,
                interval_secs: None,
            }],
        };

        let builder = SupervisorBuilder::new().with_config(config);
        assert_eq!(builder.default_interval, Duration::from_secs(7));
        assert_eq!(builder.max_concurrent, Some(4));
        assert_eq!(builder.files.len(), 1);
    }

    #[test]
    fn test_file_spec_falls_back_to_defaults() {
        let defaulted = FileSpec {
            path: PathBuf::from("conf/app.yaml"),
            kind: None,
            interval: None,
        };
        let (_, kind, interval) = defaulted.resolve(Duration::from_secs(7)).unwrap();
        assert_eq!(kind, FileKind::Yaml);
        assert_eq!(interval, Duration::from_secs(7));

        let explicit = FileSpec {
            path: PathBuf::from("conf/app.data"),
            kind: Some(FileKind::Json),
            interval: Some(Duration::from_millis(250)),
        };
        let (_, kind, interval) = explicit.resolve(Duration::from_secs(7)).unwrap();
        assert_eq!(kind, FileKind::Json);
        assert_eq!(interval, Duration::from_millis(250));
    }
}
