//! Declarative supervisor settings.

use crate::error::Result;
use crate::sources::{FileKind, FileSource};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_interval_secs() -> u64 {
    3
}

/// Settings for a [`Supervisor`](crate::core::Supervisor).
///
/// Can be deserialized from any format the `config` crate reads:
///
/// ```toml
/// default_interval_secs = 2
/// max_concurrent_notifications = 16
///
/// [[files]]
/// path = "conf/app.ini"
///
/// [[files]]
/// path = "conf/feature.json"
/// interval_secs = 1
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorConfig {
    /// Polling interval for files that do not set their own
    #[serde(default = "default_interval_secs")]
    pub default_interval_secs: u64,

    /// Upper bound on notifications running at once per subscriber
    #[serde(default)]
    pub max_concurrent_notifications: Option<usize>,

    /// Files registered when the supervisor is built
    #[serde(default)]
    pub files: Vec<WatchEntry>,
}

/// One file listed in a [`SupervisorConfig`].
#[derive(Debug, Clone, Deserialize)]
pub struct WatchEntry {
    /// Path to poll
    pub path: PathBuf,

    /// Format of the file; detected from the extension when absent
    #[serde(default)]
    pub kind: Option<FileKind>,

    /// Polling interval in seconds; falls back to the default interval
    #[serde(default)]
    pub interval_secs: Option<u64>,
}

impl SupervisorConfig {
    /// Load settings from a YAML, TOML, JSON or INI file.
    ///
    /// # Errors
    ///
    /// Returns an error if the extension is unknown, the file is missing,
    /// or the content does not match the expected shape.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let parsed = FileSource::detect(path.as_ref())?.load()?;
        Ok(parsed.try_deserialize()?)
    }

    /// Default polling interval as a duration.
    pub fn default_interval(&self) -> Duration {
        Duration::from_secs(self.default_interval_secs)
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            default_interval_secs: default_interval_secs(),
            max_concurrent_notifications: None,
            files: Vec::new(),
        }
    }
}
