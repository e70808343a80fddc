//! A subscriber that keeps the latest parse of one file.

use super::{FileKind, FileSource};
use crate::error::Result;
use crate::notify::Subscriber;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Holds the most recent successful parse of a watched file.
///
/// Register it as a subscriber for its own path. Every notification
/// re-reads the file; if the new content fails to parse, the previous
/// value is kept. Reads are lock-free.
///
/// # Examples
///
/// ```rust,no_run
/// use hotswap_supervisor::prelude::*;
/// use hotswap_supervisor::sources::ReloadingFile;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn example() -> Result<()> {
/// let supervisor = Supervisor::new();
/// supervisor.register("conf/app.ini", FileKind::Ini, Duration::from_secs(1))?;
///
/// let app = Arc::new(ReloadingFile::load("conf/app.ini", FileKind::Ini)?);
/// supervisor.add_subscriber(app.clone());
/// supervisor.start()?;
///
/// let ip = app.get().get_string("server.ip");
/// # Ok(())
/// # }
/// ```
pub struct ReloadingFile {
    source: FileSource,
    current: ArcSwap<config::Config>,
}

impl ReloadingFile {
    /// Parse `path` once and keep the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial read or parse fails.
    pub fn load(path: impl Into<std::path::PathBuf>, kind: FileKind) -> Result<Self> {
        let source = FileSource::new(path, kind);
        let initial = source.load()?;
        Ok(Self {
            source,
            current: ArcSwap::from_pointee(initial),
        })
    }

    /// Latest successfully parsed content.
    pub fn get(&self) -> Arc<config::Config> {
        self.current.load_full()
    }

    /// Re-read the file now.
    ///
    /// # Errors
    ///
    /// Returns the load error; the previous content stays current.
    pub fn reload(&self) -> Result<()> {
        let parsed = self.source.load()?;
        self.current.store(Arc::new(parsed));
        Ok(())
    }
}

#[async_trait]
impl Subscriber for ReloadingFile {
    async fn notify(&self, path: &Path) {
        if path != self.source.path() {
            return;
        }

        // The parse is synchronous file IO; keep it off the async workers.
        let source = self.source.clone();
        match tokio::task::spawn_blocking(move || source.load()).await {
            Ok(Ok(parsed)) => {
                self.current.store(Arc::new(parsed));
                debug!(path = %path.display(), "reloaded");
            }
            Ok(Err(err)) => {
                warn!(path = %path.display(), error = %err, "reload failed, keeping previous content")
            }
            Err(err) => warn!(path = %path.display(), error = %err, "reload task failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_notify_reloads_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.ini");
        fs::write(&path, "[server]\nip=127.0.0.1\n").unwrap();

        let file = ReloadingFile::load(&path, FileKind::Ini).unwrap();
        assert_eq!(file.get().get_string("server.ip").unwrap(), "127.0.0.1");

        fs::write(&path, "[server]\nip=0.0.0.0\n").unwrap();
        file.notify(&path).await;
        assert_eq!(file.get().get_string("server.ip").unwrap(), "0.0.0.0");
    }

    #[tokio::test]
    async fn test_other_paths_are_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.ini");
        fs::write(&path, "[server]\nip=127.0.0.1\n").unwrap();

        let file = ReloadingFile::load(&path, FileKind::Ini).unwrap();
        fs::write(&path, "[server]\nip=0.0.0.0\n").unwrap();
        file.notify(&temp_dir.path().join("other.ini")).await;

        assert_eq!(file.get().get_string("server.ip").unwrap(), "127.0.0.1");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_notify_reloads_off_the_worker_thread() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.toml");
        fs::write(&path, "[server]\nport = 8080\n").unwrap();

        let file = Arc::new(ReloadingFile::load(&path, FileKind::Toml).unwrap());
        fs::write(&path, "[server]\nport = 9090\n").unwrap();

        // A single worker stays free while the parse runs on the blocking pool.
        let reloader = Arc::clone(&file);
        let notified = tokio::spawn(async move { reloader.notify(&path).await });
        tokio::time::timeout(std::time::Duration::from_secs(2), notified)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(file.get().get_int("server.port").unwrap(), 9090);
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.json");
        fs::write(&path, r#"{"server": {"port": 8080}}"#).unwrap();

        let file = ReloadingFile::load(&path, FileKind::Json).unwrap();
        fs::write(&path, r#"{"server": "#).unwrap();
        file.notify(&path).await;

        assert_eq!(file.get().get_int("server.port").unwrap(), 8080);
        assert!(file.reload().is_err());
    }
}
