//! File kinds and re-reading of watched files.

use crate::error::{Result, WatchError};
use config::{File, FileFormat};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Structured format of a watched file.
///
/// The supervisor only records the kind; it is consumed by whoever re-reads
/// the file after a change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// INI sections and `key=value` pairs
    Ini,
    /// JSON document
    Json,
    /// YAML document
    Yaml,
    /// TOML document
    Toml,
}

impl FileKind {
    /// Detect the kind from a file extension.
    ///
    /// - `.ini` -> INI
    /// - `.json` -> JSON
    /// - `.yaml`, `.yml` -> YAML
    /// - `.toml` -> TOML
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::UnsupportedFormat`] for any other extension, or
    /// when the path has none.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| WatchError::UnsupportedFormat(path.to_path_buf()))?;

        match extension {
            "ini" => Ok(Self::Ini),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            _ => Err(WatchError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    fn format(self) -> FileFormat {
        match self {
            Self::Ini => FileFormat::Ini,
            Self::Json => FileFormat::Json,
            Self::Yaml => FileFormat::Yaml,
            Self::Toml => FileFormat::Toml,
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ini => "ini",
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Toml => "toml",
        };
        f.write_str(name)
    }
}

/// Reads a watched file into a key-value [`config::Config`].
///
/// # Examples
///
/// ```rust,no_run
/// use hotswap_supervisor::sources::{FileKind, FileSource};
///
/// let source = FileSource::new("conf/app.ini", FileKind::Ini);
/// let parsed = source.load().unwrap();
/// let ip = parsed.get_string("server.ip").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    kind: FileKind,
}

impl FileSource {
    /// Create a source for `path` parsed as `kind`.
    pub fn new(path: impl Into<PathBuf>, kind: FileKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Create a source, detecting the kind from the extension.
    pub fn detect(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let kind = FileKind::from_path(&path)?;
        Ok(Self { path, kind })
    }

    /// Path this source reads.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Format this source parses.
    pub fn kind(&self) -> FileKind {
        self.kind
    }

    /// Read and parse the file as it is on disk right now.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or its content does not parse.
    pub fn load(&self) -> Result<config::Config> {
        if !self.path.exists() {
            return Err(WatchError::LoadError(format!(
                "File not found: {}",
                self.path.display()
            )));
        }

        let parsed = config::Config::builder()
            .add_source(
                File::from(self.path.clone())
                    .format(self.kind.format())
                    .required(true),
            )
            .build()?;

        Ok(parsed)
    }
}
