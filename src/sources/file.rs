//! File-based configuration source.

use super::{ChangeFeed, ConfigSource, SourceKind};
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[cfg(feature = "file-watch")]
use crate::notify::ConfigWatcher;

/// File-based configuration source.
///
/// Reads the whole file on every fetch. The format is decided by the provider,
/// not by the file extension.
///
/// # Examples
///
/// ```rust,no_run
/// use service_config::sources::FileSource;
/// use std::time::Duration;
///
/// let source = FileSource::new("/etc/app/config.json")
///     .with_debounce(Duration::from_millis(250));
/// ```
pub struct FileSource {
    path: PathBuf,
    debounce: Duration,
}

impl FileSource {
    /// Create a new file source.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            debounce: Duration::from_millis(100),
        }
    }

    /// Set how long bursts of file events are coalesced before a reload.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Path of the configuration file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Window over which bursts of file events are coalesced.
    pub fn debounce(&self) -> Duration {
        self.debounce
    }
}

#[async_trait]
impl ConfigSource for FileSource {
    async fn fetch(&self) -> Result<String> {
        tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            ConfigError::SourceUnreachable(format!(
                "Failed to read configuration file {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    #[cfg(feature = "file-watch")]
    async fn subscribe(&self) -> Result<ChangeFeed> {
        let (watcher, rx) = ConfigWatcher::new(self.debounce())?;
        watcher.watch(&self.path).await?;
        Ok(ChangeFeed::new(rx).with_guard(watcher))
    }

    #[cfg(not(feature = "file-watch"))]
    async fn subscribe(&self) -> Result<ChangeFeed> {
        Err(ConfigError::FeatureNotEnabled("file-watch"))
    }

    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn kind(&self) -> SourceKind {
        SourceKind::File
    }
}
