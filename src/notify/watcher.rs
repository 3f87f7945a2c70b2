//! File watching for automatic configuration reloads.

use crate::error::{ConfigError, Result};
use crate::sources::SourceEvent;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::time::sleep;

/// Watches a configuration file and reports when it is created or written.
///
/// The watch is placed on the file's directory, not on the file itself, so a
/// file that is replaced by renaming a new one over it (editors, `mv`,
/// Kubernetes ConfigMaps) keeps being watched. Only events naming the
/// configured file are reported.
///
/// Bursts of events (a single save often produces several) are coalesced:
/// after the first event the watcher waits for the debounce window, then emits
/// one [`SourceEvent::Modified`].
///
/// # Examples
///
/// ```rust,no_run
/// use service_config::notify::ConfigWatcher;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (watcher, mut rx) = ConfigWatcher::new(Duration::from_millis(100))?;
/// watcher.watch("/path/to/config.yaml").await?;
///
/// while let Some(event) = rx.recv().await {
///     println!("Config file changed: {:?}", event);
/// }
/// # Ok(())
/// # }
/// ```
pub struct ConfigWatcher {
    watcher: Mutex<RecommendedWatcher>,
    debounce_duration: Duration,
    target: Arc<RwLock<Option<PathBuf>>>,
}

impl ConfigWatcher {
    /// Create a new configuration watcher.
    ///
    /// Must be called from within a tokio runtime. Returns the watcher and the
    /// receiver that gets one event per debounced burst of file changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying file watcher cannot be created.
    pub fn new(debounce_duration: Duration) -> Result<(Self, mpsc::Receiver<SourceEvent>)> {
        let (tx, rx) = mpsc::channel(16);
        let target: Arc<RwLock<Option<PathBuf>>> = Arc::new(RwLock::new(None));

        // Channel for raw events from notify
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

        let filter_target = Arc::clone(&target);
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let relevant = filter_target
                    .read()
                    .as_deref()
                    .is_some_and(|target| is_reload_trigger(&event, target));
                if relevant {
                    let _ = event_tx.send(event);
                }
            }
            Err(e) => tracing::warn!(error = %e, "File watcher error"),
        })
        .map_err(|e| ConfigError::WatchError(format!("Failed to create file watcher: {}", e)))?;

        tokio::spawn(async move {
            while let Some(first) = event_rx.recv().await {
                tracing::debug!(kind = ?first.kind, paths = ?first.paths, "Configuration file event");

                let window = sleep(debounce_duration);
                tokio::pin!(window);
                loop {
                    tokio::select! {
                        _ = &mut window => break,
                        more = event_rx.recv() => {
                            if more.is_none() {
                                break;
                            }
                        }
                    }
                }

                if tx.send(SourceEvent::Modified).await.is_err() {
                    // Receiver dropped, exit
                    break;
                }
            }
        });

        Ok((
            Self {
                watcher: Mutex::new(watcher),
                debounce_duration,
                target,
            },
            rx,
        ))
    }

    /// Start watching the configuration file at `path`.
    ///
    /// The directory containing `path` must exist; the file itself may appear
    /// later, which is reported as a change.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be resolved or watched.
    pub async fn watch(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let file_name = path.file_name().ok_or_else(|| {
            ConfigError::WatchError(format!("{} does not name a file", path.display()))
        })?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let canonical_dir = dir.canonicalize().map_err(|e| {
            ConfigError::WatchError(format!("Failed to resolve {}: {}", dir.display(), e))
        })?;
        let target = canonical_dir.join(file_name);

        // Set before arming so the first events are not filtered out.
        *self.target.write() = Some(target.clone());

        let mut watcher = self.watcher.lock().await;
        if let Err(e) = watcher.watch(&canonical_dir, RecursiveMode::NonRecursive) {
            *self.target.write() = None;
            return Err(ConfigError::WatchError(format!(
                "Failed to watch {}: {}",
                canonical_dir.display(),
                e
            )));
        }

        tracing::debug!(path = %target.display(), "Watching configuration file");
        Ok(())
    }

    /// Get the debounce duration for this watcher.
    pub fn debounce_duration(&self) -> Duration {
        self.debounce_duration
    }

    /// The resolved path being watched, if any.
    pub fn watched_path(&self) -> Option<PathBuf> {
        self.target.read().clone()
    }
}

/// Creation, writes and renames onto `target` trigger a reload; renames away
/// from it and removals do not.
fn is_reload_trigger(event: &Event, target: &Path) -> bool {
    let kind_matches = match event.kind {
        EventKind::Create(_) => true,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    };
    kind_matches && event.paths.iter().any(|path| path == target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_watcher_creation() {
        let result = ConfigWatcher::new(Duration::from_millis(100));
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_watch_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "port: 8080").unwrap();

        let (watcher, _rx) = ConfigWatcher::new(Duration::from_millis(100)).unwrap();
        watcher.watch(&config_path).await.unwrap();

        let watched = watcher.watched_path().unwrap();
        assert_eq!(watched, config_path.canonicalize().unwrap());
    }

    #[tokio::test]
    async fn test_watch_nonexistent_directory() {
        let (watcher, _rx) = ConfigWatcher::new(Duration::from_millis(100)).unwrap();
        let result = watcher.watch("/nonexistent/config.yaml").await;
        assert!(matches!(result, Err(ConfigError::WatchError(_))));
        assert!(watcher.watched_path().is_none());
    }

    #[tokio::test]
    async fn test_file_change_triggers_event() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "port: 8080").unwrap();

        let (watcher, mut rx) = ConfigWatcher::new(Duration::from_millis(100)).unwrap();
        watcher.watch(&config_path).await.unwrap();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            fs::write(&config_path, "port: 9090").unwrap();
        });

        let result = timeout(Duration::from_secs(2), rx.recv()).await;
        assert_eq!(result.unwrap(), Some(SourceEvent::Modified));
    }

    #[tokio::test]
    async fn test_burst_is_coalesced() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "port: 8080").unwrap();

        let (watcher, mut rx) = ConfigWatcher::new(Duration::from_millis(300)).unwrap();
        watcher.watch(&config_path).await.unwrap();

        for port in [9090, 9091, 9092] {
            fs::write(&config_path, format!("port: {}", port)).unwrap();
        }

        let first = timeout(Duration::from_secs(2), rx.recv()).await;
        assert_eq!(first.unwrap(), Some(SourceEvent::Modified));

        let second = timeout(Duration::from_millis(500), rx.recv()).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_debounce_duration() {
        let duration = Duration::from_millis(500);
        let (watcher, _rx) = ConfigWatcher::new(duration).unwrap();
        assert_eq!(watcher.debounce_duration(), duration);
    }
    #[tokio::test]
    async fn test_rename_replace_then_in_place_write() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("c.json");
        fs::write(&config_path, r#"{"port": 8080}"#).unwrap();

        let (watcher, mut rx) = ConfigWatcher::new(Duration::from_millis(50)).unwrap();
        watcher.watch(&config_path).await.unwrap();

        let staged = temp_dir.path().join("c.json.tmp");
        fs::write(&staged, r#"{"port": 9090}"#).unwrap();
        fs::rename(&staged, &config_path).unwrap();

        let replaced = timeout(Duration::from_secs(2), rx.recv()).await;
        assert_eq!(replaced.unwrap(), Some(SourceEvent::Modified));

        // The replacement is a new inode; it must still be watched.
        fs::write(&config_path, r#"{"port": 7070}"#).unwrap();
        let written = timeout(Duration::from_secs(2), rx.recv()).await;
        assert_eq!(written.unwrap(), Some(SourceEvent::Modified));
    }

    #[tokio::test]
    async fn test_sibling_files_are_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "port: 8080").unwrap();

        let (watcher, mut rx) = ConfigWatcher::new(Duration::from_millis(50)).unwrap();
        watcher.watch(&config_path).await.unwrap();

        fs::write(temp_dir.path().join("other.yaml"), "port: 1").unwrap();
        let result = timeout(Duration::from_millis(400), rx.recv()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_file_created_after_watch() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("late.yaml");

        let (watcher, mut rx) = ConfigWatcher::new(Duration::from_millis(50)).unwrap();
        watcher.watch(&config_path).await.unwrap();

        fs::write(&config_path, "port: 8080").unwrap();
        let result = timeout(Duration::from_secs(2), rx.recv()).await;
        assert_eq!(result.unwrap(), Some(SourceEvent::Modified));
    }
}
