//! In-memory configuration source.

use super::{ChangeFeed, ConfigSource, SourceEvent, SourceKind};
use crate::error::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// A configuration source backed by a string held in memory.
///
/// Every [`set`](Self::set) notifies subscribers with [`SourceEvent::Modified`],
/// which makes it handy for embedding configuration that the application itself
/// updates, and for tests.
///
/// # Examples
///
/// ```rust
/// use service_config::sources::MemorySource;
///
/// let source = MemorySource::new(r#"{"port": 8080}"#);
/// source.set(r#"{"port": 9090}"#);
/// ```
pub struct MemorySource {
    name: String,
    content: Mutex<String>,
    feeds: Mutex<Vec<mpsc::Sender<SourceEvent>>>,
    fetches: AtomicUsize,
}

impl MemorySource {
    /// Create a source holding `content`.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            name: "memory".to_string(),
            content: Mutex::new(content.into()),
            feeds: Mutex::new(Vec::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Set the name reported in logs.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replace the content and notify subscribers.
    pub fn set(&self, content: impl Into<String>) {
        *self.content.lock() = content.into();

        // A full channel already has a pending notification.
        self.feeds.lock().retain(|tx| match tx.try_send(SourceEvent::Modified) {
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Closed(_)) => false,
        });
    }

    /// Number of times the content has been fetched.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigSource for MemorySource {
    async fn fetch(&self) -> Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.content.lock().clone())
    }

    async fn subscribe(&self) -> Result<ChangeFeed> {
        let (tx, rx) = mpsc::channel(1);
        self.feeds.lock().push(tx);
        Ok(ChangeFeed::new(rx))
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Custom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_counts() {
        let source = MemorySource::new("a");
        assert_eq!(source.fetch().await.unwrap(), "a");
        source.set("b");
        assert_eq!(source.fetch().await.unwrap(), "b");
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_set_notifies_and_coalesces() {
        let source = MemorySource::new("a");
        let mut feed = source.subscribe().await.unwrap();

        source.set("b");
        source.set("c");

        assert_eq!(feed.recv().await, Some(SourceEvent::Modified));
        let pending = tokio::time::timeout(std::time::Duration::from_millis(20), feed.recv()).await;
        assert!(pending.is_err());
    }

    #[tokio::test]
    async fn test_closed_feeds_are_dropped() {
        let source = MemorySource::new("a");
        let feed = source.subscribe().await.unwrap();
        drop(feed);

        source.set("b");
        assert!(source.feeds.lock().is_empty());
    }

    #[test]
    fn test_name() {
        let source = MemorySource::new("").with_name("inline");
        assert_eq!(source.name(), "inline");
        assert_eq!(source.kind(), SourceKind::Custom);
    }
}
