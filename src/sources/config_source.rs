//! Configuration source trait.

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use tokio::sync::mpsc;

/// The kind of backing store a [`ConfigSource`] reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// A local file.
    File,
    /// A remote configuration service.
    Remote,
    /// A source supplied directly by the application.
    Custom,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::File => f.write_str("file"),
            SourceKind::Remote => f.write_str("remote"),
            SourceKind::Custom => f.write_str("custom"),
        }
    }
}

/// A change pushed by a remote configuration service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteChange {
    /// Namespace the configuration lives in (empty for the public namespace).
    pub namespace: String,
    /// Group identifier.
    pub group: String,
    /// Data identifier.
    pub data_id: String,
    /// The complete new configuration document.
    pub content: String,
}

/// Notification emitted by a [`ChangeFeed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// The source changed and must be fetched again.
    Modified,
    /// The source delivered its new content directly.
    Published(RemoteChange),
}

/// Stream of change notifications returned by [`ConfigSource::subscribe`].
///
/// The feed owns whatever keeps the notifications flowing (a file watcher, a
/// polling task). Dropping the feed releases it.
pub struct ChangeFeed {
    events: mpsc::Receiver<SourceEvent>,
    _guard: Option<Box<dyn Send>>,
}

impl ChangeFeed {
    /// Create a feed over a channel of events.
    pub fn new(events: mpsc::Receiver<SourceEvent>) -> Self {
        Self {
            events,
            _guard: None,
        }
    }

    /// Attach a value that must stay alive for as long as the feed is in use.
    pub fn with_guard<G: Send + 'static>(mut self, guard: G) -> Self {
        self._guard = Some(Box::new(guard));
        self
    }

    /// Wait for the next change notification.
    ///
    /// Returns `None` once the source stops producing notifications.
    pub async fn recv(&mut self) -> Option<SourceEvent> {
        self.events.recv().await
    }
}

/// Trait for configuration sources.
///
/// A source hands out the raw configuration document and, optionally, a feed of
/// change notifications. Parsing is left to the provider.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Fetch the complete configuration document.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read.
    async fn fetch(&self) -> Result<String>;

    /// Start listening for changes to the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if change notification cannot be set up.
    async fn subscribe(&self) -> Result<ChangeFeed>;

    /// Get a human-readable name for this source (for logging/debugging).
    fn name(&self) -> String;

    /// The kind of backing store.
    fn kind(&self) -> SourceKind;
}
