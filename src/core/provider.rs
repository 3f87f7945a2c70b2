//! The configuration provider: cached value, accessor and reload loop.

use crate::core::{ConfigProviderBuilder, ProviderOptions};
use crate::error::{ConfigError, Result};
use crate::format::ConfigFormat;
use crate::notify::{SubscriberRegistry, SubscriptionHandle};
use crate::sources::{ChangeFeed, ConfigSource, SourceEvent, SourceKind};
use arc_swap::ArcSwap;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

/// Provides the current configuration from a file or a Nacos server.
///
/// The decoded value is cached in an `ArcSwap`, so [`get`](Self::get) is a
/// lock-free pointer load that never touches the source. When watching is
/// enabled a single background task listens for changes and swaps in each newly
/// parsed value; readers see either the old or the new value, never a mix.
///
/// Clones share the same cache and listener.
///
/// # Examples
///
/// ```rust,no_run
/// use service_config::prelude::*;
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize)]
/// struct AppConfig {
///     port: u16,
/// }
///
/// # async fn example() -> Result<()> {
/// // CONFIG_FILE=/etc/app/config.json, or the NACOS_* variables
/// let provider = ConfigProvider::builder(ConfigFormat::Json)
///     .with_watch(true)
///     .build::<AppConfig>()
///     .await?;
///
/// let cfg = provider.get();
/// println!("Port: {}", cfg.port);
/// # Ok(())
/// # }
/// ```
pub struct ConfigProvider<T> {
    shared: Arc<Shared<T>>,
    listener: Option<Arc<Listener>>,
}

struct Shared<T> {
    current: ArcSwap<T>,
    source: Arc<dyn ConfigSource>,
    format: ConfigFormat,
    reload_timeout: Duration,
    /// Raw text behind `current`. Holding the lock serializes reloads.
    last_raw: Mutex<String>,
    subscribers: SubscriberRegistry<T>,
}

struct Listener {
    shutdown: watch::Sender<bool>,
    task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl<T> ConfigProvider<T> {
    /// Get a reference-counted handle to the current configuration.
    ///
    /// This is a lock-free operation. The returned snapshot stays valid even
    /// if a reload replaces the cached value afterwards.
    pub fn get(&self) -> Arc<T> {
        self.shared.current.load_full()
    }

    /// The kind of source this provider reads from.
    pub fn source_kind(&self) -> SourceKind {
        self.shared.source.kind()
    }

    /// Human-readable name of the source.
    pub fn source_name(&self) -> String {
        self.shared.source.name()
    }

    /// Format the configuration is parsed with.
    pub fn format(&self) -> ConfigFormat {
        self.shared.format
    }

    /// Whether the background listener is running.
    pub fn is_watching(&self) -> bool {
        self.listener.as_ref().is_some_and(|listener| {
            listener
                .task
                .lock()
                .as_ref()
                .is_some_and(|task| !task.is_finished())
        })
    }

    /// Stop the background listener and wait for it to exit.
    ///
    /// The cached configuration stays available through [`get`](Self::get).
    /// Calling this on a provider without a listener, or more than once, does
    /// nothing.
    pub async fn shutdown(&self) {
        let Some(listener) = &self.listener else {
            return;
        };

        let _ = listener.shutdown.send(true);
        let task = listener.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    /// Returns `true` if both handles refer to the same provider.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.shared, &other.shared)
    }
}

impl<T: 'static> ConfigProvider<T> {
    /// Register a callback invoked with each newly installed configuration.
    ///
    /// Returns a handle that can be dropped to unsubscribe.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use service_config::prelude::*;
    /// # #[derive(serde::Deserialize)]
    /// # struct AppConfig { port: u16 }
    /// # fn example(provider: ConfigProvider<AppConfig>) {
    /// let handle = provider.subscribe(|cfg: &AppConfig| {
    ///     println!("Port is now {}", cfg.port);
    /// });
    ///
    /// // Later, unsubscribe
    /// drop(handle);
    /// # }
    /// ```
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.shared.subscribers.subscribe(callback)
    }
}

impl<T> ConfigProvider<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    /// Resolve the source from the environment and load the configuration.
    ///
    /// # Errors
    ///
    /// See [`ConfigProviderBuilder::build`].
    pub async fn new(options: ProviderOptions) -> Result<Self> {
        ConfigProviderBuilder::from_options(options).build().await
    }

    /// Load the initial configuration from `source` and, if requested, start
    /// listening for changes.
    pub(crate) async fn start(source: Arc<dyn ConfigSource>, options: &ProviderOptions) -> Result<Self> {
        // Subscribe before the first fetch so a change in between is not lost.
        let feed = if options.watch {
            match source.subscribe().await {
                Ok(feed) => Some(feed),
                Err(watch_err) => {
                    // An unreadable source is reported as such, not as a watch failure.
                    fetch_bounded(source.as_ref(), options.reload_timeout).await?;
                    return Err(watch_err);
                }
            }
        } else {
            None
        };

        let raw = fetch_bounded(source.as_ref(), options.reload_timeout).await?;
        let initial: T = options.format.parse(raw.as_bytes())?;

        tracing::info!(
            source = %source.name(),
            kind = %source.kind(),
            format = %options.format,
            watch = options.watch,
            "Configuration loaded"
        );

        let shared = Arc::new(Shared {
            current: ArcSwap::from_pointee(initial),
            source,
            format: options.format,
            reload_timeout: options.reload_timeout,
            last_raw: Mutex::new(raw),
            subscribers: SubscriberRegistry::new(),
        });

        let listener = feed.map(|feed| Arc::new(Listener::spawn(Arc::clone(&shared), feed)));

        Ok(Self { shared, listener })
    }

    /// Fetch, parse and install the configuration now.
    ///
    /// Runs one at a time with background reloads. If the content has not
    /// changed nothing is replaced and subscribers are not called.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read in time or the content
    /// does not parse; the cached configuration is left unchanged.
    pub async fn reload(&self) -> Result<()> {
        self.shared.reload().await.map(|_| ())
    }
}

impl<T> Clone for ConfigProvider<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            listener: self.listener.clone(),
        }
    }
}

impl<T> Shared<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    async fn reload(&self) -> Result<bool> {
        let mut last_raw = self.last_raw.lock().await;
        let raw = fetch_bounded(self.source.as_ref(), self.reload_timeout).await?;
        self.install(&mut last_raw, raw)
    }

    async fn apply(&self, raw: String) -> Result<bool> {
        let mut last_raw = self.last_raw.lock().await;
        self.install(&mut last_raw, raw)
    }

    fn install(&self, last_raw: &mut String, raw: String) -> Result<bool> {
        if *last_raw == raw {
            tracing::debug!(source = %self.source.name(), "Configuration unchanged");
            return Ok(false);
        }

        // Parse into a fresh value; the cache is only touched on success.
        let parsed = Arc::new(self.format.parse::<T>(raw.as_bytes())?);
        self.current.store(Arc::clone(&parsed));
        *last_raw = raw;

        tracing::info!(source = %self.source.name(), "Configuration reloaded");
        self.subscribers.notify_all(&parsed);
        Ok(true)
    }
}

impl Listener {
    fn spawn<T>(shared: Arc<Shared<T>>, feed: ChangeFeed) -> Self
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let (shutdown, rx) = watch::channel(false);
        let task = tokio::spawn(listen(shared, feed, rx));
        Self {
            shutdown,
            task: parking_lot::Mutex::new(Some(task)),
        }
    }
}

async fn listen<T>(shared: Arc<Shared<T>>, mut feed: ChangeFeed, mut shutdown: watch::Receiver<bool>)
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    loop {
        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                // An error means every provider handle is gone.
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            event = feed.recv() => {
                let result = match event {
                    Some(SourceEvent::Modified) => shared.reload().await,
                    Some(SourceEvent::Published(change)) => {
                        tracing::debug!(
                            namespace = %change.namespace,
                            group = %change.group,
                            data_id = %change.data_id,
                            "Received configuration change"
                        );
                        shared.apply(change.content).await
                    }
                    None => {
                        tracing::warn!(source = %shared.source.name(), "Change notifications ended");
                        break;
                    }
                };

                if let Err(e) = result {
                    tracing::warn!(
                        source = %shared.source.name(),
                        error = %e,
                        "Configuration reload failed, keeping previous configuration"
                    );
                }
            }
        }
    }

    tracing::debug!(source = %shared.source.name(), "Configuration listener stopped");
}

async fn fetch_bounded(source: &dyn ConfigSource, limit: Duration) -> Result<String> {
    tokio::time::timeout(limit, source.fetch())
        .await
        .map_err(|_| ConfigError::Timeout(limit))?
}
