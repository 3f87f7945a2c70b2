//! Builder for constructing ConfigProvider instances.

use crate::core::{ConfigProvider, ProviderOptions};
use crate::error::Result;
use crate::format::ConfigFormat;
use crate::sources::{ConfigSource, EnvKeys, ResolvedSource, resolve_source, resolve_source_with};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// Type alias for environment lookup functions.
type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Builder for constructing a [`ConfigProvider`].
///
/// By default the source is resolved from the process environment: a non-empty
/// `CONFIG_FILE` selects a local file, otherwise the `NACOS_*` variables
/// describe a Nacos server.
///
/// # Examples
///
/// ```rust,no_run
/// use service_config::prelude::*;
/// use serde::Deserialize;
/// use std::time::Duration;
///
/// #[derive(Debug, Deserialize)]
/// struct AppConfig {
///     port: u16,
/// }
///
/// # async fn example() -> Result<()> {
/// let provider = ConfigProvider::builder(ConfigFormat::Yaml)
///     .with_watch(true)
///     .with_reload_timeout(Duration::from_secs(5))
///     .build::<AppConfig>()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct ConfigProviderBuilder {
    options: ProviderOptions,
    source: Option<Arc<dyn ConfigSource>>,
    env_lookup: Option<EnvLookup>,
}

impl ConfigProviderBuilder {
    /// Create a new builder for documents in `format`.
    pub fn new(format: ConfigFormat) -> Self {
        Self::from_options(ProviderOptions::new(format))
    }

    /// Create a builder starting from existing options.
    pub fn from_options(options: ProviderOptions) -> Self {
        Self {
            options,
            source: None,
            env_lookup: None,
        }
    }

    /// Enable or disable automatic reload when the source changes.
    pub fn with_watch(mut self, watch: bool) -> Self {
        self.options.watch = watch;
        self
    }

    /// Use different environment variable names.
    pub fn with_env_keys(mut self, env_keys: EnvKeys) -> Self {
        self.options.env_keys = env_keys;
        self
    }

    /// Bound each fetch from the source.
    pub fn with_reload_timeout(mut self, timeout: Duration) -> Self {
        self.options.reload_timeout = timeout;
        self
    }

    /// Set the file event debounce window.
    pub fn with_watch_debounce(mut self, debounce: Duration) -> Self {
        self.options.watch_debounce = debounce;
        self
    }

    /// Set how long a Nacos change listener request may be held by the server.
    pub fn with_long_poll_timeout(mut self, timeout: Duration) -> Self {
        self.options.long_poll_timeout = timeout;
        self
    }

    /// Set how often a Nacos source is re-read when the server offers no
    /// change listener.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.options.poll_interval = interval;
        self
    }

    /// Read environment variables through `lookup` instead of the process
    /// environment.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use service_config::prelude::*;
    ///
    /// let builder = ConfigProvider::builder(ConfigFormat::Json)
    ///     .with_env_lookup(|key| (key == "CONFIG_FILE").then(|| "app.json".to_string()));
    /// assert_eq!(builder.resolve().unwrap().kind(), SourceKind::File);
    /// ```
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env_lookup = Some(Arc::new(lookup));
        self
    }

    /// Use `source` instead of resolving one from the environment.
    pub fn with_source<S: ConfigSource + 'static>(self, source: S) -> Self {
        self.with_shared_source(Arc::new(source))
    }

    /// Use a shared `source` instead of resolving one from the environment.
    pub fn with_shared_source(mut self, source: Arc<dyn ConfigSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// The options accumulated so far.
    pub fn options(&self) -> &ProviderOptions {
        &self.options
    }

    /// Decide which source the environment selects, without connecting to it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EnvironmentError`](crate::error::ConfigError::EnvironmentError)
    /// if remote parameters are missing or malformed.
    pub fn resolve(&self) -> Result<ResolvedSource> {
        match &self.env_lookup {
            Some(lookup) => resolve_source_with(&self.options.env_keys, |key| lookup(key)),
            None => resolve_source(&self.options.env_keys),
        }
    }

    /// Build the provider.
    ///
    /// Resolves the source (unless one was supplied), performs the initial
    /// fetch and parse, and starts the listener when watching is enabled.
    /// Nothing is kept on failure, so the call can simply be retried.
    ///
    /// # Type Parameters
    ///
    /// * `T` - The configuration type (must implement `DeserializeOwned`)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Environment variables are missing or malformed
    /// - The source cannot be reached or does not answer in time
    /// - The content does not parse into `T`
    /// - Watching was requested but cannot be set up
    pub async fn build<T>(self) -> Result<ConfigProvider<T>>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let source = match &self.source {
            Some(source) => Arc::clone(source),
            None => {
                let resolved = self.resolve()?;
                tracing::info!(kind = %resolved.kind(), "Resolved configuration source");
                resolved.into_source(&self.options)?
            }
        };

        ConfigProvider::start(source, &self.options).await
    }
}

impl ConfigProvider<()> {
    /// Create a new builder for documents in `format`.
    pub fn builder(format: ConfigFormat) -> ConfigProviderBuilder {
        ConfigProviderBuilder::new(format)
    }
}
