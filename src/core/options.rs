//! Options controlling how a provider locates, loads and reloads configuration.

use crate::format::ConfigFormat;
use crate::sources::EnvKeys;
use std::time::Duration;

/// Options for building a [`ConfigProvider`](crate::core::ConfigProvider).
///
/// # Examples
///
/// ```rust
/// use service_config::prelude::*;
/// use std::time::Duration;
///
/// let options = ProviderOptions::new(ConfigFormat::Yaml)
///     .with_watch(true)
///     .with_reload_timeout(Duration::from_secs(3));
/// assert!(options.watch);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderOptions {
    /// Format of the configuration document.
    pub format: ConfigFormat,
    /// Names of the environment variables used to locate the source.
    pub env_keys: EnvKeys,
    /// Reload automatically when the source changes.
    pub watch: bool,
    /// Upper bound on a single fetch from the source.
    pub reload_timeout: Duration,
    /// Window over which bursts of file events are coalesced.
    pub watch_debounce: Duration,
    /// How long a Nacos listener request is held open waiting for a change.
    pub long_poll_timeout: Duration,
    /// How often a remote source is re-read when the server has no listener endpoint.
    pub poll_interval: Duration,
}

impl ProviderOptions {
    /// Options for `format` with the default environment keys and watching disabled.
    pub fn new(format: ConfigFormat) -> Self {
        Self {
            format,
            env_keys: EnvKeys::default(),
            watch: false,
            reload_timeout: Duration::from_secs(10),
            watch_debounce: Duration::from_millis(100),
            long_poll_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(5),
        }
    }

    /// Enable or disable automatic reload.
    pub fn with_watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    /// Use different environment variable names.
    pub fn with_env_keys(mut self, env_keys: EnvKeys) -> Self {
        self.env_keys = env_keys;
        self
    }

    /// Bound each fetch from the source. Default is 10 seconds.
    pub fn with_reload_timeout(mut self, timeout: Duration) -> Self {
        self.reload_timeout = timeout;
        self
    }

    /// Set the file event debounce window. Default is 100 milliseconds.
    pub fn with_watch_debounce(mut self, debounce: Duration) -> Self {
        self.watch_debounce = debounce;
        self
    }

    /// Set how long the server may hold a change listener request. Default is 30 seconds.
    pub fn with_long_poll_timeout(mut self, timeout: Duration) -> Self {
        self.long_poll_timeout = timeout;
        self
    }

    /// Set the remote poll interval. Default is 5 seconds.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}
