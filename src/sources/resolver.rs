//! Decides at startup whether configuration comes from a file or from Nacos.

use super::{ConfigSource, FileSource, SourceKind};
use crate::core::ProviderOptions;
use crate::error::{ConfigError, Result};
use std::path::PathBuf;
use std::sync::Arc;

#[cfg(feature = "remote")]
use super::RemoteSource;

/// Default Nacos port.
pub const DEFAULT_PORT: u16 = 8848;
/// Default Nacos context path.
pub const DEFAULT_CONTEXT_PATH: &str = "/nacos";
/// Default Nacos group.
pub const DEFAULT_GROUP: &str = "DEFAULT_GROUP";

/// Names of the environment variables the resolver reads.
///
/// The defaults are `CONFIG_FILE` and `NACOS_*`; override individual fields
/// when an application uses different names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvKeys {
    /// Path to a local configuration file. When set, Nacos is not used.
    pub config_file: String,
    /// Nacos server host.
    pub host: String,
    /// Nacos server port.
    pub port: String,
    /// `http` or `https`.
    pub scheme: String,
    /// Context path the Nacos server is mounted under.
    pub context_path: String,
    /// Nacos username.
    pub username: String,
    /// Nacos password.
    pub password: String,
    /// Namespace identifier.
    pub namespace: String,
    /// Data identifier of the configuration document.
    pub data_id: String,
    /// Group identifier of the configuration document.
    pub group: String,
}

impl Default for EnvKeys {
    fn default() -> Self {
        Self {
            config_file: "CONFIG_FILE".to_string(),
            host: "NACOS_HOST".to_string(),
            port: "NACOS_PORT".to_string(),
            scheme: "NACOS_SCHEME".to_string(),
            context_path: "NACOS_CONTEXT_PATH".to_string(),
            username: "NACOS_USERNAME".to_string(),
            password: "NACOS_PASSWORD".to_string(),
            namespace: "NACOS_NAMESPACE_ID".to_string(),
            data_id: "NACOS_DATA_ID".to_string(),
            group: "NACOS_GROUP".to_string(),
        }
    }
}

impl EnvKeys {
    /// Use a different variable for the configuration file path.
    pub fn with_config_file(mut self, key: impl Into<String>) -> Self {
        self.config_file = key.into();
        self
    }
}

/// Connection parameters for a Nacos server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteParams {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// `http` or `https`.
    pub scheme: String,
    /// Normalized context path: empty, or starting with `/` without a trailing `/`.
    pub context_path: String,
    /// Optional username; enables token authentication.
    pub username: Option<String>,
    /// Optional password.
    pub password: Option<String>,
    /// Namespace identifier (empty for the public namespace).
    pub namespace: String,
    /// Data identifier.
    pub data_id: String,
    /// Group identifier.
    pub group: String,
}

impl RemoteParams {
    /// Parameters for `data_id` on `host`, with every other field at its default.
    pub fn new(host: impl Into<String>, data_id: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            scheme: "http".to_string(),
            context_path: DEFAULT_CONTEXT_PATH.to_string(),
            username: None,
            password: None,
            namespace: String::new(),
            data_id: data_id.into(),
            group: DEFAULT_GROUP.to_string(),
        }
    }

    /// Base URL of the Nacos API, e.g. `http://127.0.0.1:8848/nacos`.
    pub fn base_url(&self) -> String {
        format!(
            "{}://{}:{}{}",
            self.scheme, self.host, self.port, self.context_path
        )
    }
}

/// The outcome of source resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedSource {
    /// Read configuration from this file.
    File(PathBuf),
    /// Read configuration from this Nacos server.
    Remote(RemoteParams),
}

impl ResolvedSource {
    /// The kind of the resolved source.
    pub fn kind(&self) -> SourceKind {
        match self {
            ResolvedSource::File(_) => SourceKind::File,
            ResolvedSource::Remote(_) => SourceKind::Remote,
        }
    }

    /// Construct the source handle.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SourceUnreachable`] if the remote client cannot be
    /// built, or [`ConfigError::FeatureNotEnabled`] if the crate was built
    /// without the `remote` feature.
    pub fn into_source(self, options: &ProviderOptions) -> Result<Arc<dyn ConfigSource>> {
        match self {
            ResolvedSource::File(path) => Ok(Arc::new(
                FileSource::new(path).with_debounce(options.watch_debounce),
            )),
            #[cfg(feature = "remote")]
            ResolvedSource::Remote(params) => {
                let source = RemoteSource::builder(params)
                    .with_timeout(options.reload_timeout)
                    .with_long_poll_timeout(options.long_poll_timeout)
                    .with_poll_interval(options.poll_interval)
                    .build()?;
                Ok(Arc::new(source))
            }
            #[cfg(not(feature = "remote"))]
            ResolvedSource::Remote(_) => Err(ConfigError::FeatureNotEnabled("remote")),
        }
    }
}

/// Resolve the configuration source from the process environment.
///
/// # Errors
///
/// See [`resolve_source_with`].
pub fn resolve_source(keys: &EnvKeys) -> Result<ResolvedSource> {
    resolve_source_with(keys, |key| std::env::var(key).ok())
}

/// Resolve the configuration source using `lookup` to read variables.
///
/// A non-empty file path selects [`ResolvedSource::File`] without looking at
/// any remote parameter. Otherwise the Nacos parameters are read; host and data
/// id are required.
///
/// # Errors
///
/// Returns [`ConfigError::EnvironmentError`] if a required remote parameter is
/// missing or a parameter is malformed.
///
/// # Examples
///
/// ```rust
/// use service_config::sources::{EnvKeys, ResolvedSource, resolve_source_with};
///
/// let resolved = resolve_source_with(&EnvKeys::default(), |key| {
///     (key == "CONFIG_FILE").then(|| "/etc/app.json".to_string())
/// })
/// .unwrap();
/// assert_eq!(resolved, ResolvedSource::File("/etc/app.json".into()));
/// ```
pub fn resolve_source_with<F>(keys: &EnvKeys, lookup: F) -> Result<ResolvedSource>
where
    F: Fn(&str) -> Option<String>,
{
    // Blank values count as unset. Only connection parameters are trimmed;
    // paths, credentials and identifiers are used exactly as given.
    let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
    let read_trimmed = |key: &str| read(key).map(|value| value.trim().to_string());

    if let Some(path) = read(&keys.config_file) {
        return Ok(ResolvedSource::File(PathBuf::from(path)));
    }

    let required = |key: &str, value: Option<String>| {
        value.ok_or_else(|| {
            ConfigError::EnvironmentError(format!(
                "{} is not set and {} is required for the Nacos source",
                keys.config_file, key
            ))
        })
    };

    let mut params = RemoteParams::new(
        required(&keys.host, read_trimmed(&keys.host))?,
        required(&keys.data_id, read(&keys.data_id))?,
    );

    if let Some(port) = read_trimmed(&keys.port) {
        params.port = parse_port(&keys.port, &port)?;
    }
    if let Some(scheme) = read_trimmed(&keys.scheme) {
        params.scheme = match scheme.to_ascii_lowercase().as_str() {
            "http" => "http".to_string(),
            "https" => "https".to_string(),
            _ => {
                return Err(ConfigError::EnvironmentError(format!(
                    "{} must be http or https, got '{}'",
                    keys.scheme, scheme
                )));
            }
        };
    }
    if let Some(context_path) = read_trimmed(&keys.context_path) {
        params.context_path = normalize_context_path(&context_path);
    }
    params.username = read(&keys.username);
    params.password = read(&keys.password);
    if let Some(namespace) = read(&keys.namespace) {
        params.namespace = namespace;
    }
    if let Some(group) = read(&keys.group) {
        params.group = group;
    }

    Ok(ResolvedSource::Remote(params))
}

fn parse_port(key: &str, value: &str) -> Result<u16> {
    match value.parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ConfigError::EnvironmentError(format!(
            "{} must be a port number between 1 and 65535, got '{}'",
            key, value
        ))),
    }
}

fn normalize_context_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}
