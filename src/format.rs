//! Configuration formats and deserialization.

use crate::error::{ConfigError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Format of the raw configuration document.
///
/// The format is always chosen by the caller; it is never sniffed from the
/// content or the file extension.
///
/// # Examples
///
/// ```rust
/// use service_config::format::ConfigFormat;
///
/// let format: ConfigFormat = "yml".parse().unwrap();
/// assert_eq!(format, ConfigFormat::Yaml);
/// assert!("toml".parse::<ConfigFormat>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigFormat {
    /// JSON documents.
    Json,
    /// YAML documents.
    Yaml,
}

impl ConfigFormat {
    /// Deserialize `data` into a freshly constructed `T`.
    ///
    /// Every call produces a new value; nothing is ever decoded into a
    /// previously cached instance.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseError`] if `data` is not valid for this format
    /// or does not match the shape of `T`, and [`ConfigError::FeatureNotEnabled`]
    /// if the crate was built without support for this format.
    pub fn parse<T>(self, data: &[u8]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        match self {
            ConfigFormat::Json => parse_json(data),
            ConfigFormat::Yaml => parse_yaml(data),
        }
    }

    /// Lowercase name of the format.
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            ConfigFormat::Yaml => "yaml",
        }
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ConfigFormat::Json),
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            _ => Err(ConfigError::InvalidFormat(s.to_string())),
        }
    }
}

/// Deserialize raw configuration text with the given format.
///
/// Shorthand for [`ConfigFormat::parse`].
pub fn marshal_config<T>(format: ConfigFormat, data: &[u8]) -> Result<T>
where
    T: DeserializeOwned,
{
    format.parse(data)
}

#[cfg(feature = "json")]
fn parse_json<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    serde_json::from_slice(data)
        .map_err(|e| ConfigError::ParseError(format!("invalid JSON configuration: {}", e)))
}

#[cfg(not(feature = "json"))]
fn parse_json<T: DeserializeOwned>(_data: &[u8]) -> Result<T> {
    Err(ConfigError::FeatureNotEnabled("json"))
}

#[cfg(feature = "yaml")]
fn parse_yaml<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    serde_yaml::from_slice(data)
        .map_err(|e| ConfigError::ParseError(format!("invalid YAML configuration: {}", e)))
}

#[cfg(not(feature = "yaml"))]
fn parse_yaml<T: DeserializeOwned>(_data: &[u8]) -> Result<T> {
    Err(ConfigError::FeatureNotEnabled("yaml"))
}

#[cfg(all(test, feature = "json", feature = "yaml"))]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
    struct ServerConfig {
        port: u16,
        host: String,
        tags: Vec<String>,
    }

    #[test]
    fn test_parse_json() {
        let cfg: ServerConfig = ConfigFormat::Json
            .parse(br#"{"port": 8080, "host": "localhost", "tags": ["a"]}"#)
            .unwrap();
        assert_eq!(
            cfg,
            ServerConfig {
                port: 8080,
                host: "localhost".to_string(),
                tags: vec!["a".to_string()],
            }
        );
    }

    #[test]
    fn test_parse_yaml() {
        let cfg: ServerConfig = marshal_config(
            ConfigFormat::Yaml,
            b"port: 9090\nhost: 0.0.0.0\ntags:\n  - x\n  - y\n",
        )
        .unwrap();
        assert_eq!(cfg.port, 9090);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.tags, vec!["x", "y"]);
    }

    #[test]
    fn test_parse_wrong_shape() {
        let result: Result<ServerConfig> = ConfigFormat::Json.parse(br#"{"port": "eighty"}"#);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_parse_malformed_yaml() {
        let result: Result<ServerConfig> = ConfigFormat::Yaml.parse(b"port: [unclosed");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_from_str() {
        assert_eq!("JSON".parse::<ConfigFormat>().unwrap(), ConfigFormat::Json);
        assert_eq!("yaml".parse::<ConfigFormat>().unwrap(), ConfigFormat::Yaml);
        assert_eq!(" yml ".parse::<ConfigFormat>().unwrap(), ConfigFormat::Yaml);

        match "ini".parse::<ConfigFormat>() {
            Err(ConfigError::InvalidFormat(value)) => assert_eq!(value, "ini"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(ConfigFormat::Json.to_string(), "json");
        assert_eq!(ConfigFormat::Yaml.to_string(), "yaml");
    }

    proptest! {
        #[test]
        fn prop_documents_matching_shape_parse(
            port in any::<u16>(),
            host in "host-[a-z0-9]{0,12}",
            tags in proptest::collection::vec("tag[a-z]{0,6}", 0..4),
        ) {
            let expected = ServerConfig { port, host, tags };

            let json = serde_json::to_vec(&expected).unwrap();
            let from_json: ServerConfig = ConfigFormat::Json.parse(&json).unwrap();
            prop_assert_eq!(&from_json, &expected);

            let yaml = serde_yaml::to_string(&expected).unwrap();
            let from_yaml: ServerConfig = ConfigFormat::Yaml.parse(yaml.as_bytes()).unwrap();
            prop_assert_eq!(&from_yaml, &expected);
        }
    }
}
