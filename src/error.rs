//! Error types for service-config.

use std::time::Duration;

/// Result type alias for service-config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when resolving, loading or reloading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing or malformed.
    #[error("Environment error: {0}")]
    EnvironmentError(String),

    /// The configuration source could not be read (file unreadable, remote
    /// connection or fetch failure).
    #[error("Configuration source unreachable: {0}")]
    SourceUnreachable(String),

    /// The raw configuration does not conform to the declared format or target shape.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// An unrecognized configuration format identifier.
    #[error("Invalid format identifier: {0}")]
    InvalidFormat(String),

    /// File watching or remote subscription failed to initialize.
    #[error("Watch error: {0}")]
    WatchError(String),

    /// Fetching from the source did not complete in time.
    #[error("Configuration source did not respond within {0:?}")]
    Timeout(Duration),

    /// Attempted to use a feature that is not enabled.
    #[error("Feature not enabled: {0}")]
    FeatureNotEnabled(&'static str),

    /// IO error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error for other cases.
    #[error("Configuration error: {0}")]
    Other(String),
}

impl ConfigError {
    /// Returns `true` for errors caused by the source being unavailable rather
    /// than by its content.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            ConfigError::SourceUnreachable(_) | ConfigError::Timeout(_) | ConfigError::IoError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_value() {
        let err = ConfigError::InvalidFormat("toml".to_string());
        assert_eq!(err.to_string(), "Invalid format identifier: toml");
    }

    #[test]
    fn test_is_unreachable() {
        assert!(ConfigError::Timeout(Duration::from_secs(1)).is_unreachable());
        assert!(ConfigError::SourceUnreachable("down".into()).is_unreachable());
        assert!(!ConfigError::ParseError("bad".into()).is_unreachable());
    }
}
