//! # service-config
//!
//! Hot-reloadable service configuration from a local file or a Nacos server.
//!
//! ## Overview
//!
//! `service-config` loads a typed configuration document once, caches it, and
//! keeps it fresh in the background:
//! - The source is chosen from environment variables: `CONFIG_FILE` selects a
//!   local file, otherwise the `NACOS_*` variables describe a Nacos server
//! - Documents are JSON or YAML and decode into any `serde` type
//! - Reads are lock-free pointer loads using `arc-swap`
//! - With watching enabled, changes are picked up automatically; a change that
//!   fails to load or parse leaves the previous configuration in place
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use service_config::prelude::*;
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct AppConfig {
//!     server: ServerConfig,
//!     database: DatabaseConfig,
//! }
//!
//! #[derive(Debug, Deserialize)]
//! struct ServerConfig {
//!     port: u16,
//! }
//!
//! #[derive(Debug, Deserialize)]
//! struct DatabaseConfig {
//!     url: String,
//! }
//!
//! # async fn example() -> service_config::error::Result<()> {
//! // CONFIG_FILE=/etc/app/config.yaml
//! let config = ConfigProvider::builder(ConfigFormat::Yaml)
//!     .with_watch(true)
//!     .build::<AppConfig>()
//!     .await?;
//!
//! // No locks and no I/O on the read path
//! let cfg = config.get();
//! println!("Server port: {}", cfg.server.port);
//! # Ok(())
//! # }
//! ```
//!
//! ## Environment
//!
//! | Variable             | Meaning                                  |
//! |----------------------|------------------------------------------|
//! | `CONFIG_FILE`        | Path of a local file; wins when set      |
//! | `NACOS_HOST`         | Nacos server host (required for remote)  |
//! | `NACOS_PORT`         | Port, default `8848`                     |
//! | `NACOS_SCHEME`       | `http` or `https`, default `http`        |
//! | `NACOS_CONTEXT_PATH` | Context path, default `/nacos`           |
//! | `NACOS_NAMESPACE_ID` | Namespace (tenant), default empty        |
//! | `NACOS_DATA_ID`      | Data id (required for remote)            |
//! | `NACOS_GROUP`        | Group, default `DEFAULT_GROUP`           |
//! | `NACOS_USERNAME`     | Username, enables login when set         |
//! | `NACOS_PASSWORD`     | Password                                 |
//!
//! The names can be changed through [`EnvKeys`](sources::EnvKeys).
//!
//! ## Feature Flags
//!
//! All enabled by default:
//!
//! - `json`: JSON documents
//! - `yaml`: YAML documents
//! - `file-watch`: reload on file changes
//! - `remote`: Nacos source
//!
//! ```toml
//! [dependencies]
//! service-config = { version = "0.1", default-features = false, features = ["yaml", "file-watch"] }
//! ```

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod format;
pub mod notify;
pub mod sources;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{ConfigProvider, ConfigProviderBuilder, ProviderCell, ProviderOptions, get_provider};
    pub use crate::error::{ConfigError, Result};
    pub use crate::format::ConfigFormat;
    pub use crate::notify::SubscriptionHandle;
    pub use crate::sources::{ConfigSource, EnvKeys, SourceKind};
}
