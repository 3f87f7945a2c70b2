//! Configuration source implementations and source resolution.

mod config_source;
mod file;
mod memory;
mod resolver;

#[cfg(feature = "remote")]
mod remote;

pub use config_source::{ChangeFeed, ConfigSource, RemoteChange, SourceEvent, SourceKind};
pub use file::FileSource;
pub use memory::MemorySource;
pub use resolver::{
    DEFAULT_CONTEXT_PATH, DEFAULT_GROUP, DEFAULT_PORT, EnvKeys, RemoteParams, ResolvedSource,
    resolve_source, resolve_source_with,
};

#[cfg(feature = "remote")]
pub use remote::{RemoteSource, RemoteSourceBuilder};
