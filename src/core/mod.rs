//! Core configuration provider types.

mod builder;
mod options;
mod provider;
mod registry;

pub use builder::ConfigProviderBuilder;
pub use options::ProviderOptions;
pub use provider::ConfigProvider;
pub use registry::{ProviderCell, get_provider};
