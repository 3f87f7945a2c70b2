//! Build-once provider cells and the process-wide provider registry.

use crate::core::{ConfigProvider, ProviderOptions};
use crate::error::{ConfigError, Result};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use tokio::sync::OnceCell;

/// A cell that builds its [`ConfigProvider`] at most once.
///
/// Concurrent first callers are serialized: exactly one of them resolves the
/// source and performs the initial fetch, the others wait and receive the same
/// provider. A failed build leaves the cell empty so a later call can retry.
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
/// let cell = ProviderCell::<AppConfig>::new();
///
/// let provider = cell.get_or_init(ProviderOptions::new(ConfigFormat::Json)).await?;
/// println!("Port: {}", provider.get().port);
/// # Ok(())
/// # }
/// ```
pub struct ProviderCell<T> {
    cell: OnceCell<ConfigProvider<T>>,
}

impl<T> ProviderCell<T> {
    /// Create an empty cell.
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// The provider, if it has been built.
    pub fn get(&self) -> Option<&ConfigProvider<T>> {
        self.cell.get()
    }
}

impl<T> ProviderCell<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    /// Get the provider, building it from `options` on first use.
    ///
    /// Later calls return the existing provider and ignore `options`.
    ///
    /// # Errors
    ///
    /// Returns the construction error if this call had to build the provider
    /// and failed.
    pub async fn get_or_init(&self, options: ProviderOptions) -> Result<&ConfigProvider<T>> {
        self.get_or_init_with(|| ConfigProvider::new(options)).await
    }

    /// Get the provider, building it with `init` on first use.
    pub async fn get_or_init_with<F, Fut>(&self, init: F) -> Result<&ConfigProvider<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ConfigProvider<T>>>,
    {
        self.cell.get_or_try_init(init).await
    }
}

impl<T> Default for ProviderCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

type Registry = Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>;

static PROVIDERS: OnceLock<Registry> = OnceLock::new();

/// Get the process-wide provider for configuration type `T`.
///
/// The first call builds the provider from `options`; every later call, from
/// any task, returns the same instance. If the first build fails nothing is
/// stored and the next call tries again.
///
/// Prefer holding a [`ProviderCell`] or a [`ConfigProvider`] in the
/// application's composition root; this function is for code that has no
/// access to one.
///
/// # Errors
///
/// Returns the construction error if the provider had to be built and failed.
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
/// let options = ProviderOptions::new(ConfigFormat::Json).with_watch(true);
/// let a = get_provider::<AppConfig>(options.clone()).await?;
/// let b = get_provider::<AppConfig>(options).await?;
/// assert!(ConfigProvider::ptr_eq(&a, &b));
/// # Ok(())
/// # }
/// ```
pub async fn get_provider<T>(options: ProviderOptions) -> Result<ConfigProvider<T>>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    let cell = provider_cell::<T>()?;
    cell.get_or_init(options).await.cloned()
}

fn provider_cell<T>() -> Result<Arc<ProviderCell<T>>>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    let mut providers = PROVIDERS.get_or_init(Registry::default).lock();
    let entry = providers
        .entry(TypeId::of::<T>())
        .or_insert_with(|| Arc::new(ProviderCell::<T>::new()) as Arc<dyn Any + Send + Sync>);

    Arc::clone(entry)
        .downcast::<ProviderCell<T>>()
        .map_err(|_| ConfigError::Other("Provider registry holds a mismatched type".to_string()))
}
