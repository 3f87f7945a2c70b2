//! Subscriber-based notifications for configuration changes.

use parking_lot::RwLock;
use std::sync::{Arc, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Handle for a subscription that can be dropped to unsubscribe.
///
/// When the handle is dropped, the subscription is removed immediately.
pub struct SubscriptionHandle {
    id: usize,
    registry: Weak<dyn Unsubscribe>,
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

trait Unsubscribe: Send + Sync {
    fn remove(&self, id: usize);
}

/// Internal subscriber registry state.
struct SubscriberRegistryInner<T> {
    subscribers: Vec<(usize, Callback<T>)>,
    next_id: usize,
}

impl<T: 'static> Unsubscribe for RwLock<SubscriberRegistryInner<T>> {
    fn remove(&self, id: usize) {
        self.write().subscribers.retain(|(sub_id, _)| *sub_id != id);
    }
}

/// Registry of callbacks invoked with each newly installed configuration.
///
/// # Examples
///
/// ```rust
/// use service_config::notify::SubscriberRegistry;
///
/// let registry = SubscriberRegistry::<u16>::new();
///
/// let handle = registry.subscribe(|port: &u16| {
///     println!("Now listening on {}", port);
/// });
///
/// registry.notify_all(&8080);
///
/// // Unsubscribe by dropping the handle
/// drop(handle);
/// assert_eq!(registry.subscriber_count(), 0);
/// ```
pub struct SubscriberRegistry<T> {
    inner: Arc<RwLock<SubscriberRegistryInner<T>>>,
}

impl<T: 'static> SubscriberRegistry<T> {
    /// Create a new subscriber registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(SubscriberRegistryInner {
                subscribers: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Register `callback`; it runs after every configuration swap.
    ///
    /// Returns a handle that can be dropped to unsubscribe.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let mut inner = self.inner.write();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.push((id, Arc::new(callback)));

        let registry: Weak<dyn Unsubscribe> = Arc::downgrade(&self.inner) as Weak<dyn Unsubscribe>;
        SubscriptionHandle { id, registry }
    }

    /// Call every subscriber with `config`, in subscription order.
    ///
    /// Callbacks run without the registry lock held, so they may subscribe or
    /// unsubscribe.
    pub fn notify_all(&self, config: &T) {
        let callbacks: Vec<Callback<T>> = self
            .inner
            .read()
            .subscribers
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in callbacks {
            callback(config);
        }
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.read().subscribers.len()
    }
}

impl<T: 'static> Default for SubscriberRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for SubscriberRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
