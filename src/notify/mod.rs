//! Change notification: file watching and subscriber callbacks.

pub mod subscriber;

#[cfg(feature = "file-watch")]
pub mod watcher;

pub use subscriber::{SubscriberRegistry, SubscriptionHandle};

#[cfg(feature = "file-watch")]
pub use watcher::ConfigWatcher;
