//! Push fallback delivery.
//!
//! When a targeted event finds no live connection, the server hands it to the
//! [`PushFallbackNotifier`], which looks up the identity's stored browser push
//! subscription and forwards a short notification through a push gateway.
//! Delivery is best-effort and at-most-once.

mod config;
mod error;
mod gateway;
mod notifier;
mod store;
mod types;

pub use config::PushConfig;
pub use error::PushError;
pub use gateway::{HttpPushGateway, PushSender};
pub use notifier::PushFallbackNotifier;
pub use store::{InMemorySubscriptionStore, SubscriptionStore};
pub use types::{PushNotification, PushOutcome};
