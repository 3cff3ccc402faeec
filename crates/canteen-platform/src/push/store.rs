//! Push subscription storage.

use std::collections::HashMap;

use async_trait::async_trait;
use canteen_core::Identity;
use canteen_core::protocol::PushSubscription;
use parking_lot::RwLock;

/// Where push subscriptions live, keyed by identity (customer phone number or
/// kitchen id). One subscription per identity; a newer one replaces the old.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Subscription stored for `identity`.
    async fn get(&self, identity: &Identity) -> Option<PushSubscription>;

    /// Store or replace the subscription; returns whether one already existed.
    async fn put(&self, identity: Identity, subscription: PushSubscription) -> bool;

    /// Delete the subscription; returns whether one existed.
    async fn remove(&self, identity: &Identity) -> bool;

    /// Number of stored subscriptions.
    async fn len(&self) -> usize;
}

/// Process-local store. Subscriptions are lost on restart.
#[derive(Debug, Default)]
pub struct InMemorySubscriptionStore {
    subscriptions: RwLock<HashMap<Identity, PushSubscription>>,
}

impl InMemorySubscriptionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn get(&self, identity: &Identity) -> Option<PushSubscription> {
        self.subscriptions.read().get(identity).cloned()
    }

    async fn put(&self, identity: Identity, subscription: PushSubscription) -> bool {
        self.subscriptions
            .write()
            .insert(identity, subscription)
            .is_some()
    }

    async fn remove(&self, identity: &Identity) -> bool {
        self.subscriptions.write().remove(identity).is_some()
    }

    async fn len(&self) -> usize {
        self.subscriptions.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canteen_core::protocol::PushSubscriptionKeys;

    fn sub(endpoint: &str) -> PushSubscription {
        PushSubscription {
            endpoint: endpoint.into(),
            keys: PushSubscriptionKeys {
                p256dh: "pk".into(),
                auth: "secret".into(),
            },
        }
    }

    #[tokio::test]
    async fn put_get_remove() {
        let store = InMemorySubscriptionStore::new();
        let id = Identity::from("kitchen-1");

        assert!(store.get(&id).await.is_none());
        assert!(!store.put(id.clone(), sub("https://push/a")).await);
        assert_eq!(store.get(&id).await.unwrap().endpoint, "https://push/a");
        assert_eq!(store.len().await, 1);

        assert!(store.remove(&id).await);
        assert!(!store.remove(&id).await);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn put_replaces_existing() {
        let store = InMemorySubscriptionStore::new();
        let id = Identity::from("9990001111");
        let _ = store.put(id.clone(), sub("https://push/old")).await;
        assert!(store.put(id.clone(), sub("https://push/new")).await);
        assert_eq!(store.get(&id).await.unwrap().endpoint, "https://push/new");
        assert_eq!(store.len().await, 1);
    }
}
