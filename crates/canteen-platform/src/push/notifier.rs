//! Fallback notifier: subscription lookup plus best-effort delivery.

use std::sync::Arc;

use canteen_core::Identity;
use canteen_core::protocol::PushSubscription;
use tracing::{debug, info, warn};

use super::gateway::PushSender;
use super::store::SubscriptionStore;
use super::types::{PushNotification, PushOutcome};

/// Delivers a notification out-of-band when no live connection exists.
///
/// Never retries: every call produces exactly one [`PushOutcome`], which is
/// logged here and counted by the caller.
#[derive(Clone)]
pub struct PushFallbackNotifier {
    store: Arc<dyn SubscriptionStore>,
    sender: Option<Arc<dyn PushSender>>,
}

impl PushFallbackNotifier {
    /// Notifier that delivers through `sender`.
    pub fn new(store: Arc<dyn SubscriptionStore>, sender: Arc<dyn PushSender>) -> Self {
        Self {
            store,
            sender: Some(sender),
        }
    }

    /// Notifier that still records subscriptions but never sends.
    pub fn disabled(store: Arc<dyn SubscriptionStore>) -> Self {
        Self {
            store,
            sender: None,
        }
    }

    /// Whether a sender is configured.
    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Subscription store shared with the HTTP API.
    pub fn store(&self) -> &Arc<dyn SubscriptionStore> {
        &self.store
    }

    /// Store (or replace) a subscription for `identity`.
    pub async fn subscribe(&self, identity: Identity, subscription: PushSubscription) {
        let replaced = self.store.put(identity.clone(), subscription).await;
        info!(identity = %identity, replaced, "push subscription stored");
    }

    /// Attempt one delivery to `identity`.
    pub async fn notify(&self, identity: &Identity, notification: &PushNotification) -> PushOutcome {
        let Some(ref sender) = self.sender else {
            debug!(identity = %identity, "push fallback disabled, dropping notification");
            return PushOutcome::Disabled;
        };

        let Some(subscription) = self.store.get(identity).await else {
            info!(identity = %identity, "no push subscription, notification dropped");
            return PushOutcome::NoSubscription;
        };

        match sender.send(&subscription, notification).await {
            Ok(()) => {
                info!(identity = %identity, title = %notification.title, "push notification delivered");
                PushOutcome::Delivered
            }
            Err(e) if e.is_expired() => {
                let _ = self.store.remove(identity).await;
                warn!(identity = %identity, error = %e, "push subscription expired, removed");
                PushOutcome::Expired
            }
            Err(e) => {
                warn!(identity = %identity, error = %e, "push notification failed");
                PushOutcome::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::error::PushError;
    use crate::push::store::InMemorySubscriptionStore;
    use async_trait::async_trait;
    use canteen_core::protocol::PushSubscriptionKeys;
    use parking_lot::Mutex;

    /// Records every send and answers with a scripted status.
    struct ScriptedSender {
        sent: Mutex<Vec<(String, PushNotification)>>,
        reply: fn() -> Result<(), PushError>,
    }

    impl ScriptedSender {
        fn new(reply: fn() -> Result<(), PushError>) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                reply,
            })
        }
    }

    #[async_trait]
    impl PushSender for ScriptedSender {
        async fn send(
            &self,
            subscription: &PushSubscription,
            notification: &PushNotification,
        ) -> Result<(), PushError> {
            self.sent
                .lock()
                .push((subscription.endpoint.clone(), notification.clone()));
            (self.reply)()
        }
    }

    fn sub() -> PushSubscription {
        PushSubscription {
            endpoint: "https://push.example/abc".into(),
            keys: PushSubscriptionKeys {
                p256dh: "pk".into(),
                auth: "secret".into(),
            },
        }
    }

    fn notification() -> PushNotification {
        PushNotification::new("Canteen", "Your order #O1 has been ready")
    }

    #[tokio::test]
    async fn delivered_when_subscribed() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let sender = ScriptedSender::new(|| Ok(()));
        let notifier = PushFallbackNotifier::new(store, sender.clone());
        let id = Identity::from("9990001111");
        notifier.subscribe(id.clone(), sub()).await;

        assert_eq!(notifier.notify(&id, &notification()).await, PushOutcome::Delivered);
        let sent = sender.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "https://push.example/abc");
        assert_eq!(sent[0].1.body, "Your order #O1 has been ready");
    }

    #[tokio::test]
    async fn no_subscription_skips_sender() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let sender = ScriptedSender::new(|| Ok(()));
        let notifier = PushFallbackNotifier::new(store, sender.clone());

        let outcome = notifier.notify(&Identity::from("nobody"), &notification()).await;
        assert_eq!(outcome, PushOutcome::NoSubscription);
        assert!(sender.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn expired_subscription_is_removed() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let sender = ScriptedSender::new(|| Err(PushError::Expired { status: 410 }));
        let notifier = PushFallbackNotifier::new(store.clone(), sender);
        let id = Identity::from("kitchen-1");
        notifier.subscribe(id.clone(), sub()).await;

        assert_eq!(notifier.notify(&id, &notification()).await, PushOutcome::Expired);
        assert!(store.get(&id).await.is_none());
    }

    #[tokio::test]
    async fn failure_keeps_subscription() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let sender = ScriptedSender::new(|| {
            Err(PushError::Status {
                status: 500,
                message: "boom".into(),
            })
        });
        let notifier = PushFallbackNotifier::new(store.clone(), sender.clone());
        let id = Identity::from("kitchen-1");
        notifier.subscribe(id.clone(), sub()).await;

        let outcome = notifier.notify(&id, &notification()).await;
        assert!(matches!(outcome, PushOutcome::Failed(ref m) if m.contains("boom")));
        assert!(store.get(&id).await.is_some());
        // at-most-once: exactly one attempt
        assert_eq!(sender.sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn disabled_notifier_still_stores() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let notifier = PushFallbackNotifier::disabled(store.clone());
        let id = Identity::from("9990001111");
        notifier.subscribe(id.clone(), sub()).await;

        assert!(!notifier.is_enabled());
        assert_eq!(store.len().await, 1);
        assert_eq!(notifier.notify(&id, &notification()).await, PushOutcome::Disabled);
    }
}
