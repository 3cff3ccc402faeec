//! Push worker: runs push fallback work off the reactor.
//!
//! The reactor never awaits an external call. It enqueues a [`PushRequest`]
//! and moves on; this worker stores subscriptions in arrival order and runs
//! each delivery on its own task. A delivery finishing after its target
//! reconnected or left is harmless.

use std::sync::Arc;

use canteen_core::Identity;
use canteen_core::protocol::PushSubscription;
use canteen_platform::push::{PushFallbackNotifier, PushNotification};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::metrics::PUSH_OUTCOMES_TOTAL;

/// Work handed to the push worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushRequest {
    /// Deliver a notification to an identity with no live connection.
    Notify {
        /// Customer or kitchen to reach.
        identity: Identity,
        /// What to show.
        notification: PushNotification,
    },
    /// Remember a browser subscription for an identity.
    Subscribe {
        /// Owner of the subscription.
        identity: Identity,
        /// Subscription as sent by the browser.
        subscription: PushSubscription,
    },
}

/// Spawn the push worker.
///
/// Runs until `cancel` fires or every sender is dropped, then drains what is
/// already queued and waits for in-flight deliveries.
pub fn spawn_push_worker(
    notifier: Arc<PushFallbackNotifier>,
    mut rx: mpsc::Receiver<PushRequest>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                request = rx.recv() => match request {
                    Some(request) => handle(&notifier, request, &mut in_flight).await,
                    None => break,
                },
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
            }
        }

        rx.close();
        while let Ok(request) = rx.try_recv() {
            handle(&notifier, request, &mut in_flight).await;
        }
        let pending = in_flight.len();
        while in_flight.join_next().await.is_some() {}
        info!(pending, "push worker stopped");
    })
}

async fn handle(
    notifier: &Arc<PushFallbackNotifier>,
    request: PushRequest,
    in_flight: &mut JoinSet<()>,
) {
    match request {
        PushRequest::Subscribe {
            identity,
            subscription,
        } => notifier.subscribe(identity, subscription).await,
        PushRequest::Notify {
            identity,
            notification,
        } => {
            let notifier = Arc::clone(notifier);
            let _ = in_flight.spawn(async move {
                let outcome = notifier.notify(&identity, &notification).await;
                debug!(identity = %identity, outcome = outcome.as_str(), "push fallback finished");
                metrics::counter!(PUSH_OUTCOMES_TOTAL, "outcome" => outcome.as_str()).increment(1);
            });
        }
    }
}
