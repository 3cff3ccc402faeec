//! The internal event bus between sessions, the HTTP API and the reactor.
//!
//! Every lifecycle change and every decoded intent travels through one
//! bounded FIFO channel to the reactor, which applies them one at a time.
//! Frames from a single connection therefore take effect in the order they
//! arrived.

use std::sync::Arc;

use async_trait::async_trait;
use canteen_core::{ConnectionId, Intent};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::connection::ClientConnection;
use super::dispatcher::{DispatchReport, Dispatcher};

/// A message for the reactor.
#[derive(Debug)]
pub enum BusMessage {
    /// A session finished its upgrade.
    Connected {
        /// The new connection.
        connection: Arc<ClientConnection>,
    },
    /// A session ended.
    Disconnected {
        /// Connection that went away.
        connection_id: ConnectionId,
        /// Why it ended (metrics label).
        reason: &'static str,
    },
    /// A decoded frame from a live connection.
    Inbound {
        /// Sending connection.
        connection_id: ConnectionId,
        /// What the client asked for.
        intent: Intent,
        /// Echoed in the `ack` frame when present.
        ack_id: Option<String>,
    },
    /// An intent raised outside the socket layer (HTTP API).
    Publish {
        /// What to dispatch.
        intent: Intent,
        /// Receives the dispatch report, if the caller wants it.
        reply: Option<oneshot::Sender<DispatchReport>>,
    },
}

/// The reactor is gone (server shutting down).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("event bus closed")]
pub struct BusClosed;

/// Publishes onto the bus.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Enqueue a message, waiting for room on the bus.
    async fn publish(&self, message: BusMessage) -> Result<(), BusClosed>;

    /// Dispatch an intent and wait for its report.
    async fn dispatch(&self, intent: Intent) -> Result<DispatchReport, BusClosed> {
        let (tx, rx) = oneshot::channel();
        self.publish(BusMessage::Publish {
            intent,
            reply: Some(tx),
        })
        .await?;
        rx.await.map_err(|_| BusClosed)
    }
}

/// [`EventPublisher`] backed by the reactor's channel.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: mpsc::Sender<BusMessage>,
}

impl EventBus {
    /// Create a bus and the receiver the reactor consumes.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<BusMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventPublisher for EventBus {
    async fn publish(&self, message: BusMessage) -> Result<(), BusClosed> {
        self.tx.send(message).await.map_err(|_| BusClosed)
    }
}

/// Spawn the reactor: the only task that touches the dispatcher.
pub fn spawn_reactor(
    mut dispatcher: Dispatcher,
    mut rx: mpsc::Receiver<BusMessage>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("reactor started");
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                message = rx.recv() => match message {
                    Some(message) => dispatcher.apply(message),
                    None => break,
                },
            }
        }

        rx.close();
        let mut drained = 0usize;
        while let Ok(message) = rx.try_recv() {
            // Replies still get an answer; nothing new is delivered.
            if let BusMessage::Publish { reply: Some(reply), .. } = message {
                let _ = reply.send(DispatchReport::default());
            }
            drained += 1;
        }
        let closed = dispatcher.close_all();
        debug!(drained, "discarded bus messages after shutdown");
        info!(closed, "reactor stopped");
    })
}
