//! Event routing.
//!
//! The dispatcher owns every piece of mutable hub state: the live connection
//! table, identity bindings and room membership. It runs inside the reactor
//! task only, so nothing here locks. Handlers never fail: a missing target is
//! a push fallback, a full client queue is a drop.

use std::collections::HashMap;
use std::sync::Arc;

use canteen_core::intent::order_status_text;
use canteen_core::protocol::{AckReport, OutboundFrame, events};
use canteen_core::{ConnectionId, Identity, Intent, Namespace};
use canteen_platform::push::PushNotification;
use metrics::{counter, gauge, histogram};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::bus::BusMessage;
use super::connection::ClientConnection;
use super::registry::ConnectionRegistry;
use super::rooms::{BroadcastMode, Room, RoomManager};
use super::stats::{HubSnapshot, HubStats};
use crate::metrics::{
    DISPATCH_RECIPIENTS, DISPATCH_TOTAL, PUSH_QUEUE_DROPS_TOTAL, WS_BROADCAST_DROPS_TOTAL,
    WS_CONNECTIONS_ACTIVE, WS_SLOW_CLIENT_EVICTIONS_TOTAL,
};
use crate::push::PushRequest;

/// Outcome of one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Live connections the event was queued for.
    pub recipients: usize,
    /// Whether a push fallback was requested.
    pub push_fallback: bool,
}

/// Routes intents to rooms and identities.
pub struct Dispatcher {
    connections: HashMap<ConnectionId, Arc<ClientConnection>>,
    registry: ConnectionRegistry,
    rooms: RoomManager,
    push_tx: mpsc::Sender<PushRequest>,
    stats: Arc<HubStats>,
    push_title: String,
    max_dropped_messages: u64,
}

impl Dispatcher {
    /// Create an empty dispatcher.
    pub fn new(
        push_tx: mpsc::Sender<PushRequest>,
        stats: Arc<HubStats>,
        push_title: String,
        max_dropped_messages: u64,
    ) -> Self {
        Self {
            connections: HashMap::new(),
            registry: ConnectionRegistry::new(),
            rooms: RoomManager::new(),
            push_tx,
            stats,
            push_title,
            max_dropped_messages: max_dropped_messages.max(1),
        }
    }

    /// Apply one bus message.
    pub fn apply(&mut self, message: BusMessage) {
        match message {
            BusMessage::Connected { connection } => self.connect(connection),
            BusMessage::Disconnected {
                connection_id,
                reason,
            } => {
                let _ = self.disconnect(&connection_id, reason);
            }
            BusMessage::Inbound {
                connection_id,
                intent,
                ack_id,
            } => self.handle_inbound(&connection_id, intent, ack_id),
            BusMessage::Publish { intent, reply } => {
                let report = self.dispatch(None, intent);
                if let Some(reply) = reply {
                    let _ = reply.send(report);
                }
            }
        }
        self.publish_stats();
    }

    /// Track a new connection, place it in its namespace room and greet it.
    pub fn connect(&mut self, connection: Arc<ClientConnection>) {
        let id = connection.id.clone();
        let namespace = connection.namespace;

        let _ = self.rooms.join(&id, Room::Namespace(namespace));
        let _ = connection.send_frame(&OutboundFrame::connected(&id, namespace));
        if self.connections.insert(id.clone(), connection).is_some() {
            warn!(conn_id = %id, "connection id reused, replacing");
        }
        gauge!(WS_CONNECTIONS_ACTIVE, "namespace" => namespace.as_str()).increment(1.0);
        debug!(conn_id = %id, namespace = %namespace, "connection registered");
    }

    /// Forget a connection: bindings, memberships and the connection itself.
    pub fn disconnect(
        &mut self,
        id: &ConnectionId,
        reason: &'static str,
    ) -> Option<Arc<ClientConnection>> {
        let connection = self.connections.remove(id)?;
        let identities = self.registry.remove(id);
        let rooms = self.rooms.leave_all(id);
        connection.close();

        gauge!(WS_CONNECTIONS_ACTIVE, "namespace" => connection.namespace.as_str()).decrement(1.0);
        info!(
            conn_id = %id,
            namespace = %connection.namespace,
            reason,
            unbound = identities.len(),
            rooms,
            "connection removed"
        );
        Some(connection)
    }

    /// Dispatch a frame from a live connection and acknowledge it if asked.
    pub fn handle_inbound(
        &mut self,
        connection_id: &ConnectionId,
        intent: Intent,
        ack_id: Option<String>,
    ) {
        if !self.connections.contains_key(connection_id) {
            debug!(conn_id = %connection_id, kind = intent.kind(), "frame from departed connection ignored");
            return;
        }

        let report = self.dispatch(Some(connection_id), intent);

        if let Some(ack_id) = ack_id {
            let ack = AckReport::delivered(ack_id, report.recipients, report.push_fallback);
            if let Some(sender) = self.connections.get(connection_id) {
                let _ = sender.send_frame(&OutboundFrame::ack(&ack));
            }
        }
    }

    /// Route one intent. `sender` is `None` for intents raised over HTTP.
    pub fn dispatch(&mut self, sender: Option<&ConnectionId>, intent: Intent) -> DispatchReport {
        let kind = intent.kind();
        let (target, report) = match intent {
            Intent::RegisterUser { identity } => {
                let Some(sender) = sender else {
                    return DispatchReport::default();
                };
                if let Some(previous) = self.registry.register(identity.clone(), sender.clone()) {
                    info!(identity = %identity, conn_id = %sender, previous = %previous, "identity rebound to newer connection");
                } else {
                    info!(identity = %identity, conn_id = %sender, "identity registered");
                }
                return DispatchReport::default();
            }
            Intent::JoinRoom { room } => {
                if let Some(sender) = sender {
                    let joined = self.rooms.join(sender, Room::Named(room.clone()));
                    debug!(conn_id = %sender, room = %room, joined, "join room");
                }
                return DispatchReport::default();
            }
            Intent::LeaveRoom { room } => {
                if let Some(sender) = sender {
                    let left = self.rooms.leave(sender, &Room::Named(room.clone()));
                    debug!(conn_id = %sender, room = %room, left, "leave room");
                }
                return DispatchReport::default();
            }
            Intent::MenuChanged { event, payload } => {
                let room = Room::Namespace(Namespace::Users);
                let recipients = self.broadcast(&room, BroadcastMode::Everyone, &OutboundFrame::new(event, payload));
                (room.to_string(), DispatchReport { recipients, push_fallback: false })
            }
            Intent::KitchenStatusChanged { event, status, payload } => {
                let room = Room::Namespace(Namespace::Users);
                debug!(status = status.label(), "kitchen status changed");
                let recipients = self.broadcast(&room, BroadcastMode::Everyone, &OutboundFrame::new(event, payload));
                (room.to_string(), DispatchReport { recipients, push_fallback: false })
            }
            Intent::KitchenMessage {
                payload,
                subscription,
            } => {
                if let Some((kitchen, subscription)) = subscription {
                    let _ = self.request_push(PushRequest::Subscribe {
                        identity: kitchen,
                        subscription,
                    });
                }
                let room = Room::Namespace(Namespace::Users);
                let frame = OutboundFrame::new(events::MESSAGE_FROM_KITCHEN, payload);
                let recipients = self.broadcast(&room, BroadcastMode::Everyone, &frame);
                (room.to_string(), DispatchReport { recipients, push_fallback: false })
            }
            Intent::OrderCreated { order, kitchen_id } => {
                let room = Room::Namespace(Namespace::Kitchen);
                let body = new_order_text(&order);
                let frame = OutboundFrame::new(events::ORDER_CREATED, order);
                let recipients = self.broadcast(&room, BroadcastMode::Everyone, &frame);
                let push_fallback = match kitchen_id {
                    Some(kitchen) if recipients == 0 => self.request_push(PushRequest::Notify {
                        identity: kitchen,
                        notification: PushNotification::new(self.push_title.clone(), body),
                    }),
                    _ => false,
                };
                (room.to_string(), DispatchReport { recipients, push_fallback })
            }
            Intent::OrderStatusChanged {
                event,
                identity,
                order_id,
                message,
            } => {
                let text = order_status_text(&order_id, message.as_deref());
                let report = self.unicast(&identity, &event, &order_id, text);
                (format!("identity:{identity}"), report)
            }
            Intent::RoomUpdate { room, payload } => {
                let room = Room::Named(room);
                let mode = sender.map_or(BroadcastMode::Everyone, BroadcastMode::Others);
                let frame = OutboundFrame::new(events::ORDER_UPDATE, payload);
                let recipients = self.broadcast(&room, mode, &frame);
                (room.to_string(), DispatchReport { recipients, push_fallback: false })
            }
        };

        #[allow(clippy::cast_precision_loss)]
        let recipients = report.recipients as f64;
        counter!(DISPATCH_TOTAL, "kind" => kind).increment(1);
        histogram!(DISPATCH_RECIPIENTS, "kind" => kind).record(recipients);
        info!(
            kind,
            target = %target,
            recipients = report.recipients,
            push_fallback = report.push_fallback,
            "dispatched"
        );
        report
    }

    /// Deliver an order status text to exactly one live connection, or hand
    /// it to the push fallback when no connection takes it.
    fn unicast(
        &self,
        identity: &Identity,
        event: &str,
        order_id: &str,
        text: String,
    ) -> DispatchReport {
        let target = self
            .registry
            .lookup(identity)
            .and_then(|id| self.connections.get(id))
            .filter(|connection| !connection.is_closing())
            .cloned();

        if let Some(connection) = target {
            let frame = OutboundFrame::new(event, json!({ "orderId": order_id, "message": &text }));
            match frame.to_json() {
                Ok(json) => {
                    if self.deliver(&connection, &Arc::new(json)) {
                        return DispatchReport {
                            recipients: 1,
                            push_fallback: false,
                        };
                    }
                    debug!(identity = %identity, conn_id = %connection.id, order_id, "live connection refused frame");
                }
                Err(e) => {
                    warn!(event, error = %e, "failed to serialize frame");
                    return DispatchReport::default();
                }
            }
        } else {
            debug!(identity = %identity, order_id, "no live connection");
        }

        let push_fallback = self.request_push(PushRequest::Notify {
            identity: identity.clone(),
            notification: PushNotification::new(self.push_title.clone(), text),
        });
        DispatchReport {
            recipients: 0,
            push_fallback,
        }
    }

    /// Serialize once and queue the frame for every recipient in `room`.
    fn broadcast(&self, room: &Room, mode: BroadcastMode<'_>, frame: &OutboundFrame) -> usize {
        let json = match frame.to_json() {
            Ok(json) => Arc::new(json),
            Err(e) => {
                warn!(event = %frame.event, error = %e, "failed to serialize frame");
                return 0;
            }
        };

        let targets: Vec<Arc<ClientConnection>> = self
            .rooms
            .recipients(room, mode)
            .iter()
            .filter_map(|id| self.connections.get(id).cloned())
            .collect();

        targets
            .iter()
            .filter(|connection| self.deliver(connection, &json))
            .count()
    }

    /// Queue one message; closes clients that keep overflowing their queue.
    fn deliver(&self, connection: &ClientConnection, json: &Arc<String>) -> bool {
        if connection.send(Arc::clone(json)) {
            return true;
        }

        counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
        let drops = connection.drop_count();
        if drops >= self.max_dropped_messages {
            if !connection.is_closing() {
                warn!(conn_id = %connection.id, drops, "disconnecting slow client");
                counter!(WS_SLOW_CLIENT_EVICTIONS_TOTAL).increment(1);
                connection.close();
            }
        } else {
            warn!(conn_id = %connection.id, total_drops = drops, "failed to send event to client (channel full)");
        }
        false
    }

    /// Hand work to the push worker without waiting.
    fn request_push(&self, request: PushRequest) -> bool {
        match self.push_tx.try_send(request) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(request)) => {
                counter!(PUSH_QUEUE_DROPS_TOTAL).increment(1);
                warn!(?request, "push queue full, request dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("push worker stopped, request dropped");
                false
            }
        }
    }

    /// Close every live connection; returns how many were closed.
    pub fn close_all(&mut self) -> usize {
        let count = self.connections.len();
        for connection in self.connections.values() {
            connection.close();
        }
        count
    }

    /// Current counters.
    pub fn snapshot(&self) -> HubSnapshot {
        HubSnapshot {
            kitchen_connections: self.rooms.member_count(&Room::Namespace(Namespace::Kitchen)),
            user_connections: self.rooms.member_count(&Room::Namespace(Namespace::Users)),
            registered_identities: self.registry.len(),
            rooms: self.rooms.named_room_count(),
        }
    }

    fn publish_stats(&self) {
        self.stats.store(self.snapshot());
    }

    /// Identity bindings.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Room membership.
    pub fn rooms(&self) -> &RoomManager {
        &self.rooms
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

/// Push body for a new order: `New order #<id> received` when the order
/// carries an id.
fn new_order_text(order: &Value) -> String {
    match order.get("orderId") {
        Some(Value::String(id)) if !id.is_empty() => format!("New order #{id} received"),
        Some(Value::Number(id)) => format!("New order #{id} received"),
        _ => "New order received".to_string(),
    }
}
