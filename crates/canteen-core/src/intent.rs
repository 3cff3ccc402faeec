//! Typed intents decoded from inbound frames.
//!
//! An intent is transient: it exists for the duration of one dispatch and is
//! never persisted. The `event` fields keep the alias the client used
//! (`menuItemCreated` vs `menuNotification`, ...) so the outbound frame carries
//! the same name legacy clients listen for.

use serde_json::Value;

use crate::ids::{Identity, RoomId};
use crate::protocol::{KitchenStatus, PushSubscription};

/// A business event ready for routing.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Bind an identity to the sending connection (last register wins).
    RegisterUser {
        /// Phone number or user id.
        identity: Identity,
    },
    /// Add the sending connection to a named room.
    JoinRoom {
        /// Room to join.
        room: RoomId,
    },
    /// Remove the sending connection from a named room.
    LeaveRoom {
        /// Room to leave.
        room: RoomId,
    },
    /// A menu item changed; every customer sees it.
    MenuChanged {
        /// Event alias used by the sender.
        event: String,
        /// Menu item descriptor, forwarded verbatim.
        payload: Value,
    },
    /// Kitchen went online/offline or changed its status text.
    KitchenStatusChanged {
        /// Event alias used by the sender.
        event: String,
        /// Parsed status.
        status: KitchenStatus,
        /// Original payload, forwarded verbatim.
        payload: Value,
    },
    /// A customer placed an order; every kitchen sees it.
    OrderCreated {
        /// Order descriptor, forwarded verbatim.
        order: Value,
        /// Owning kitchen, used for push fallback when no kitchen is online.
        kitchen_id: Option<Identity>,
    },
    /// An order changed status; only the ordering customer sees it.
    OrderStatusChanged {
        /// Event alias used by the sender.
        event: String,
        /// Customer to notify.
        identity: Identity,
        /// Order identifier.
        order_id: String,
        /// Status wording (`"ready"`, ...); `None` means completed.
        message: Option<String>,
    },
    /// Free-form message from a kitchen to every customer.
    KitchenMessage {
        /// Message body with any subscription fields stripped.
        payload: Value,
        /// Push subscription to store for the kitchen, if one was attached.
        subscription: Option<(Identity, PushSubscription)>,
    },
    /// Room-scoped update delivered to everyone else in the room.
    RoomUpdate {
        /// Target room.
        room: RoomId,
        /// Full payload, forwarded verbatim.
        payload: Value,
    },
}

impl Intent {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RegisterUser { .. } => "register_user",
            Self::JoinRoom { .. } => "join_room",
            Self::LeaveRoom { .. } => "leave_room",
            Self::MenuChanged { .. } => "menu_changed",
            Self::KitchenStatusChanged { .. } => "kitchen_status_changed",
            Self::OrderCreated { .. } => "order_created",
            Self::OrderStatusChanged { .. } => "order_status_changed",
            Self::KitchenMessage { .. } => "kitchen_message",
            Self::RoomUpdate { .. } => "room_update",
        }
    }

    /// Whether the intent only changes bookkeeping (no outbound event).
    pub fn is_membership(&self) -> bool {
        matches!(
            self,
            Self::RegisterUser { .. } | Self::JoinRoom { .. } | Self::LeaveRoom { .. }
        )
    }
}

/// Customer-facing text for an order status notification.
pub fn order_status_text(order_id: &str, message: Option<&str>) -> String {
    let status = message
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or("completed!");
    format!("Your order #{order_id} has been {status}")
}
