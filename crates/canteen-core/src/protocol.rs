//! Wire protocol: JSON text frames exchanged over both namespaces.
//!
//! Inbound: `{"event": "<name>", "data": <any>, "ackId"?: "<id>"}`.
//! Outbound: `{"event": "<name>", "data": <any>}`.
//!
//! Field names inside payloads (`phoneNumber`, `orderId`, `room`, ...) are the
//! wire contract shared with the kitchen and customer apps.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};

use crate::errors::ProtocolError;
use crate::ids::{ConnectionId, Identity, RoomId};
use crate::namespace::Namespace;

/// Event names on the wire.
pub mod events {
    /// Kitchen → users: a menu item was created.
    pub const MENU_ITEM_CREATED: &str = "menuItemCreated";
    /// Kitchen → users: generic menu notification.
    pub const MENU_NOTIFICATION: &str = "menuNotification";
    /// Kitchen → one user: order status notification.
    pub const ORDER_NOTIFICATION: &str = "orderNotification";
    /// Kitchen → one user: order completed.
    pub const ORDER_COMPLETED: &str = "orderCompleted";
    /// Kitchen → users: online/offline status.
    pub const KITCHEN_STATUS: &str = "kitchenStatus";
    /// Kitchen → users: status update (legacy name).
    pub const KITCHEN_STATUS_UPDATED: &str = "kitchenStatusUpdated";
    /// Kitchen → users: free-form message, may carry a push subscription.
    pub const MESSAGE_FROM_KITCHEN: &str = "messageFromKitchen";
    /// User → server: bind identity to this connection.
    pub const REGISTER_USER: &str = "registerUser";
    /// User → kitchens: new order.
    pub const ORDER_CREATED: &str = "orderCreated";
    /// Either → server: join a named room.
    pub const JOIN_ROOM: &str = "joinRoom";
    /// Either → server: leave a named room.
    pub const LEAVE_ROOM: &str = "leaveRoom";
    /// Either → room: legacy room-scoped order update.
    pub const ORDER_UPDATE: &str = "order-update";
    /// Either → server: close this connection.
    pub const DISCONNECT: &str = "disconnect";
    /// Server → client: sent once after the upgrade.
    pub const CONNECTED: &str = "connected";
    /// Server → client: acknowledgement for a frame carrying `ackId`.
    pub const ACK: &str = "ack";
    /// Server → client: rejection notice (strict mode only).
    pub const ERROR: &str = "error";
}

/// A decoded inbound envelope.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundFrame {
    /// Event name.
    pub event: String,
    /// Event payload (`null` when omitted).
    #[serde(default)]
    pub data: Value,
    /// Present when the client wants an acknowledgement.
    #[serde(default)]
    pub ack_id: Option<String>,
}

impl InboundFrame {
    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::InvalidFrame(e.to_string()))
    }
}

/// An outbound envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundFrame {
    /// Event name.
    pub event: String,
    /// Event payload.
    pub data: Value,
}

impl OutboundFrame {
    /// Build a frame.
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Greeting sent right after the upgrade.
    pub fn connected(connection_id: &ConnectionId, namespace: Namespace) -> Self {
        Self::new(
            events::CONNECTED,
            json!({ "connectionId": connection_id, "namespace": namespace }),
        )
    }

    /// Acknowledgement for a frame that carried an `ackId`.
    pub fn ack(report: &AckReport) -> Self {
        Self::new(events::ACK, serde_json::to_value(report).unwrap_or(Value::Null))
    }

    /// Rejection notice for an unknown or malformed frame.
    pub fn error(event: &str, message: &str) -> Self {
        Self::new(events::ERROR, json!({ "event": event, "message": message }))
    }

    /// Serialize to the JSON text sent on the socket.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Body of an `ack` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AckReport {
    /// Echo of the client's `ackId`.
    pub ack_id: String,
    /// Whether the frame was accepted and routed.
    pub ok: bool,
    /// Live connections the event was delivered to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipients: Option<usize>,
    /// Whether delivery was handed to the push fallback.
    pub push_fallback: bool,
    /// Reason for rejection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AckReport {
    /// Accepted frame.
    pub fn delivered(ack_id: String, recipients: usize, push_fallback: bool) -> Self {
        Self {
            ack_id,
            ok: true,
            recipients: Some(recipients),
            push_fallback,
            error: None,
        }
    }

    /// Rejected frame.
    pub fn rejected(ack_id: String, error: impl Into<String>) -> Self {
        Self {
            ack_id,
            ok: false,
            recipients: None,
            push_fallback: false,
            error: Some(error.into()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Payloads
// ─────────────────────────────────────────────────────────────────────────────

/// `orderNotification` / `orderCompleted` payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderNotificationPayload {
    /// Identity of the customer to notify.
    #[serde(deserialize_with = "string_or_number")]
    pub phone_number: String,
    /// Order identifier.
    #[serde(deserialize_with = "string_or_number")]
    pub order_id: String,
    /// Status wording appended to the user-facing message.
    #[serde(default)]
    pub message: Option<String>,
}

/// `kitchenStatus` / `kitchenStatusUpdated` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KitchenStatus {
    /// Bare online flag.
    Online(bool),
    /// Bare status text, e.g. `"Kitchen is online"`.
    Text(String),
    /// Descriptive status text.
    Described {
        /// e.g. `"Kitchen is online"`.
        status: String,
    },
}

impl KitchenStatus {
    /// Short label for logs.
    pub fn label(&self) -> &str {
        match self {
            Self::Online(true) => "online",
            Self::Online(false) => "offline",
            Self::Text(status) | Self::Described { status } => status,
        }
    }

    /// Whether the status carries no usable text.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Online(_) => false,
            Self::Text(status) | Self::Described { status } => status.trim().is_empty(),
        }
    }
}

/// Browser push subscription (`PushSubscription.toJSON()` shape).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    /// Push service endpoint URL.
    pub endpoint: String,
    /// Client encryption keys.
    pub keys: PushSubscriptionKeys,
}

/// Encryption keys of a push subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscriptionKeys {
    /// Client public key (base64url).
    pub p256dh: String,
    /// Authentication secret (base64url).
    pub auth: String,
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

/// Read an identity from a bare string (or number) payload.
pub fn parse_identity(event: &str, data: &Value) -> Result<Identity, ProtocolError> {
    non_empty_text(event, data, "identity").map(Identity::from_string)
}

/// Read a room id from a bare string or `{ "room": ... }` payload.
pub fn parse_room(event: &str, data: &Value) -> Result<RoomId, ProtocolError> {
    let raw = match data {
        Value::Object(map) => map.get("room").unwrap_or(&Value::Null),
        other => other,
    };
    non_empty_text(event, raw, "room").map(RoomId::from_string)
}

/// Decode a typed payload, mapping serde errors to `InvalidPayload`.
pub fn parse_payload<T: for<'de> Deserialize<'de>>(
    event: &str,
    data: &Value,
) -> Result<T, ProtocolError> {
    T::deserialize(data).map_err(|e| ProtocolError::invalid_payload(event, e.to_string()))
}

/// Reject `null` payloads for events that must carry something.
pub fn require_present(event: &str, data: &Value) -> Result<(), ProtocolError> {
    if data.is_null() {
        Err(ProtocolError::invalid_payload(event, "payload is required"))
    } else {
        Ok(())
    }
}

fn non_empty_text(event: &str, value: &Value, what: &str) -> Result<String, ProtocolError> {
    let text = match value {
        Value::String(s) => s.trim().to_owned(),
        Value::Number(n) => n.to_string(),
        Value::Null => return Err(ProtocolError::invalid_payload(event, format!("missing {what}"))),
        _ => {
            return Err(ProtocolError::invalid_payload(
                event,
                format!("{what} must be a string"),
            ));
        }
    };
    if text.is_empty() {
        return Err(ProtocolError::invalid_payload(event, format!("empty {what}")));
    }
    Ok(text)
}
