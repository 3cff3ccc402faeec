//! Per-namespace event vocabulary.
//!
//! A frame is decoded with the vocabulary of the namespace its connection
//! belongs to: `orderNotification` from a customer is an unknown event, not a
//! kitchen notification.

use canteen_core::protocol::{
    self, InboundFrame, KitchenStatus, OrderNotificationPayload, PushSubscription, events,
};
use canteen_core::{Identity, Intent, Namespace, ProtocolError};
use serde_json::Value;

/// Result of decoding one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// A routable business or membership event.
    Intent(Intent),
    /// The client announced it is leaving.
    Disconnect,
}

/// Decode `frame` using `namespace`'s vocabulary.
pub fn decode(namespace: Namespace, frame: &InboundFrame) -> Result<Decoded, ProtocolError> {
    let event = frame.event.as_str();
    let data = &frame.data;

    // Shared by both namespaces.
    match event {
        events::DISCONNECT => return Ok(Decoded::Disconnect),
        events::JOIN_ROOM => {
            let room = protocol::parse_room(event, data)?;
            return Ok(Decoded::Intent(Intent::JoinRoom { room }));
        }
        events::LEAVE_ROOM => {
            let room = protocol::parse_room(event, data)?;
            return Ok(Decoded::Intent(Intent::LeaveRoom { room }));
        }
        events::ORDER_UPDATE => return decode_room_update(event, data).map(Decoded::Intent),
        _ => {}
    }

    let intent = match namespace {
        Namespace::Kitchen => decode_kitchen(event, data),
        Namespace::Users => decode_users(event, data),
    };
    intent.map(Decoded::Intent)
}

fn decode_kitchen(event: &str, data: &Value) -> Result<Intent, ProtocolError> {
    match event {
        events::MENU_ITEM_CREATED | events::MENU_NOTIFICATION => {
            protocol::require_present(event, data)?;
            Ok(Intent::MenuChanged {
                event: event.to_owned(),
                payload: data.clone(),
            })
        }
        events::ORDER_NOTIFICATION | events::ORDER_COMPLETED => {
            let payload: OrderNotificationPayload = protocol::parse_payload(event, data)?;
            if payload.phone_number.trim().is_empty() {
                return Err(ProtocolError::invalid_payload(event, "empty phoneNumber"));
            }
            Ok(Intent::OrderStatusChanged {
                event: event.to_owned(),
                identity: Identity::from_string(payload.phone_number.trim().to_owned()),
                order_id: payload.order_id,
                message: payload.message,
            })
        }
        events::KITCHEN_STATUS | events::KITCHEN_STATUS_UPDATED => {
            let status: KitchenStatus = protocol::parse_payload(event, data)?;
            if status.is_blank() {
                return Err(ProtocolError::invalid_payload(event, "empty status"));
            }
            Ok(Intent::KitchenStatusChanged {
                event: event.to_owned(),
                status,
                payload: data.clone(),
            })
        }
        events::MESSAGE_FROM_KITCHEN => decode_kitchen_message(event, data),
        _ => Err(unknown(event, Namespace::Kitchen)),
    }
}

fn decode_users(event: &str, data: &Value) -> Result<Intent, ProtocolError> {
    match event {
        events::REGISTER_USER => {
            let identity = protocol::parse_identity(event, data)?;
            Ok(Intent::RegisterUser { identity })
        }
        events::ORDER_CREATED => {
            protocol::require_present(event, data)?;
            let kitchen_id = data
                .get("kitchenId")
                .and_then(|v| protocol::parse_identity(event, v).ok());
            Ok(Intent::OrderCreated {
                order: data.clone(),
                kitchen_id,
            })
        }
        _ => Err(unknown(event, Namespace::Users)),
    }
}

/// `messageFromKitchen`: broadcast body with `subscription` removed; the
/// subscription is kept for the kitchen when `kitchenId` names it.
fn decode_kitchen_message(event: &str, data: &Value) -> Result<Intent, ProtocolError> {
    protocol::require_present(event, data)?;

    let Value::Object(map) = data else {
        return Ok(Intent::KitchenMessage {
            payload: data.clone(),
            subscription: None,
        });
    };

    let mut body = map.clone();
    let subscription = match body.remove("subscription") {
        None | Some(Value::Null) => None,
        Some(raw) => {
            let sub: PushSubscription = protocol::parse_payload(event, &raw)?;
            body.get("kitchenId")
                .and_then(|v| protocol::parse_identity(event, v).ok())
                .map(|kitchen| (kitchen, sub))
        }
    };

    Ok(Intent::KitchenMessage {
        payload: Value::Object(body),
        subscription,
    })
}

fn decode_room_update(event: &str, data: &Value) -> Result<Intent, ProtocolError> {
    if !data.is_object() {
        return Err(ProtocolError::invalid_payload(event, "expected an object with `room`"));
    }
    let room = protocol::parse_room(event, data)?;
    Ok(Intent::RoomUpdate {
        room,
        payload: data.clone(),
    })
}

fn unknown(event: &str, namespace: Namespace) -> ProtocolError {
    ProtocolError::UnknownEvent {
        event: event.to_owned(),
        namespace,
    }
}
