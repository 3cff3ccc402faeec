//! # canteen-core
//!
//! Shared vocabulary for the canteen notification server.
//!
//! - **Branded IDs**: `ConnectionId`, `Identity`, `RoomId` as newtypes for type safety
//! - **Namespaces**: the `/kitchen` and `/users` sides of the socket endpoint
//! - **Protocol**: inbound/outbound JSON frames and typed payloads
//! - **Intents**: decoded business events routed by the dispatcher
//! - **Errors**: `ProtocolError` via `thiserror`

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod intent;
pub mod namespace;
pub mod protocol;

pub use errors::ProtocolError;
pub use ids::{ConnectionId, Identity, RoomId};
pub use intent::Intent;
pub use namespace::Namespace;
