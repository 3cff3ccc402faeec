//! WebSocket hub: sessions, the event bus and the reactor-owned dispatcher.

pub mod bus;
pub mod connection;
pub mod dispatcher;
pub mod heartbeat;
pub mod namespace;
pub mod registry;
pub mod rooms;
pub mod session;
pub mod stats;

pub use bus::{BusClosed, BusMessage, EventBus, EventPublisher, spawn_reactor};
pub use connection::ClientConnection;
pub use dispatcher::{DispatchReport, Dispatcher};
pub use stats::{HubSnapshot, HubStats};
