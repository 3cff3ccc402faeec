//! Listener and socket settings.

use serde::{Deserialize, Serialize};

/// Server network and runtime settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port shared by both namespaces and the HTTP API.
    pub port: u16,
    /// Maximum concurrent socket connections across both namespaces.
    pub max_connections: usize,
    /// Seconds between server pings.
    pub heartbeat_interval_secs: u64,
    /// Seconds of silence after which a client is dropped.
    pub heartbeat_timeout_secs: u64,
    /// Largest accepted inbound frame, in bytes.
    pub max_message_size: usize,
    /// Outbound queue depth per connection.
    pub send_queue_capacity: usize,
    /// Depth of the internal event bus.
    pub bus_capacity: usize,
    /// Dropped outbound messages tolerated before a slow client is closed.
    pub max_dropped_messages: u64,
    /// Origins allowed to connect; `"*"` allows all.
    pub allowed_origins: Vec<String>,
    /// Answer unknown events with an `error` frame instead of ignoring them.
    pub strict_events: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_connections: 10_000,
            heartbeat_interval_secs: 25,
            heartbeat_timeout_secs: 60,
            max_message_size: 64 * 1024,
            send_queue_capacity: 256,
            bus_capacity: 1024,
            max_dropped_messages: 100,
            allowed_origins: vec!["*".to_string()],
            strict_events: false,
        }
    }
}

impl ServerSettings {
    /// Whether every origin is accepted.
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}
