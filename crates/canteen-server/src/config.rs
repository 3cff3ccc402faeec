//! Server configuration.

use std::time::Duration;

use canteen_settings::ServerSettings;
use serde::{Deserialize, Serialize};

/// Configuration for the canteen server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket connections across both namespaces.
    pub max_connections: usize,
    /// Heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Silence after which a client is dropped, in seconds.
    pub heartbeat_timeout_secs: u64,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Outbound queue depth per connection.
    pub send_queue_capacity: usize,
    /// Event bus depth.
    pub bus_capacity: usize,
    /// Dropped outbound messages tolerated before a slow client is closed.
    pub max_dropped_messages: u64,
    /// Allowed `Origin` values; `"*"` allows all.
    pub allowed_origins: Vec<String>,
    /// Reply to unknown events with an `error` frame.
    pub strict_events: bool,
    /// Title of push fallback notifications.
    pub push_title: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 1000,
            heartbeat_interval_secs: 25,
            heartbeat_timeout_secs: 60,
            max_message_size: 64 * 1024,
            send_queue_capacity: 256,
            bus_capacity: 1024,
            max_dropped_messages: 100,
            allowed_origins: vec!["*".into()],
            strict_events: false,
            push_title: "Canteen".into(),
        }
    }
}

impl ServerConfig {
    /// Build from loaded settings.
    pub fn from_settings(server: &ServerSettings, push_title: &str) -> Self {
        Self {
            host: server.host.clone(),
            port: server.port,
            max_connections: server.max_connections,
            heartbeat_interval_secs: server.heartbeat_interval_secs,
            heartbeat_timeout_secs: server.heartbeat_timeout_secs,
            max_message_size: server.max_message_size,
            send_queue_capacity: server.send_queue_capacity,
            bus_capacity: server.bus_capacity,
            max_dropped_messages: server.max_dropped_messages,
            allowed_origins: server.allowed_origins.clone(),
            strict_events: server.strict_events,
            push_title: push_title.to_string(),
        }
    }

    /// Heartbeat interval as a `Duration`.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    /// Heartbeat timeout as a `Duration`.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs.max(1))
    }

    /// Whether every origin is accepted.
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }

    /// Whether a browser `Origin` header value may connect.
    pub fn origin_allowed(&self, origin: &str) -> bool {
        self.allows_any_origin()
            || self
                .allowed_origins
                .iter()
                .any(|o| o.trim_end_matches('/') == origin.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 0);
        assert_eq!(cfg.heartbeat_interval(), Duration::from_secs(25));
        assert_eq!(cfg.heartbeat_timeout(), Duration::from_secs(60));
        assert!(!cfg.strict_events);
    }

    #[test]
    fn from_settings_copies_fields() {
        let settings = ServerSettings {
            host: "0.0.0.0".into(),
            port: 4000,
            max_connections: 7,
            strict_events: true,
            ..ServerSettings::default()
        };
        let cfg = ServerConfig::from_settings(&settings, "Kitchen");
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 4000);
        assert_eq!(cfg.max_connections, 7);
        assert!(cfg.strict_events);
        assert_eq!(cfg.push_title, "Kitchen");
        assert_eq!(cfg.send_queue_capacity, settings.send_queue_capacity);
    }

    #[test]
    fn wildcard_allows_everything() {
        let cfg = ServerConfig::default();
        assert!(cfg.origin_allowed("https://evil.example"));
    }

    #[test]
    fn explicit_origins() {
        let cfg = ServerConfig {
            allowed_origins: vec!["https://canteen.example/".into()],
            ..ServerConfig::default()
        };
        assert!(cfg.origin_allowed("https://canteen.example"));
        assert!(!cfg.origin_allowed("https://evil.example"));
    }

    #[test]
    fn zero_heartbeat_clamped() {
        let cfg = ServerConfig {
            heartbeat_interval_secs: 0,
            ..ServerConfig::default()
        };
        assert_eq!(cfg.heartbeat_interval(), Duration::from_secs(1));
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = ServerConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.max_connections, cfg.max_connections);
        assert_eq!(back.allowed_origins, cfg.allowed_origins);
    }
}
