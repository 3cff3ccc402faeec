//! `/health` endpoint.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::websocket::HubSnapshot;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// When the server started (RFC 3339).
    pub started_at: String,
    /// Live WebSocket connections across both namespaces.
    pub connections: usize,
    /// Live `/kitchen` connections.
    pub kitchen_connections: usize,
    /// Live `/users` connections.
    pub user_connections: usize,
    /// Identities bound to a live connection.
    pub registered_identities: usize,
    /// Non-empty named rooms.
    pub rooms: usize,
    /// Whether push fallback can deliver.
    pub push_enabled: bool,
}

/// Build a health response from live counters.
pub fn health_check(
    start_time: Instant,
    started_at: DateTime<Utc>,
    hub: HubSnapshot,
    push_enabled: bool,
) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        started_at: started_at.to_rfc3339(),
        connections: hub.connections(),
        kitchen_connections: hub.kitchen_connections,
        user_connections: hub.user_connections,
        registered_identities: hub.registered_identities,
        rooms: hub.rooms,
        push_enabled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn status_is_ok() {
        let resp = health_check(Instant::now(), Utc::now(), HubSnapshot::default(), false);
        assert_eq!(resp.status, "ok");
        assert_eq!(resp.connections, 0);
        assert!(!resp.push_enabled);
    }

    #[test]
    fn uptime_increases() {
        let start = Instant::now().checked_sub(Duration::from_secs(60)).unwrap();
        let resp = health_check(start, Utc::now(), HubSnapshot::default(), false);
        assert!(resp.uptime_secs >= 59);
    }

    #[test]
    fn counts_come_from_snapshot() {
        let hub = HubSnapshot {
            kitchen_connections: 2,
            user_connections: 5,
            registered_identities: 4,
            rooms: 1,
        };
        let resp = health_check(Instant::now(), Utc::now(), hub, true);
        assert_eq!(resp.connections, 7);
        assert_eq!(resp.kitchen_connections, 2);
        assert_eq!(resp.user_connections, 5);
        assert_eq!(resp.registered_identities, 4);
        assert_eq!(resp.rooms, 1);
    }

    #[test]
    fn serializes_snake_case_fields() {
        let resp = health_check(Instant::now(), Utc::now(), HubSnapshot::default(), true);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["uptime_secs"].is_number());
        assert!(json["started_at"].is_string());
        assert_eq!(json["push_enabled"], true);
    }
}
