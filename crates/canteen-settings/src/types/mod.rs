//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` to match the JSON
//! settings file. Each type implements [`Default`] with production default
//! values, and `#[serde(default)]` lets a partial file fill in the rest.

mod logging;
mod push;
mod server;

pub use logging::*;
pub use push::*;
pub use server::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type for the canteen server.
///
/// Loaded from `~/.canteen/settings.json` with defaults applied for
/// missing fields. Environment variables can override specific values.
///
/// ```json
/// {
///   "server": { "port": 4000, "allowedOrigins": ["https://canteen.example"] },
///   "push": { "enabled": true, "gatewayUrl": "https://push.example/send" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CanteenSettings {
    /// Listener, socket and limit settings.
    pub server: ServerSettings,
    /// Push fallback settings.
    pub push: PushSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl CanteenSettings {
    /// Reject combinations the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        let server = &self.server;
        if server.heartbeat_interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "server.heartbeatIntervalSecs must be at least 1".into(),
            ));
        }
        if server.heartbeat_timeout_secs < server.heartbeat_interval_secs {
            return Err(SettingsError::InvalidValue(format!(
                "server.heartbeatTimeoutSecs ({}) must not be shorter than heartbeatIntervalSecs ({})",
                server.heartbeat_timeout_secs, server.heartbeat_interval_secs
            )));
        }
        if server.max_connections == 0 {
            return Err(SettingsError::InvalidValue(
                "server.maxConnections must be at least 1".into(),
            ));
        }
        if server.send_queue_capacity == 0 || server.bus_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "server.sendQueueCapacity and server.busCapacity must be at least 1".into(),
            ));
        }
        if server.max_message_size == 0 {
            return Err(SettingsError::InvalidValue(
                "server.maxMessageSize must be at least 1".into(),
            ));
        }
        if self.push.enabled && self.push.gateway_url.as_deref().is_none_or(str::is_empty) {
            return Err(SettingsError::InvalidValue(
                "push.gatewayUrl is required when push.enabled is true".into(),
            ));
        }
        Ok(())
    }
}
