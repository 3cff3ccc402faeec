//! Push fallback settings.

use serde::{Deserialize, Serialize};

/// Settings for the out-of-band push gateway.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PushSettings {
    /// Whether push fallback is attempted at all.
    pub enabled: bool,
    /// Gateway endpoint that accepts `{subscription, notification, ttl}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_url: Option<String>,
    /// Bearer token for the gateway.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Time-to-live handed to the push service, in seconds.
    pub ttl_secs: u64,
    /// Notification title used when the event has none.
    pub default_title: String,
}

impl Default for PushSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            gateway_url: None,
            api_key: None,
            timeout_secs: 10,
            ttl_secs: 3600,
            default_title: "Canteen".to_string(),
        }
    }
}
