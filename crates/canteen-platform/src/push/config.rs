//! Push gateway configuration.

use std::time::Duration;

use canteen_settings::PushSettings;
use tracing::{debug, warn};

/// Resolved configuration for the HTTP push gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushConfig {
    /// Gateway endpoint.
    pub gateway_url: String,
    /// Bearer token, if the gateway requires one.
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Time-to-live handed to the push service, in seconds.
    pub ttl_secs: u64,
    /// Title used for fallback notifications.
    pub default_title: String,
}

impl PushConfig {
    /// Build from settings.
    ///
    /// Returns `None` when push is disabled or no gateway is configured (not
    /// an error: push fallback is optional).
    pub fn from_settings(settings: &PushSettings) -> Option<Self> {
        if !settings.enabled {
            debug!("push fallback disabled");
            return None;
        }
        let Some(gateway_url) = settings
            .gateway_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
        else {
            warn!("push enabled but no gateway URL configured, push fallback disabled");
            return None;
        };
        debug!(gateway_url, ttl_secs = settings.ttl_secs, "push gateway configured");
        Some(Self {
            gateway_url: gateway_url.to_string(),
            api_key: settings.api_key.clone().filter(|k| !k.is_empty()),
            timeout: Duration::from_secs(settings.timeout_secs),
            ttl_secs: settings.ttl_secs,
            default_title: settings.default_title.clone(),
        })
    }
}
