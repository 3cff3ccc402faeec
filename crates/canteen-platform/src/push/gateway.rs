//! Push delivery through an HTTP gateway.
//!
//! The gateway owns VAPID signing and payload encryption; this side only posts
//! `{subscription, notification, ttl}` and interprets the status code.

use async_trait::async_trait;
use canteen_core::protocol::PushSubscription;
use serde_json::json;
use tracing::debug;

use super::config::PushConfig;
use super::error::PushError;
use super::types::PushNotification;

const MAX_ERROR_BODY: usize = 512;

/// Sends one notification to one subscription.
#[async_trait]
pub trait PushSender: Send + Sync {
    /// Deliver the notification. `Err(PushError::Expired)` means the
    /// subscription should be forgotten.
    async fn send(
        &self,
        subscription: &PushSubscription,
        notification: &PushNotification,
    ) -> Result<(), PushError>;
}

/// [`PushSender`] backed by an HTTP push gateway.
pub struct HttpPushGateway {
    client: reqwest::Client,
    config: PushConfig,
}

impl HttpPushGateway {
    /// Build a gateway client with the configured timeout.
    pub fn new(config: PushConfig) -> Result<Self, PushError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self::with_client(config, client))
    }

    /// Build with an existing client (shared connection pool, tests).
    pub fn with_client(config: PushConfig, client: reqwest::Client) -> Self {
        Self { client, config }
    }

    /// Gateway configuration.
    pub fn config(&self) -> &PushConfig {
        &self.config
    }
}

#[async_trait]
impl PushSender for HttpPushGateway {
    async fn send(
        &self,
        subscription: &PushSubscription,
        notification: &PushNotification,
    ) -> Result<(), PushError> {
        let body = json!({
            "subscription": subscription,
            "notification": notification,
            "ttl": self.config.ttl_secs,
        });

        let mut request = self.client.post(&self.config.gateway_url).json(&body);
        if let Some(ref key) = self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        debug!(status = status.as_u16(), endpoint = %subscription.endpoint, "push gateway responded");

        if status.is_success() {
            return Ok(());
        }
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return Err(PushError::Expired {
                status: status.as_u16(),
            });
        }

        let mut message = response.text().await.unwrap_or_default();
        if message.len() > MAX_ERROR_BODY {
            let cut = (0..=MAX_ERROR_BODY)
                .rev()
                .find(|&i| message.is_char_boundary(i))
                .unwrap_or(0);
            message.truncate(cut);
        }
        Err(PushError::Status {
            status: status.as_u16(),
            message,
        })
    }
}
