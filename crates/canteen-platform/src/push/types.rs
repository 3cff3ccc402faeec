//! Push notification types.

use serde::{Deserialize, Serialize};

/// A short notification shown by the customer's or kitchen's browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushNotification {
    /// Notification title.
    pub title: String,
    /// Notification body.
    pub body: String,
}

impl PushNotification {
    /// Create a notification.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Result of one fallback attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// The gateway accepted the notification.
    Delivered,
    /// Push fallback is turned off.
    Disabled,
    /// The identity has no stored subscription.
    NoSubscription,
    /// The push service reported the subscription gone; it was removed.
    Expired,
    /// Delivery failed for another reason.
    Failed(String),
}

impl PushOutcome {
    /// Metrics label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Disabled => "disabled",
            Self::NoSubscription => "no_subscription",
            Self::Expired => "expired",
            Self::Failed(_) => "failed",
        }
    }
}
