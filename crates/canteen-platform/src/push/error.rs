//! Push delivery errors.

/// Errors from a push gateway call.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// HTTP request failed (connect, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The push service no longer knows the subscription (404/410).
    #[error("subscription expired (status {status})")]
    Expired {
        /// HTTP status code.
        status: u16,
    },

    /// The gateway rejected the request.
    #[error("push gateway error ({status}): {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        message: String,
    },
}

impl PushError {
    /// Whether the stored subscription should be discarded.
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired { .. })
    }
}
