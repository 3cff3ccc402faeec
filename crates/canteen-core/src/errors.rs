//! Protocol error types.

use thiserror::Error;

use crate::namespace::Namespace;

/// Errors raised while decoding an inbound socket frame.
///
/// None of these are surfaced as transport errors: the session logs them and,
/// when the client asked for an acknowledgement, reports them in the `ack`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The text frame was not a JSON envelope.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// The event is known but its payload is missing or has the wrong shape.
    #[error("invalid `{event}` payload: {reason}")]
    InvalidPayload {
        /// Event name as sent by the client.
        event: String,
        /// What was wrong with the payload.
        reason: String,
    },

    /// The event is not part of the namespace's vocabulary.
    #[error("unknown event `{event}` on namespace {namespace}")]
    UnknownEvent {
        /// Event name as sent by the client.
        event: String,
        /// Namespace the frame arrived on.
        namespace: Namespace,
    },
}

impl ProtocolError {
    /// Build an `InvalidPayload` error.
    pub fn invalid_payload(event: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            event: event.into(),
            reason: reason.into(),
        }
    }

    /// Metrics label for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidFrame(_) => "invalid_frame",
            Self::InvalidPayload { .. } => "invalid_payload",
            Self::UnknownEvent { .. } => "unknown_event",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_payload_display() {
        let err = ProtocolError::invalid_payload("orderCompleted", "missing field `phoneNumber`");
        assert_eq!(
            err.to_string(),
            "invalid `orderCompleted` payload: missing field `phoneNumber`"
        );
        assert_eq!(err.kind(), "invalid_payload");
    }

    #[test]
    fn unknown_event_display() {
        let err = ProtocolError::UnknownEvent {
            event: "registerUser".into(),
            namespace: Namespace::Kitchen,
        };
        assert_eq!(err.to_string(), "unknown event `registerUser` on namespace kitchen");
        assert_eq!(err.kind(), "unknown_event");
    }

    #[test]
    fn invalid_frame_display() {
        let err = ProtocolError::InvalidFrame("expected value".into());
        assert!(err.to_string().starts_with("invalid frame"));
    }
}
