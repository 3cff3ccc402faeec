//! Branded ID newtypes for type safety.
//!
//! Connection ids are minted by the server (UUID v7, time-ordered). Identities
//! and room ids come from clients and are wrapped as-is, so a phone number can
//! never be passed where a connection id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Unique identifier for one live WebSocket session.
    ConnectionId
}

branded_id! {
    /// Stable external key for a customer or kitchen (phone number, user id, kitchen id).
    Identity
}

branded_id! {
    /// Named broadcast group, typically a kitchen id.
    RoomId
}

impl ConnectionId {
    /// Mint a fresh connection id (`conn_<uuid v7>`).
    #[must_use]
    pub fn new() -> Self {
        Self(format!("conn_{}", Uuid::now_v7()))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_has_prefix_and_v7_uuid() {
        let id = ConnectionId::new();
        let raw = id.as_str().strip_prefix("conn_").expect("prefix");
        let parsed = Uuid::parse_str(raw).expect("should be valid UUID");
        assert_eq!(parsed.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn connection_ids_are_unique() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn identity_wraps_raw_string() {
        let id = Identity::from("9990001111");
        assert_eq!(id.as_str(), "9990001111");
        assert_eq!(id.to_string(), "9990001111");
        assert_eq!(String::from(id), "9990001111");
    }

    #[test]
    fn serde_is_transparent() {
        let room = RoomId::from("kitchen-7");
        let json = serde_json::to_string(&room).unwrap();
        assert_eq!(json, r#""kitchen-7""#);
        let back: RoomId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, room);
    }

    #[test]
    fn deref_to_str() {
        let id = Identity::from("abc");
        assert_eq!(id.len(), 3);
        assert!(id.starts_with('a'));
    }
}
