//! The two socket namespaces sharing one listen endpoint.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which side of the canteen a connection belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// Kitchen staff clients (`/kitchen`).
    Kitchen,
    /// Customer clients (`/users`).
    Users,
}

impl Namespace {
    /// Both namespaces, kitchen first.
    pub const ALL: [Namespace; 2] = [Namespace::Kitchen, Namespace::Users];

    /// URL path the namespace is served on.
    pub fn path(self) -> &'static str {
        match self {
            Self::Kitchen => "/kitchen",
            Self::Users => "/users",
        }
    }

    /// Short label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Kitchen => "kitchen",
            Self::Users => "users",
        }
    }

    /// Resolve a namespace from its URL path.
    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ns| ns.path() == path)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths() {
        assert_eq!(Namespace::Kitchen.path(), "/kitchen");
        assert_eq!(Namespace::Users.path(), "/users");
    }

    #[test]
    fn from_path_roundtrip() {
        for ns in Namespace::ALL {
            assert_eq!(Namespace::from_path(ns.path()), Some(ns));
        }
        assert_eq!(Namespace::from_path("/admin"), None);
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Namespace::Users).unwrap(), r#""users""#);
        assert_eq!(Namespace::Kitchen.to_string(), "kitchen");
    }
}
