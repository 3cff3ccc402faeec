//! Identity → connection bindings for targeted delivery.
//!
//! At most one binding per identity: a later `register` for the same identity
//! replaces the earlier one. Removing a connection only drops the bindings
//! that still point at it, so a stale connection closing late never evicts a
//! newer session of the same customer.
//!
//! Owned by the reactor task; no interior locking.

use std::collections::{HashMap, HashSet};

use canteen_core::{ConnectionId, Identity};

/// Maps identities to their current live connection.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    by_identity: HashMap<Identity, ConnectionId>,
    by_connection: HashMap<ConnectionId, HashSet<Identity>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `identity` to `connection`, returning the connection it was bound
    /// to before (if different).
    pub fn register(&mut self, identity: Identity, connection: ConnectionId) -> Option<ConnectionId> {
        let previous = self.by_identity.insert(identity.clone(), connection.clone());

        if let Some(ref prev) = previous {
            if *prev == connection {
                return None;
            }
            if let Some(set) = self.by_connection.get_mut(prev) {
                let _ = set.remove(&identity);
                if set.is_empty() {
                    let _ = self.by_connection.remove(prev);
                }
            }
        }

        let _ = self
            .by_connection
            .entry(connection)
            .or_default()
            .insert(identity);
        previous
    }

    /// Current connection for `identity`.
    pub fn lookup(&self, identity: &Identity) -> Option<&ConnectionId> {
        self.by_identity.get(identity)
    }

    /// Drop every binding that currently points at `connection`; returns the
    /// identities that were unbound.
    pub fn remove(&mut self, connection: &ConnectionId) -> Vec<Identity> {
        let Some(identities) = self.by_connection.remove(connection) else {
            return Vec::new();
        };
        let mut removed = Vec::with_capacity(identities.len());
        for identity in identities {
            if self.by_identity.get(&identity) == Some(connection) {
                let _ = self.by_identity.remove(&identity);
                removed.push(identity);
            }
        }
        removed
    }

    /// Identities currently bound to `connection`.
    #[cfg(test)]
    pub(crate) fn identities_of(&self, connection: &ConnectionId) -> Vec<&Identity> {
        self.by_connection
            .get(connection)
            .map(|set| set.iter().collect())
            .unwrap_or_default()
    }

    /// Number of bound identities.
    pub fn len(&self) -> usize {
        self.by_identity.len()
    }

    /// Whether no identity is bound.
    pub fn is_empty(&self) -> bool {
        self.by_identity.is_empty()
    }
}
