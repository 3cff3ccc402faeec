//! Counters published by the reactor for `/health`.

use std::sync::atomic::{AtomicUsize, Ordering};

use canteen_core::Namespace;
use serde::Serialize;

/// Live hub counters, written by the reactor after every bus message and
/// read lock-free by HTTP handlers.
#[derive(Debug, Default)]
pub struct HubStats {
    kitchen_connections: AtomicUsize,
    user_connections: AtomicUsize,
    registered_identities: AtomicUsize,
    rooms: AtomicUsize,
}

/// Point-in-time copy of [`HubStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HubSnapshot {
    /// Connections on `/kitchen`.
    pub kitchen_connections: usize,
    /// Connections on `/users`.
    pub user_connections: usize,
    /// Identities bound to a live connection.
    pub registered_identities: usize,
    /// Non-empty named rooms.
    pub rooms: usize,
}

impl HubSnapshot {
    /// Connections across both namespaces.
    pub fn connections(&self) -> usize {
        self.kitchen_connections + self.user_connections
    }
}

impl HubStats {
    /// All counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite every counter.
    pub fn store(&self, snapshot: HubSnapshot) {
        self.kitchen_connections
            .store(snapshot.kitchen_connections, Ordering::Relaxed);
        self.user_connections
            .store(snapshot.user_connections, Ordering::Relaxed);
        self.registered_identities
            .store(snapshot.registered_identities, Ordering::Relaxed);
        self.rooms.store(snapshot.rooms, Ordering::Relaxed);
    }

    /// Read every counter.
    pub fn snapshot(&self) -> HubSnapshot {
        HubSnapshot {
            kitchen_connections: self.kitchen_connections.load(Ordering::Relaxed),
            user_connections: self.user_connections.load(Ordering::Relaxed),
            registered_identities: self.registered_identities.load(Ordering::Relaxed),
            rooms: self.rooms.load(Ordering::Relaxed),
        }
    }

    /// Connections on one namespace.
    pub fn connections_in(&self, namespace: Namespace) -> usize {
        match namespace {
            Namespace::Kitchen => self.kitchen_connections.load(Ordering::Relaxed),
            Namespace::Users => self.user_connections.load(Ordering::Relaxed),
        }
    }
}
