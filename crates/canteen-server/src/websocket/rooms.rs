//! Room membership.
//!
//! Every connection is placed in the implicit room of its namespace on
//! connect, so "all kitchens" and "all users" are ordinary room broadcasts.
//! Named rooms are joined explicitly and are shared across namespaces.

use std::collections::{HashMap, HashSet};
use std::fmt;

use canteen_core::{ConnectionId, Namespace, RoomId};

/// A broadcast group.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Room {
    /// Every connection of a namespace.
    Namespace(Namespace),
    /// A client-chosen room (usually a kitchen id).
    Named(RoomId),
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Namespace(ns) => write!(f, "ns:{ns}"),
            Self::Named(id) => write!(f, "room:{id}"),
        }
    }
}

/// Who in a room receives a broadcast.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BroadcastMode<'a> {
    /// Every member, the sender included.
    Everyone,
    /// Every member except the given connection.
    Others(&'a ConnectionId),
}

/// Many-to-many connection ↔ room index.
#[derive(Debug, Default)]
pub struct RoomManager {
    members: HashMap<Room, HashSet<ConnectionId>>,
    memberships: HashMap<ConnectionId, HashSet<Room>>,
}

impl RoomManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `connection` to `room`; returns whether it was newly added.
    pub fn join(&mut self, connection: &ConnectionId, room: Room) -> bool {
        let added = self
            .members
            .entry(room.clone())
            .or_default()
            .insert(connection.clone());
        if added {
            let _ = self
                .memberships
                .entry(connection.clone())
                .or_default()
                .insert(room);
        }
        added
    }

    /// Remove `connection` from `room`; returns whether it was a member.
    pub fn leave(&mut self, connection: &ConnectionId, room: &Room) -> bool {
        let removed = match self.members.get_mut(room) {
            Some(set) => {
                let removed = set.remove(connection);
                if set.is_empty() {
                    let _ = self.members.remove(room);
                }
                removed
            }
            None => false,
        };
        if removed {
            if let Some(rooms) = self.memberships.get_mut(connection) {
                let _ = rooms.remove(room);
                if rooms.is_empty() {
                    let _ = self.memberships.remove(connection);
                }
            }
        }
        removed
    }

    /// Remove `connection` from every room; returns how many it left.
    pub fn leave_all(&mut self, connection: &ConnectionId) -> usize {
        let Some(rooms) = self.memberships.remove(connection) else {
            return 0;
        };
        for room in &rooms {
            if let Some(set) = self.members.get_mut(room) {
                let _ = set.remove(connection);
                if set.is_empty() {
                    let _ = self.members.remove(room);
                }
            }
        }
        rooms.len()
    }

    /// Current members of `room`.
    pub fn members_of(&self, room: &Room) -> HashSet<ConnectionId> {
        self.members.get(room).cloned().unwrap_or_default()
    }

    /// Members of `room` that should receive a broadcast under `mode`.
    pub fn recipients(&self, room: &Room, mode: BroadcastMode<'_>) -> Vec<ConnectionId> {
        let Some(set) = self.members.get(room) else {
            return Vec::new();
        };
        set.iter()
            .filter(|c| match mode {
                BroadcastMode::Everyone => true,
                BroadcastMode::Others(sender) => *c != sender,
            })
            .cloned()
            .collect()
    }

    /// Number of members in `room`.
    pub fn member_count(&self, room: &Room) -> usize {
        self.members.get(room).map_or(0, HashSet::len)
    }

    /// Whether `connection` is in `room`.
    pub fn is_member(&self, connection: &ConnectionId, room: &Room) -> bool {
        self.members
            .get(room)
            .is_some_and(|set| set.contains(connection))
    }

    /// Number of non-empty named rooms.
    pub fn named_room_count(&self) -> usize {
        self.members
            .keys()
            .filter(|r| matches!(r, Room::Named(_)))
            .count()
    }
}
