use thiserror::Error;
use tincan_core::{ConnId, RoomId};

/// Registry-level admission failures, surfaced to the requesting client as an
/// `error` signal with a redirect hint.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RoomError {
    #[error("room {0} not found")]
    NotFound(RoomId),

    #[error("room {0} is full")]
    Full(RoomId),
}

/// One pairing scope. Existence in the registry map means the room was
/// explicitly created and is valid for joining; occupancy is tracked
/// separately so a room may sit at zero or one member while a peer
/// reconnects.
///
/// Roles are tied to slots, not identities: whoever occupies slot 0 is the
/// initiator. A fresh room hands slot 0 to the first joiner; a member
/// reconnecting while its peer stayed put takes the vacated slot and with it
/// the vacated role, so there is always exactly one offerer.
#[derive(Debug, Default)]
pub struct Room {
    slots: [Option<ConnId>; 2],
}

impl Room {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn members(&self) -> Vec<ConnId> {
        self.slots.iter().flatten().copied().collect()
    }

    pub fn occupancy(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.occupancy() == 0
    }

    pub fn is_full(&self) -> bool {
        self.occupancy() == Self::capacity()
    }

    pub const fn capacity() -> usize {
        2
    }

    pub fn contains(&self, conn: &ConnId) -> bool {
        self.slots.iter().flatten().any(|m| m == conn)
    }

    /// Vacate slots whose connection is no longer live.
    pub fn prune<F>(&mut self, is_live: F)
    where
        F: Fn(&ConnId) -> bool,
    {
        for slot in &mut self.slots {
            if slot.as_ref().is_some_and(|m| !is_live(m)) {
                *slot = None;
            }
        }
    }

    /// Seat a member in the lowest free slot; the caller must have checked
    /// capacity. Returns whether the member landed in the initiator slot.
    pub fn add(&mut self, conn: ConnId) -> bool {
        debug_assert!(!self.is_full());
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(conn);
                return index == 0;
            }
        }
        false
    }

    /// Vacate a member's slot if present. Returns true when something was
    /// removed.
    pub fn remove(&mut self, conn: &ConnId) -> bool {
        for slot in &mut self.slots {
            if slot.as_ref() == Some(conn) {
                *slot = None;
                return true;
            }
        }
        false
    }

    /// Members other than `conn`, i.e. the relay fan-out targets.
    pub fn others(&self, conn: &ConnId) -> impl Iterator<Item = &ConnId> {
        self.slots.iter().flatten().filter(move |m| *m != conn)
    }
}
