//! Room abstraction for Tandem.
//!
//! Rooms are broadcast scopes (usually a match or conversation id). They are
//! not persisted: the hub creates one on first join and drops it when the
//! last member leaves.

use crate::member::ClientId;
use std::collections::HashSet;

/// Maximum room id length.
pub const MAX_ROOM_ID_LENGTH: usize = 256;

/// A room identifier.
pub type RoomId = String;

/// Validate a room id.
///
/// # Errors
///
/// Returns an error message if the room id is invalid.
pub fn validate_room_id(id: &str) -> Result<(), &'static str> {
    if id.is_empty() {
        return Err("Room id cannot be empty");
    }
    if id.len() > MAX_ROOM_ID_LENGTH {
        return Err("Room id too long");
    }
    if id.starts_with('$') {
        return Err("Room ids starting with '$' are reserved");
    }
    if !id.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) {
        return Err("Room id contains invalid characters");
    }
    Ok(())
}

/// The members of one room.
#[derive(Debug, Default)]
pub struct Room {
    members: HashSet<ClientId>,
}

impl Room {
    /// Create an empty room.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member. Returns `true` if it was not already present.
    pub fn insert(&mut self, client: ClientId) -> bool {
        self.members.insert(client)
    }

    /// Remove a member. Returns `true` if it was present.
    pub fn remove(&mut self, client: ClientId) -> bool {
        self.members.remove(&client)
    }

    /// Check if a client is a member.
    #[must_use]
    pub fn contains(&self, client: ClientId) -> bool {
        self.members.contains(&client)
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if the room has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Iterate over member ids.
    pub fn iter(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.members.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_membership() {
        let mut room = Room::new();
        let a = ClientId::next();
        let b = ClientId::next();

        assert!(room.insert(a));
        assert!(!room.insert(a));
        assert!(room.insert(b));
        assert_eq!(room.len(), 2);

        assert!(room.remove(a));
        assert!(!room.remove(a));
        assert!(!room.contains(a));
        assert!(room.contains(b));

        room.remove(b);
        assert!(room.is_empty());
    }

    #[test]
    fn test_room_id_validation() {
        assert!(validate_room_id("match-42").is_ok());
        assert!(validate_room_id("").is_err());
        assert!(validate_room_id("$system").is_err());
        assert!(validate_room_id("tab\there").is_err());

        let long_id = "a".repeat(MAX_ROOM_ID_LENGTH + 1);
        assert!(validate_room_id(&long_id).is_err());
    }
}
