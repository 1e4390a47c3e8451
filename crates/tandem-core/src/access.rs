//! Room authorization.
//!
//! Deciding who may take part in a room (e.g. "is this user a participant
//! of match X") belongs to the rest of the platform; the hub only asks.

use async_trait::async_trait;

/// Answers whether an identity may join or post to a room.
#[async_trait]
pub trait RoomAccess: Send + Sync {
    /// Check access for `identity` to `room_id`.
    async fn can_access(&self, identity: &str, room_id: &str) -> bool;
}

/// Grants every identity access to every room.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl RoomAccess for AllowAll {
    async fn can_access(&self, _identity: &str, _room_id: &str) -> bool {
        true
    }
}
