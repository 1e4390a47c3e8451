//! Chat history persistence.
//!
//! The reader saves every chat message before broadcasting it, so the
//! store is what assigns message ids and timestamps. [`MemoryStore`] keeps a
//! bounded history per room in memory.

use crate::room::RoomId;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tandem_protocol::ChatMessage;
use thiserror::Error;
use tracing::trace;
use uuid::Uuid;

/// Default number of messages retained per room.
pub const DEFAULT_RETAINED_PER_ROOM: usize = 500;

/// Default maximum message length in bytes.
pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 4096;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The message has no visible content.
    #[error("Message content is empty")]
    EmptyContent,

    /// The message exceeds the configured length.
    #[error("Message content too long: {0} bytes")]
    ContentTooLong(usize),

    /// The backing store could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Saves chat messages and loads recent history.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message, assigning its id and timestamp.
    async fn save_message(
        &self,
        room_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<ChatMessage, StoreError>;

    /// The most recent `limit` messages of a room, oldest first.
    async fn recent_messages(
        &self,
        room_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, StoreError>;
}

/// In-memory message store.
#[derive(Debug)]
pub struct MemoryStore {
    rooms: DashMap<RoomId, Vec<ChatMessage>>,
    retained_per_room: usize,
    max_content_length: usize,
}

impl MemoryStore {
    /// Create a store with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_RETAINED_PER_ROOM, DEFAULT_MAX_CONTENT_LENGTH)
    }

    /// Create a store with custom limits.
    #[must_use]
    pub fn with_limits(retained_per_room: usize, max_content_length: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            retained_per_room: retained_per_room.max(1),
            max_content_length,
        }
    }

    /// Number of stored messages in a room.
    #[must_use]
    pub fn message_count(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map(|m| m.len()).unwrap_or(0)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn save_message(
        &self,
        room_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<ChatMessage, StoreError> {
        if content.trim().is_empty() {
            return Err(StoreError::EmptyContent);
        }
        if content.len() > self.max_content_length {
            return Err(StoreError::ContentTooLong(content.len()));
        }

        let message = ChatMessage {
            id: Uuid::new_v4().to_string(),
            room_id: room_id.to_string(),
            sender_id: sender_id.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        };

        let mut history = self.rooms.entry(room_id.to_string()).or_default();
        history.push(message.clone());
        if history.len() > self.retained_per_room {
            let overflow = history.len() - self.retained_per_room;
            history.drain(..overflow);
        }

        trace!(room = %room_id, id = %message.id, "Saved message");
        Ok(message)
    }

    async fn recent_messages(
        &self,
        room_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        Ok(self
            .rooms
            .get(room_id)
            .map(|history| {
                let start = history.len().saturating_sub(limit);
                history[start..].to_vec()
            })
            .unwrap_or_default())
    }
}
