//! Frame types for the Tandem protocol.
//!
//! Inbound and outbound frames are separate enums so the reader can never
//! be asked to handle a server-only frame.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A frame sent by a client.
///
/// Fields not used by a variant (e.g. `content` on `join_room`) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    /// Join a room.
    #[serde(rename = "join_room")]
    JoinRoom {
        /// Room to join.
        room_id: String,
    },

    /// Leave a room.
    #[serde(rename = "leave_room")]
    LeaveRoom {
        /// Room to leave.
        room_id: String,
    },

    /// Send a chat message to a room.
    #[serde(rename = "message")]
    Message {
        /// Target room.
        room_id: String,
        /// Message text.
        content: String,
    },
}

impl ClientFrame {
    /// Create a new JoinRoom frame.
    #[must_use]
    pub fn join(room_id: impl Into<String>) -> Self {
        ClientFrame::JoinRoom {
            room_id: room_id.into(),
        }
    }

    /// Create a new LeaveRoom frame.
    #[must_use]
    pub fn leave(room_id: impl Into<String>) -> Self {
        ClientFrame::LeaveRoom {
            room_id: room_id.into(),
        }
    }

    /// Create a new Message frame.
    #[must_use]
    pub fn message(room_id: impl Into<String>, content: impl Into<String>) -> Self {
        ClientFrame::Message {
            room_id: room_id.into(),
            content: content.into(),
        }
    }

    /// The room this frame targets.
    #[must_use]
    pub fn room_id(&self) -> &str {
        match self {
            ClientFrame::JoinRoom { room_id }
            | ClientFrame::LeaveRoom { room_id }
            | ClientFrame::Message { room_id, .. } => room_id,
        }
    }
}

/// A persisted chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Identifier assigned by the message store.
    pub id: String,
    /// Room the message was posted to.
    pub room_id: String,
    /// Identity of the author.
    pub sender_id: String,
    /// Message text.
    pub content: String,
    /// When the store accepted the message.
    pub created_at: DateTime<Utc>,
}

/// A read receipt for a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadReceipt {
    /// Room whose messages were read.
    pub room_id: String,
    /// Identity that read them.
    pub reader_id: String,
    /// When the messages were marked read.
    pub read_at: DateTime<Utc>,
}

/// A frame sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    /// A chat message posted to a room.
    #[serde(rename = "chat_message")]
    ChatMessage(ChatMessage),

    /// Someone read the messages of a room.
    #[serde(rename = "messages_read")]
    MessagesRead(ReadReceipt),
}

impl ServerFrame {
    /// The room this frame belongs to.
    #[must_use]
    pub fn room_id(&self) -> &str {
        match self {
            ServerFrame::ChatMessage(message) => &message.room_id,
            ServerFrame::MessagesRead(receipt) => &receipt.room_id,
        }
    }
}

impl From<ChatMessage> for ServerFrame {
    fn from(message: ChatMessage) -> Self {
        ServerFrame::ChatMessage(message)
    }
}

impl From<ReadReceipt> for ServerFrame {
    fn from(receipt: ReadReceipt) -> Self {
        ServerFrame::MessagesRead(receipt)
    }
}
