//! # tandem-protocol
//!
//! Wire frames exchanged between Tandem clients and the connection hub.
//!
//! Every frame is a JSON object with a `type` discriminator. A single
//! transport message may carry several frames separated by newlines.
//!
//! ## Inbound (client -> server)
//!
//! - `join_room` / `leave_room` - Room membership
//! - `message` - Chat message for a room
//!
//! ## Outbound (server -> client)
//!
//! - `chat_message` - A persisted chat message
//! - `messages_read` - Read receipt pushed from the REST surface
//!
//! ## Example
//!
//! ```rust
//! use tandem_protocol::{codec, ClientFrame};
//!
//! let frame = ClientFrame::message("match-42", "hello");
//! let encoded = codec::encode(&frame).unwrap();
//! let decoded: ClientFrame = codec::decode(&encoded).unwrap();
//! assert_eq!(frame, decoded);
//! ```

pub mod codec;
pub mod frames;

pub use codec::{decode, encode, ProtocolError};
pub use frames::{ChatMessage, ClientFrame, ReadReceipt, ServerFrame};
