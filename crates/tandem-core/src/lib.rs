//! # tandem-core
//!
//! The connection hub of the Tandem realtime engine.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **Hub** - Single-owner registry of live clients and room membership
//! - **Mailbox** - Bounded per-client outbound queue
//! - **Room** - Broadcast scope keyed by a room id
//! - **Store / Access** - Persistence and authorization collaborators
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐ commands ┌─────────────┐  try_send  ┌─────────────┐
//! │ Client read │─────────▶│     Hub     │───────────▶│   Mailbox   │
//! └─────────────┘          └─────────────┘            └─────────────┘
//!                                 │                          │
//!                                 ▼                          ▼
//!                          ┌─────────────┐            ┌─────────────┐
//!                          │    Rooms    │            │ Client write│
//!                          └─────────────┘            └─────────────┘
//! ```

pub mod access;
pub mod hub;
pub mod mailbox;
pub mod member;
pub mod room;
pub mod store;

pub use access::{AllowAll, RoomAccess};
pub use hub::{Command, Hub, HubConfig, HubError, HubHandle, HubStats};
pub use mailbox::{
    mailbox, Mailbox, MailboxSender, Overflow, Revocation, DEFAULT_MAILBOX_CAPACITY,
};
pub use member::{ClientId, Member};
pub use room::{validate_room_id, Room, RoomId};
pub use store::{MemoryStore, MessageStore, StoreError};
