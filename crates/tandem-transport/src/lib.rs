//! # tandem-transport
//!
//! Transports and the per-connection client for the Tandem hub.
//!
//! A connection is split into a [`FrameSource`] (read half) and a
//! [`FrameSink`] (write half). A [`Client`] takes both halves, registers with
//! the hub, and runs two pumps:
//!
//! - **reader** - decodes inbound frames into hub commands and tracks liveness
//! - **writer** - drains the client's mailbox to the sink and sends pings
//!
//! Available transports:
//!
//! - **WebSocket** - axum WebSocket halves (feature `websocket`)
//! - **Memory** - in-process pair, used by tests and loopback tooling
//!
//! ```rust,ignore
//! use tandem_transport::{websocket, Client, ClientConfig};
//!
//! let (source, sink) = websocket::split(socket);
//! let reason = Client::new(identity, source, sink, services, ClientConfig::default())
//!     .join_on_start("match-42")
//!     .run()
//!     .await;
//! ```

pub mod client;
pub mod memory;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use client::{Client, ClientConfig, Disconnect, Services};
pub use traits::{FrameSink, FrameSource, Inbound, TransportError};
