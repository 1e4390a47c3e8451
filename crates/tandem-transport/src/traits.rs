//! Transport abstraction traits for Tandem.
//!
//! A duplex connection is used as two independent halves so that the reader
//! and writer pumps can each own one. Only the writer ever holds a sink.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// An operation did not finish in time.
    #[error("Timed out")]
    Timeout,

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to receive data.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Something received from a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// An application message (one or more encoded frames).
    Data(Bytes),
    /// A transport-level ping from the peer.
    Ping,
    /// A transport-level liveness acknowledgement.
    Pong,
}

/// The read half of a connection.
#[async_trait]
pub trait FrameSource: Send {
    /// Receive the next item.
    ///
    /// Returns `Ok(None)` when the peer closed the connection cleanly.
    async fn recv(&mut self) -> Result<Option<Inbound>, TransportError>;
}

/// The write half of a connection.
#[async_trait]
pub trait FrameSink: Send {
    /// Send a pre-encoded application message.
    async fn send(&mut self, data: Bytes) -> Result<(), TransportError>;

    /// Send a liveness ping.
    async fn ping(&mut self) -> Result<(), TransportError>;

    /// Close the connection. Closing twice is not an error.
    async fn close(&mut self) -> Result<(), TransportError>;
}
