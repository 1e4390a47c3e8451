//! In-process transport.
//!
//! [`pair`] returns the two halves a [`Client`](crate::Client) consumes plus
//! a [`Peer`] that plays the remote end: it injects inbound traffic and
//! observes everything the client writes.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::traits::{FrameSink, FrameSource, Inbound, TransportError};

/// Default outbound buffer of a memory pair.
const DEFAULT_OUTBOUND_CAPACITY: usize = 1024;

/// What the client wrote to the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// An application message.
    Data(Bytes),
    /// A liveness ping.
    Ping,
    /// The client closed the connection.
    Close,
}

/// Create a connected memory pair.
#[must_use]
pub fn pair() -> (MemorySource, MemorySink, Peer) {
    pair_with_capacity(DEFAULT_OUTBOUND_CAPACITY)
}

/// Create a memory pair whose outbound side holds at most `capacity` items.
///
/// Once full, client writes wait until the peer reads, like a socket whose
/// remote end stopped draining.
#[must_use]
pub fn pair_with_capacity(capacity: usize) -> (MemorySource, MemorySink, Peer) {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::channel(capacity.max(1));

    (
        MemorySource {
            inbound: inbound_rx,
        },
        MemorySink {
            outbound: outbound_tx,
            closed: false,
        },
        Peer {
            inbound: Some(inbound_tx),
            outbound: outbound_rx,
        },
    )
}

/// Read half of a memory connection.
#[derive(Debug)]
pub struct MemorySource {
    inbound: mpsc::UnboundedReceiver<Result<Inbound, TransportError>>,
}

#[async_trait]
impl FrameSource for MemorySource {
    async fn recv(&mut self) -> Result<Option<Inbound>, TransportError> {
        match self.inbound.recv().await {
            Some(Ok(inbound)) => Ok(Some(inbound)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

/// Write half of a memory connection.
#[derive(Debug)]
pub struct MemorySink {
    outbound: mpsc::Sender<Outbound>,
    closed: bool,
}

impl MemorySink {
    async fn push(&mut self, item: Outbound) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::ConnectionClosed);
        }
        self.outbound
            .send(item)
            .await
            .map_err(|_| TransportError::SendFailed("peer dropped".to_string()))
    }
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send(&mut self, data: Bytes) -> Result<(), TransportError> {
        self.push(Outbound::Data(data)).await
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        self.push(Outbound::Ping).await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        let result = self.push(Outbound::Close).await;
        self.closed = true;
        result
    }
}

/// The remote end of a memory connection.
#[derive(Debug)]
pub struct Peer {
    inbound: Option<mpsc::UnboundedSender<Result<Inbound, TransportError>>>,
    outbound: mpsc::Receiver<Outbound>,
}

impl Peer {
    fn push(&self, item: Result<Inbound, TransportError>) -> bool {
        self.inbound
            .as_ref()
            .is_some_and(|tx| tx.send(item).is_ok())
    }

    /// Send raw text as one application message.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.push(Ok(Inbound::Data(Bytes::from(text.into()))))
    }

    /// Encode and send a frame.
    pub fn send_frame<F: Serialize>(&self, frame: &F) -> bool {
        match tandem_protocol::encode(frame) {
            Ok(data) => self.push(Ok(Inbound::Data(data))),
            Err(_) => false,
        }
    }

    /// Send a liveness acknowledgement.
    pub fn pong(&self) -> bool {
        self.push(Ok(Inbound::Pong))
    }

    /// Make the client's next read fail.
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.push(Err(TransportError::ReceiveFailed(reason.into())))
    }

    /// Close the inbound direction, as if the remote end hung up.
    pub fn hang_up(&mut self) {
        self.inbound = None;
    }

    /// Stop accepting writes; the client's next write fails.
    pub fn stop_reading(&mut self) {
        self.outbound.close();
    }

    /// Wait for the next thing the client wrote.
    ///
    /// Returns `None` once the client's sink is gone.
    pub async fn recv(&mut self) -> Option<Outbound> {
        self.outbound.recv().await
    }

    /// Wait for the next application message, skipping pings.
    pub async fn recv_data(&mut self) -> Option<Bytes> {
        loop {
            match self.outbound.recv().await? {
                Outbound::Data(data) => return Some(data),
                Outbound::Ping => continue,
                Outbound::Close => return None,
            }
        }
    }

    /// Take whatever the client has written so far.
    pub fn drain(&mut self) -> Vec<Outbound> {
        std::iter::from_fn(|| self.outbound.try_recv().ok()).collect()
    }
}
