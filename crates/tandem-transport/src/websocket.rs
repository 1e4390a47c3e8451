//! WebSocket transport implementation.
//!
//! Adapts an upgraded axum [`WebSocket`] into the two transport halves.
//! Frames are sent as text messages; the hub only ever queues JSON.

use async_trait::async_trait;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, trace};

use crate::traits::{FrameSink, FrameSource, Inbound, TransportError};

/// Split an upgraded WebSocket into its read and write halves.
#[must_use]
pub fn split(socket: WebSocket) -> (WebSocketSource, WebSocketSink) {
    let (sink, stream) = socket.split();
    (
        WebSocketSource { stream },
        WebSocketSink {
            sink,
            closed: false,
        },
    )
}

/// Read half of a WebSocket.
pub struct WebSocketSource {
    stream: SplitStream<WebSocket>,
}

#[async_trait]
impl FrameSource for WebSocketSource {
    async fn recv(&mut self) -> Result<Option<Inbound>, TransportError> {
        match self.stream.next().await {
            Some(Ok(Message::Text(text))) => Ok(Some(Inbound::Data(Bytes::from(text)))),
            Some(Ok(Message::Binary(data))) => Ok(Some(Inbound::Data(Bytes::from(data)))),
            // Pongs to peer pings are queued by the WebSocket layer itself
            Some(Ok(Message::Ping(_))) => Ok(Some(Inbound::Ping)),
            Some(Ok(Message::Pong(_))) => Ok(Some(Inbound::Pong)),
            Some(Ok(Message::Close(frame))) => {
                debug!(reason = ?frame, "Received close frame");
                Ok(None)
            }
            Some(Err(e)) => Err(TransportError::ReceiveFailed(e.to_string())),
            None => {
                debug!("WebSocket stream ended");
                Ok(None)
            }
        }
    }
}

/// Write half of a WebSocket.
pub struct WebSocketSink {
    sink: SplitSink<WebSocket, Message>,
    closed: bool,
}

#[async_trait]
impl FrameSink for WebSocketSink {
    async fn send(&mut self, data: Bytes) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::ConnectionClosed);
        }

        let message = match String::from_utf8(data.to_vec()) {
            Ok(text) => Message::Text(text),
            Err(e) => Message::Binary(e.into_bytes()),
        };

        self.sink
            .send(message)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::ConnectionClosed);
        }

        trace!("Sending ping");
        self.sink
            .send(Message::Ping(Vec::new()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let frame = CloseFrame {
            code: close_code::NORMAL,
            reason: "".into(),
        };
        // The peer may already be gone
        let _ = self.sink.send(Message::Close(Some(frame))).await;

        self.sink
            .close()
            .await
            .map_err(|e| TransportError::SendFailed(format!("Failed to close: {}", e)))
    }
}
