//! Bounded outbound queue for one client.
//!
//! The hub enqueues pre-encoded frames with [`MailboxSender::offer`], which
//! never waits; the client's writer drains them with [`Mailbox::recv`].
//! `MailboxSender` is not `Clone`: the hub's registry entry holds the only
//! sender, so dropping that entry is the one and only way a mailbox closes.
//! A [`Revocation`] taken from the mailbox fires at that moment, even while
//! frames are still queued.

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;

/// Default mailbox capacity in frames.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;

/// Why a frame could not be enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Overflow {
    /// The mailbox is at capacity.
    #[error("Mailbox is full")]
    Full,

    /// The receiving side has gone away.
    #[error("Mailbox is closed")]
    Closed,
}

/// Create a mailbox with the given capacity (at least one frame).
#[must_use]
pub fn mailbox(capacity: usize) -> (MailboxSender, Mailbox) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let (alive, revoked) = oneshot::channel();
    (
        MailboxSender { tx, _alive: alive },
        Mailbox {
            rx,
            revoked: Some(revoked),
        },
    )
}

/// Sending half, owned by the hub.
#[derive(Debug)]
pub struct MailboxSender {
    tx: mpsc::Sender<Bytes>,
    _alive: oneshot::Sender<()>,
}

impl MailboxSender {
    /// Enqueue a frame without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`Overflow::Full`] at capacity and [`Overflow::Closed`] if the
    /// receiver was dropped.
    pub fn offer(&self, frame: Bytes) -> Result<(), Overflow> {
        self.tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => Overflow::Full,
            TrySendError::Closed(_) => Overflow::Closed,
        })
    }

    /// Maximum number of queued frames.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Check if the receiver was dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half, owned by the client's writer.
#[derive(Debug)]
pub struct Mailbox {
    rx: mpsc::Receiver<Bytes>,
    revoked: Option<oneshot::Receiver<()>>,
}

impl Mailbox {
    /// Wait for the next frame.
    ///
    /// Returns `None` once the sender is dropped and every queued frame has
    /// been taken.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Take a frame if one is queued.
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }

    /// Number of queued frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Check if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Check if the sender was dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.rx.is_closed()
    }

    /// Take the signal that fires when the sender is dropped.
    ///
    /// Only the first call gets a live signal; later calls get one that
    /// never fires.
    pub fn revocation(&mut self) -> Revocation {
        Revocation {
            rx: self.revoked.take(),
            fired: false,
        }
    }
}

/// Fires once the hub drops the mailbox sender.
#[derive(Debug)]
pub struct Revocation {
    rx: Option<oneshot::Receiver<()>>,
    fired: bool,
}

impl Revocation {
    /// Check without waiting whether the sender is gone.
    pub fn is_revoked(&mut self) -> bool {
        if !self.fired {
            if let Some(rx) = self.rx.as_mut() {
                self.fired = matches!(rx.try_recv(), Err(oneshot::error::TryRecvError::Closed));
            }
        }
        self.fired
    }

    /// Wait until the mailbox has been closed by its sender.
    pub async fn wait(&mut self) {
        if self.fired {
            return;
        }
        match self.rx.as_mut() {
            Some(rx) => {
                let _ = rx.await;
                self.fired = true;
            }
            None => std::future::pending().await,
        }
    }
}
