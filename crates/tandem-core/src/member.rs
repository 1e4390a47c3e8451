//! Client identifiers and the hub-side registration record.

use crate::mailbox::MailboxSender;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for process-unique client ids.
static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one connection instance.
///
/// Several clients may share an identity (one user on several devices);
/// the id is what tells them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    /// Allocate a fresh id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric value.
    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// What the hub stores for a registered client.
///
/// The member owns the only sending half of the client's mailbox, so
/// dropping it is what closes the mailbox.
#[derive(Debug)]
pub struct Member {
    /// Connection id.
    pub id: ClientId,
    /// Authenticated identity.
    pub identity: String,
    /// Sending half of the client's mailbox.
    pub mailbox: MailboxSender,
}

impl Member {
    /// Create a member with a freshly allocated id.
    #[must_use]
    pub fn new(identity: impl Into<String>, mailbox: MailboxSender) -> Self {
        Self::with_id(ClientId::next(), identity, mailbox)
    }

    /// Create a member with a known id.
    #[must_use]
    pub fn with_id(id: ClientId, identity: impl Into<String>, mailbox: MailboxSender) -> Self {
        Self {
            id,
            identity: identity.into(),
            mailbox,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::mailbox;

    #[test]
    fn test_unique_client_ids() {
        let id1 = ClientId::next();
        let id2 = ClientId::next();
        assert_ne!(id1, id2);
        assert!(id2 > id1);
        assert!(id1.to_string().starts_with("client-"));
    }

    #[test]
    fn test_members_share_identity() {
        let (tx1, _rx1) = mailbox(4);
        let (tx2, _rx2) = mailbox(4);
        let phone = Member::new("alice", tx1);
        let laptop = Member::new("alice", tx2);

        assert_eq!(phone.identity, laptop.identity);
        assert_ne!(phone.id, laptop.id);
    }
}
