//! The per-connection client.
//!
//! A client owns one connection. Its reader runs in the caller's task and
//! turns inbound frames into hub commands; its writer runs in a spawned task
//! and is the only code that ever writes to the connection. Whichever of the
//! two notices the end first unregisters the client; the other finds the
//! work already done.
//!
//! Once the hub drops a client's mailbox sender the reader stops at once,
//! even while the writer is still draining frames already queued.

use crate::traits::{FrameSink, FrameSource, Inbound, TransportError};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tandem_core::{
    mailbox, validate_room_id, ClientId, HubError, HubHandle, Mailbox, Member, MessageStore,
    Revocation, RoomAccess, RoomId, DEFAULT_MAILBOX_CAPACITY,
};
use tandem_protocol::{codec, ClientFrame, ServerFrame};
use tokio::sync::oneshot;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Mailbox capacity in frames.
    pub mailbox_capacity: usize,
    /// How often the writer pings the peer.
    pub ping_interval: Duration,
    /// How long the reader waits for any inbound traffic.
    pub pong_wait: Duration,
    /// Upper bound on a single write.
    pub write_wait: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            ping_interval: Duration::from_secs(54),
            pong_wait: Duration::from_secs(60),
            write_wait: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    /// Check that the heartbeat can keep a healthy peer alive.
    ///
    /// # Errors
    ///
    /// Returns an error message if the settings are inconsistent.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.mailbox_capacity == 0 {
            return Err("Mailbox capacity must be positive");
        }
        if self.ping_interval.is_zero() {
            return Err("Ping interval must be positive");
        }
        if self.ping_interval >= self.pong_wait {
            return Err("Ping interval must be shorter than the liveness timeout");
        }
        Ok(())
    }
}

/// Collaborators a client talks to.
#[derive(Clone)]
pub struct Services {
    /// The connection hub.
    pub hub: HubHandle,
    /// Chat history persistence.
    pub store: Arc<dyn MessageStore>,
    /// Room authorization.
    pub access: Arc<dyn RoomAccess>,
}

/// Why a client stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disconnect {
    /// The peer closed the connection.
    ClosedByPeer,
    /// Reading from the connection failed.
    Transport(String),
    /// Nothing arrived before the liveness deadline.
    LivenessTimeout,
    /// Writing to the connection failed or timed out.
    WriteFailed,
    /// The hub closed the mailbox, usually because it was full.
    Evicted,
    /// The hub is not running.
    HubClosed,
}

impl Disconnect {
    /// Short label for metrics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Disconnect::ClosedByPeer => "closed_by_peer",
            Disconnect::Transport(_) => "transport",
            Disconnect::LivenessTimeout => "liveness_timeout",
            Disconnect::WriteFailed => "write_failed",
            Disconnect::Evicted => "evicted",
            Disconnect::HubClosed => "hub_closed",
        }
    }
}

impl fmt::Display for Disconnect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disconnect::Transport(reason) => write!(f, "transport: {}", reason),
            other => f.write_str(other.label()),
        }
    }
}

/// How the writer ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterExit {
    MailboxClosed,
    WriteFailed,
}

/// Unregisters a client at most once, whichever pump gets there first.
struct Departure {
    hub: HubHandle,
    client: ClientId,
    done: AtomicBool,
}

impl Departure {
    fn new(hub: HubHandle, client: ClientId) -> Self {
        Self {
            hub,
            client,
            done: AtomicBool::new(false),
        }
    }

    fn has_departed(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    async fn depart(&self) {
        if self.done.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.hub.unregister(self.client).await.is_err() {
            debug!(client = %self.client, "Hub already stopped");
        }
    }
}

/// One connection and its pumps.
pub struct Client<R, W> {
    id: ClientId,
    identity: String,
    source: R,
    sink: W,
    services: Services,
    config: ClientConfig,
    initial_rooms: Vec<RoomId>,
}

impl<R, W> Client<R, W>
where
    R: FrameSource,
    W: FrameSink + 'static,
{
    /// Create a client for an authenticated connection.
    #[must_use]
    pub fn new(
        identity: impl Into<String>,
        source: R,
        sink: W,
        services: Services,
        config: ClientConfig,
    ) -> Self {
        Self {
            id: ClientId::next(),
            identity: identity.into(),
            source,
            sink,
            services,
            config,
            initial_rooms: Vec::new(),
        }
    }

    /// Join a room as soon as the client is registered.
    #[must_use]
    pub fn join_on_start(mut self, room: impl Into<RoomId>) -> Self {
        self.initial_rooms.push(room.into());
        self
    }

    /// The connection id.
    #[must_use]
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// The authenticated identity.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Register with the hub and pump until the connection ends.
    pub async fn run(self) -> Disconnect {
        let Client {
            id,
            identity,
            mut source,
            mut sink,
            services,
            config,
            initial_rooms,
        } = self;

        let (sender, mut mailbox) = mailbox(config.mailbox_capacity);
        let mut revocation = mailbox.revocation();
        if services
            .hub
            .register(Member::with_id(id, identity.clone(), sender))
            .await
            .is_err()
        {
            warn!(client = %id, identity = %identity, "Hub unavailable, closing connection");
            let _ = sink.close().await;
            return Disconnect::HubClosed;
        }
        for room in initial_rooms {
            if services.hub.join(room, id).await.is_err() {
                let _ = sink.close().await;
                return Disconnect::HubClosed;
            }
        }

        info!(client = %id, identity = %identity, "Client connected");

        let departure = Arc::new(Departure::new(services.hub.clone(), id));
        let (stop_tx, stop_rx) = oneshot::channel();
        let mut writer = tokio::spawn(write_pump(
            sink,
            mailbox,
            config.clone(),
            Arc::clone(&departure),
            stop_tx,
        ));

        let reader = Reader {
            id,
            identity: &identity,
            services: &services,
            departure: &departure,
            pong_wait: config.pong_wait,
        };
        let reason = reader.run(&mut source, stop_rx, &mut revocation).await;

        departure.depart().await;

        if time::timeout(config.write_wait, &mut writer).await.is_err() {
            debug!(client = %id, "Writer still busy, aborting");
            writer.abort();
        }

        info!(client = %id, identity = %identity, reason = %reason, "Client disconnected");
        reason
    }
}

struct Reader<'a> {
    id: ClientId,
    identity: &'a str,
    services: &'a Services,
    departure: &'a Departure,
    pong_wait: Duration,
}

impl Reader<'_> {
    async fn run<R: FrameSource>(
        &self,
        source: &mut R,
        mut stop: oneshot::Receiver<WriterExit>,
        revocation: &mut Revocation,
    ) -> Disconnect {
        let mut deadline = Instant::now() + self.pong_wait;

        loop {
            let next = tokio::select! {
                biased;

                exit = &mut stop => {
                    return match exit {
                        Ok(WriterExit::WriteFailed) => Disconnect::WriteFailed,
                        Ok(WriterExit::MailboxClosed) | Err(_) => Disconnect::Evicted,
                    };
                }
                () = revocation.wait() => return self.revoked(),
                next = time::timeout_at(deadline, source.recv()) => next,
            };

            let inbound = match next {
                Err(_) => {
                    warn!(
                        client = %self.id,
                        identity = %self.identity,
                        "Liveness deadline elapsed"
                    );
                    return Disconnect::LivenessTimeout;
                }
                Ok(Ok(Some(inbound))) => inbound,
                Ok(Ok(None)) => return Disconnect::ClosedByPeer,
                Ok(Err(e)) => {
                    debug!(client = %self.id, error = %e, "Read failed");
                    return Disconnect::Transport(e.to_string());
                }
            };

            deadline = Instant::now() + self.pong_wait;

            match inbound {
                Inbound::Data(data) => {
                    for frame in codec::frames::<ClientFrame>(&data) {
                        // Nothing may be dispatched once the hub has let go
                        if revocation.is_revoked() {
                            return self.revoked();
                        }
                        match frame {
                            Ok(frame) => {
                                if self.handle(frame).await.is_err() {
                                    return Disconnect::HubClosed;
                                }
                            }
                            Err(e) => {
                                debug!(client = %self.id, error = %e, "Discarding malformed frame");
                            }
                        }
                    }
                }
                Inbound::Ping | Inbound::Pong => {
                    trace!(client = %self.id, "Liveness refreshed");
                }
            }
        }
    }

    /// Why the hub dropped this client's mailbox.
    fn revoked(&self) -> Disconnect {
        if self.services.hub.is_closed() {
            Disconnect::HubClosed
        } else if self.departure.has_departed() {
            // The writer failed and unregistered first
            Disconnect::WriteFailed
        } else {
            debug!(client = %self.id, identity = %self.identity, "Evicted by the hub");
            Disconnect::Evicted
        }
    }

    async fn handle(&self, frame: ClientFrame) -> Result<(), HubError> {
        if let Err(reason) = validate_room_id(frame.room_id()) {
            debug!(client = %self.id, reason, "Discarding frame for invalid room");
            return Ok(());
        }

        match frame {
            ClientFrame::JoinRoom { room_id } => {
                if !self.may_access(&room_id).await {
                    return Ok(());
                }
                self.services.hub.join(room_id, self.id).await
            }
            ClientFrame::LeaveRoom { room_id } => self.services.hub.leave(room_id, self.id).await,
            ClientFrame::Message { room_id, content } => self.post(room_id, &content).await,
        }
    }

    async fn post(&self, room_id: RoomId, content: &str) -> Result<(), HubError> {
        if !self.may_access(&room_id).await {
            return Ok(());
        }

        let message = match self
            .services
            .store
            .save_message(&room_id, self.identity, content)
            .await
        {
            Ok(message) => message,
            Err(e) => {
                warn!(
                    client = %self.id,
                    room = %room_id,
                    error = %e,
                    "Message not saved, dropping"
                );
                return Ok(());
            }
        };

        let payload = match codec::encode(&ServerFrame::ChatMessage(message)) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(client = %self.id, room = %room_id, error = %e, "Failed to encode message");
                return Ok(());
            }
        };

        self.services
            .hub
            .broadcast(room_id, payload, Some(self.identity))
            .await
    }

    async fn may_access(&self, room_id: &str) -> bool {
        let allowed = self
            .services
            .access
            .can_access(self.identity, room_id)
            .await;
        if !allowed {
            debug!(
                client = %self.id,
                identity = %self.identity,
                room = %room_id,
                "Room access denied"
            );
        }
        allowed
    }
}

async fn write_pump<W: FrameSink>(
    mut sink: W,
    mut mailbox: Mailbox,
    config: ClientConfig,
    departure: Arc<Departure>,
    stop: oneshot::Sender<WriterExit>,
) {
    let client = departure.client;
    let mut heartbeat =
        time::interval_at(Instant::now() + config.ping_interval, config.ping_interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let exit = loop {
        tokio::select! {
            frame = mailbox.recv() => {
                let Some(frame) = frame else {
                    debug!(client = %client, "Mailbox closed");
                    break WriterExit::MailboxClosed;
                };
                if let Err(e) = with_deadline(config.write_wait, sink.send(frame)).await {
                    debug!(client = %client, error = %e, "Write failed");
                    break WriterExit::WriteFailed;
                }
            }
            _ = heartbeat.tick() => {
                if let Err(e) = with_deadline(config.write_wait, sink.ping()).await {
                    debug!(client = %client, error = %e, "Ping failed");
                    break WriterExit::WriteFailed;
                }
                trace!(client = %client, "Ping sent");
            }
        }
    };

    if exit == WriterExit::WriteFailed {
        departure.depart().await;
    }
    if let Err(e) = with_deadline(config.write_wait, sink.close()).await {
        trace!(client = %client, error = %e, "Close failed");
    }

    let _ = stop.send(exit);
}

async fn with_deadline<F>(wait: Duration, op: F) -> Result<(), TransportError>
where
    F: Future<Output = Result<(), TransportError>>,
{
    time::timeout(wait, op)
        .await
        .map_err(|_| TransportError::Timeout)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{self, Outbound, Peer};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use tandem_core::{AllowAll, Hub, HubConfig, MemoryStore};
    use tokio::task::JoinHandle;

    fn services() -> Services {
        Services {
            hub: Hub::spawn(HubConfig::default()),
            store: Arc::new(MemoryStore::new()),
            access: Arc::new(AllowAll),
        }
    }

    fn connect(
        services: &Services,
        identity: &str,
        rooms: &[&str],
    ) -> (JoinHandle<Disconnect>, Peer) {
        let (source, sink, peer) = memory::pair();
        let mut client = Client::new(
            identity,
            source,
            sink,
            services.clone(),
            ClientConfig::default(),
        );
        for room in rooms {
            client = client.join_on_start(*room);
        }
        (tokio::spawn(client.run()), peer)
    }

    async fn wait_for_members(hub: &HubHandle, room: &str, expected: &[&str]) {
        let expected: HashSet<String> = expected.iter().map(|s| s.to_string()).collect();
        time::timeout(Duration::from_secs(5), async {
            loop {
                if hub.members_of(room).await.unwrap() == expected {
                    return;
                }
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("room membership never matched");
    }

    async fn next_frame(peer: &mut Peer) -> ServerFrame {
        let data = time::timeout(Duration::from_secs(5), peer.recv_data())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection closed");
        codec::decode(&data).unwrap()
    }

    fn chat(frame: ServerFrame) -> tandem_protocol::ChatMessage {
        match frame {
            ServerFrame::ChatMessage(message) => message,
            other => panic!("Expected chat_message, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_chat_reaches_others_without_echo() {
        let services = services();
        let (_a, mut peer_a) = connect(&services, "A", &["match-42"]);
        let (_b, mut peer_b) = connect(&services, "B", &["match-42"]);
        wait_for_members(&services.hub, "match-42", &["A", "B"]).await;

        peer_a.send_frame(&ClientFrame::message("match-42", "hello"));
        let received = chat(next_frame(&mut peer_b).await);
        assert_eq!(received.sender_id, "A");
        assert_eq!(received.content, "hello");
        assert_eq!(received.room_id, "match-42");

        // A's first delivery is B's reply, not its own message
        peer_b.send_frame(&ClientFrame::message("match-42", "hi A"));
        let reply = chat(next_frame(&mut peer_a).await);
        assert_eq!(reply.sender_id, "B");
        assert_eq!(reply.content, "hi A");

        let history = services.store.recent_messages("match-42", 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, received.id);
    }

    #[tokio::test]
    async fn test_join_and_leave_frames() {
        let services = services();
        let (_c, peer_c) = connect(&services, "C", &[]);

        peer_c.send_text(
            "{\"type\":\"join_room\",\"room_id\":\"X\"}\n{\"type\":\"join_room\",\"room_id\":\"Y\"}",
        );
        wait_for_members(&services.hub, "X", &["C"]).await;
        wait_for_members(&services.hub, "Y", &["C"]).await;

        peer_c.send_frame(&ClientFrame::leave("X"));
        wait_for_members(&services.hub, "X", &[]).await;
        wait_for_members(&services.hub, "Y", &["C"]).await;
    }

    #[tokio::test]
    async fn test_malformed_frames_are_ignored() {
        let services = services();
        let (a, peer_a) = connect(&services, "A", &["r"]);
        let (_b, mut peer_b) = connect(&services, "B", &["r"]);
        wait_for_members(&services.hub, "r", &["A", "B"]).await;

        peer_a.send_text("not json");
        peer_a.send_text("{\"type\":\"dance\",\"room_id\":\"r\"}");
        peer_a.send_frame(&ClientFrame::join("$reserved"));
        peer_a.send_frame(&ClientFrame::message("r", "still here"));

        let received = chat(next_frame(&mut peer_b).await);
        assert_eq!(received.content, "still here");
        assert!(!a.is_finished());
        wait_for_members(&services.hub, "$reserved", &[]).await;
    }

    #[tokio::test]
    async fn test_transport_failure_leaves_every_room() {
        let services = services();
        let (d, mut peer_d) = connect(&services, "D", &["X", "Y"]);
        let (_e, _peer_e) = connect(&services, "E", &["X"]);
        wait_for_members(&services.hub, "X", &["D", "E"]).await;
        wait_for_members(&services.hub, "Y", &["D"]).await;

        peer_d.fail("connection reset");
        let reason = d.await.unwrap();
        assert!(matches!(reason, Disconnect::Transport(_)));

        assert_eq!(
            services.hub.members_of("X").await.unwrap(),
            HashSet::from(["E".to_string()])
        );
        assert!(services.hub.members_of("Y").await.unwrap().is_empty());
        assert!(peer_d.drain().contains(&Outbound::Close));
    }

    #[tokio::test]
    async fn test_peer_hang_up() {
        let services = services();
        let (a, mut peer_a) = connect(&services, "A", &["r"]);
        wait_for_members(&services.hub, "r", &["A"]).await;

        peer_a.hang_up();
        assert_eq!(a.await.unwrap(), Disconnect::ClosedByPeer);
        assert!(services.hub.members_of("r").await.unwrap().is_empty());
        assert_eq!(services.hub.stats().await.unwrap().clients, 0);
    }

    #[tokio::test]
    async fn test_write_failure_unregisters() {
        let services = services();
        let (a, mut peer_a) = connect(&services, "A", &["r"]);
        let (_b, peer_b) = connect(&services, "B", &["r"]);
        wait_for_members(&services.hub, "r", &["A", "B"]).await;

        peer_a.stop_reading();
        peer_b.send_frame(&ClientFrame::message("r", "ping?"));

        assert_eq!(a.await.unwrap(), Disconnect::WriteFailed);
        wait_for_members(&services.hub, "r", &["B"]).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_peer_times_out() {
        let services = services();
        let (a, mut peer_a) = connect(&services, "A", &["r"]);
        wait_for_members(&services.hub, "r", &["A"]).await;

        assert_eq!(a.await.unwrap(), Disconnect::LivenessTimeout);
        assert!(services.hub.members_of("r").await.unwrap().is_empty());

        let written = peer_a.drain();
        assert!(written.contains(&Outbound::Ping));
        assert_eq!(written.last(), Some(&Outbound::Close));
    }

    #[tokio::test(start_paused = true)]
    async fn test_answering_peer_stays_alive() {
        let services = services();
        let (a, mut peer_a) = connect(&services, "A", &["r"]);
        wait_for_members(&services.hub, "r", &["A"]).await;

        let responder = tokio::spawn(async move {
            let mut pings = 0;
            while let Some(item) = peer_a.recv().await {
                if item == Outbound::Ping {
                    pings += 1;
                    peer_a.pong();
                }
            }
            pings
        });

        time::sleep(Duration::from_secs(300)).await;
        assert!(!a.is_finished());
        assert_eq!(
            services.hub.members_of("r").await.unwrap(),
            HashSet::from(["A".to_string()])
        );

        // Dropping the peer ends the connection
        responder.abort();
        assert_eq!(a.await.unwrap(), Disconnect::ClosedByPeer);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flooded_client_is_evicted() {
        let services = services();

        let (source, sink, mut peer_c) = memory::pair_with_capacity(1);
        let config = ClientConfig {
            mailbox_capacity: 4,
            ..ClientConfig::default()
        };
        let slow = tokio::spawn(
            Client::new("C", source, sink, services.clone(), config)
                .join_on_start("flood")
                .run(),
        );
        let (_b, mut peer_b) = connect(&services, "B", &["flood"]);
        wait_for_members(&services.hub, "flood", &["B", "C"]).await;

        for i in 0..20 {
            services
                .hub
                .broadcast("flood", format!("{{\"n\":{i}}}"), None)
                .await
                .unwrap();
        }
        wait_for_members(&services.hub, "flood", &["B"]).await;
        assert_eq!(services.hub.stats().await.unwrap().evictions, 1);

        // The healthy member got everything, and keeps getting more
        services.hub.broadcast("flood", "{}", None).await.unwrap();
        for _ in 0..21 {
            assert!(peer_b.recv_data().await.is_some());
        }

        assert_eq!(slow.await.unwrap(), Disconnect::Evicted);
        while peer_c.recv().await.is_some() {}
    }

    #[tokio::test(start_paused = true)]
    async fn test_evicted_client_cannot_post() {
        let services = services();

        let (source, sink, peer_c) = memory::pair_with_capacity(1);
        let config = ClientConfig {
            mailbox_capacity: 2,
            ..ClientConfig::default()
        };
        let slow = tokio::spawn(
            Client::new("C", source, sink, services.clone(), config)
                .join_on_start("flood")
                .run(),
        );
        let (_b, mut peer_b) = connect(&services, "B", &["flood"]);
        wait_for_members(&services.hub, "flood", &["B", "C"]).await;

        for i in 0..10 {
            services
                .hub
                .broadcast("flood", format!("{{\"n\":{i}}}"), None)
                .await
                .unwrap();
        }
        wait_for_members(&services.hub, "flood", &["B"]).await;

        peer_c.send_frame(&ClientFrame::message("flood", "ghost"));
        assert_eq!(slow.await.unwrap(), Disconnect::Evicted);

        assert!(services
            .store
            .recent_messages("flood", 10)
            .await
            .unwrap()
            .is_empty());

        // Anything C managed to broadcast would arrive before the marker
        services.hub.broadcast("flood", "marker", None).await.unwrap();
        loop {
            let data = peer_b.recv_data().await.unwrap();
            if data.as_ref() == b"marker" {
                break;
            }
            assert!(!String::from_utf8_lossy(&data).contains("ghost"));
        }
    }

    #[tokio::test]
    async fn test_denied_room_is_not_joined() {
        struct PublicOnly;

        #[async_trait]
        impl RoomAccess for PublicOnly {
            async fn can_access(&self, _identity: &str, room_id: &str) -> bool {
                room_id.starts_with("public")
            }
        }

        let services = Services {
            access: Arc::new(PublicOnly),
            ..services()
        };
        let (_a, peer_a) = connect(&services, "A", &[]);

        peer_a.send_frame(&ClientFrame::join("private"));
        peer_a.send_frame(&ClientFrame::message("private", "sneaky"));
        peer_a.send_frame(&ClientFrame::join("public-1"));
        wait_for_members(&services.hub, "public-1", &["A"]).await;

        assert!(services.hub.members_of("private").await.unwrap().is_empty());
        assert!(services
            .store
            .recent_messages("private", 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_unsaved_message_is_not_broadcast() {
        let services = Services {
            store: Arc::new(MemoryStore::with_limits(10, 5)),
            ..services()
        };
        let (_a, peer_a) = connect(&services, "A", &["r"]);
        let (_b, mut peer_b) = connect(&services, "B", &["r"]);
        wait_for_members(&services.hub, "r", &["A", "B"]).await;

        peer_a.send_frame(&ClientFrame::message("r", "far too long"));
        peer_a.send_frame(&ClientFrame::message("r", "ok"));

        assert_eq!(chat(next_frame(&mut peer_b).await).content, "ok");
    }

    #[tokio::test]
    async fn test_stopped_hub_refuses_client() {
        let (hub, handle) = Hub::new(HubConfig::default());
        drop(hub);
        let services = Services {
            hub: handle,
            ..services()
        };

        let (_task, mut peer) = connect(&services, "A", &["r"]);
        assert_eq!(peer.recv().await, Some(Outbound::Close));
    }

    #[test]
    fn test_config_validation() {
        assert!(ClientConfig::default().validate().is_ok());

        let config = ClientConfig {
            ping_interval: Duration::from_secs(60),
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ClientConfig {
            mailbox_capacity: 0,
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_disconnect_labels() {
        assert_eq!(Disconnect::LivenessTimeout.label(), "liveness_timeout");
        assert_eq!(
            Disconnect::Transport("reset".into()).to_string(),
            "transport: reset"
        );
    }
}
