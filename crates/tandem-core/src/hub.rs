//! The connection hub.
//!
//! One task owns the client registry and the room table. Every change
//! arrives as a [`Command`] on a bounded queue and is applied in the order
//! it was dequeued, so neither table needs a lock.

use crate::mailbox::Overflow;
use crate::member::{ClientId, Member};
use crate::room::{Room, RoomId};
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

/// Hub errors, as seen by a [`HubHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HubError {
    /// The hub task is no longer running.
    #[error("Hub is not running")]
    Closed,
}

/// Hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Capacity of the command queue.
    pub command_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            command_capacity: 1024,
        }
    }
}

/// A command for the hub.
#[derive(Debug)]
pub enum Command {
    /// Add a client to the registry.
    Register(Member),
    /// Remove a client from the registry and every room, closing its mailbox.
    Unregister(ClientId),
    /// Add a registered client to a room.
    Join { room: RoomId, client: ClientId },
    /// Remove a client from a room.
    Leave { room: RoomId, client: ClientId },
    /// Enqueue a frame for every room member except those with the
    /// excluded identity.
    Broadcast {
        room: RoomId,
        payload: Bytes,
        exclude: Option<String>,
    },
    /// Identities currently in a room.
    MembersOf {
        room: RoomId,
        reply: oneshot::Sender<HashSet<String>>,
    },
    /// Registry counters.
    Stats { reply: oneshot::Sender<HubStats> },
}

/// Hub statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Number of registered clients.
    pub clients: usize,
    /// Number of non-empty rooms.
    pub rooms: usize,
    /// Total room memberships.
    pub memberships: usize,
    /// Clients evicted because their mailbox was full.
    pub evictions: u64,
    /// Frames enqueued by broadcasts.
    pub delivered: u64,
}

/// Registry entry for one client.
struct Entry {
    member: Member,
    rooms: HashSet<RoomId>,
}

/// The hub state machine.
///
/// Use [`Hub::run`] (or [`Hub::spawn`]) to drive it from its command queue,
/// or [`Hub::apply`] to step it directly.
pub struct Hub {
    commands: mpsc::Receiver<Command>,
    clients: HashMap<ClientId, Entry>,
    rooms: HashMap<RoomId, Room>,
    evictions: u64,
    delivered: u64,
}

impl Hub {
    /// Create a hub and the handle used to reach it.
    #[must_use]
    pub fn new(config: HubConfig) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::channel(config.command_capacity.max(1));
        let hub = Self {
            commands: rx,
            clients: HashMap::new(),
            rooms: HashMap::new(),
            evictions: 0,
            delivered: 0,
        };
        (hub, HubHandle { commands: tx })
    }

    /// Create a hub and run it on the current tokio runtime.
    #[must_use]
    pub fn spawn(config: HubConfig) -> HubHandle {
        let (hub, handle) = Self::new(config);
        tokio::spawn(hub.run());
        handle
    }

    /// Apply commands until every handle has been dropped.
    ///
    /// Dropping the hub afterwards closes every remaining mailbox.
    pub async fn run(mut self) {
        info!("Hub started");
        while let Some(command) = self.commands.recv().await {
            self.apply(command);
        }
        info!(clients = self.clients.len(), "Hub stopped");
    }

    /// Apply one command.
    pub fn apply(&mut self, command: Command) {
        match command {
            Command::Register(member) => self.register(member),
            Command::Unregister(client) => {
                self.unregister(client);
            }
            Command::Join { room, client } => self.join(room, client),
            Command::Leave { room, client } => self.leave(&room, client),
            Command::Broadcast {
                room,
                payload,
                exclude,
            } => {
                self.broadcast(&room, &payload, exclude.as_deref());
            }
            Command::MembersOf { room, reply } => {
                let _ = reply.send(self.members_of(&room));
            }
            Command::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
        }
    }

    fn register(&mut self, member: Member) {
        if self.clients.contains_key(&member.id) {
            trace!(client = %member.id, "Already registered");
            return;
        }

        let id = member.id;
        info!(
            client = %id,
            identity = %member.identity,
            total_clients = self.clients.len() + 1,
            "Client registered"
        );
        self.clients.insert(
            id,
            Entry {
                member,
                rooms: HashSet::new(),
            },
        );
    }

    /// Returns `true` if the client was registered.
    fn unregister(&mut self, client: ClientId) -> bool {
        let Some(entry) = self.clients.remove(&client) else {
            trace!(client = %client, "Unregister for unknown client");
            return false;
        };

        for room in &entry.rooms {
            self.detach(room, client);
        }

        info!(
            client = %client,
            identity = %entry.member.identity,
            rooms = entry.rooms.len(),
            total_clients = self.clients.len(),
            "Client unregistered"
        );

        // Dropping the entry drops the only mailbox sender.
        drop(entry);
        true
    }

    fn join(&mut self, room: RoomId, client: ClientId) {
        let Some(entry) = self.clients.get_mut(&client) else {
            warn!(client = %client, room = %room, "Join from unregistered client ignored");
            return;
        };
        if !entry.rooms.insert(room.clone()) {
            return;
        }

        let members = self.rooms.entry(room.clone()).or_insert_with(|| {
            debug!(room = %room, "Creating room");
            Room::new()
        });
        members.insert(client);

        debug!(
            room = %room,
            client = %client,
            members = members.len(),
            "Joined room"
        );
    }

    fn leave(&mut self, room: &str, client: ClientId) {
        let Some(entry) = self.clients.get_mut(&client) else {
            return;
        };
        if !entry.rooms.remove(room) {
            return;
        }

        self.detach(room, client);
        debug!(room = %room, client = %client, "Left room");
    }

    /// Remove a client from a room's member set, deleting the room when empty.
    fn detach(&mut self, room: &str, client: ClientId) {
        if let Some(members) = self.rooms.get_mut(room) {
            members.remove(client);
            if members.is_empty() {
                self.rooms.remove(room);
                debug!(room = %room, "Deleted empty room");
            }
        }
    }

    /// Returns the number of mailboxes the payload was enqueued to.
    fn broadcast(&mut self, room: &str, payload: &Bytes, exclude: Option<&str>) -> usize {
        let Some(members) = self.rooms.get(room) else {
            trace!(room = %room, "Broadcast to empty room");
            return 0;
        };

        let mut delivered = 0;
        let mut full = Vec::new();
        let mut gone = Vec::new();

        for client in members.iter() {
            let Some(entry) = self.clients.get(&client) else {
                continue;
            };
            if exclude.is_some_and(|identity| identity == entry.member.identity) {
                continue;
            }

            match entry.member.mailbox.offer(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(Overflow::Full) => {
                    warn!(
                        client = %client,
                        identity = %entry.member.identity,
                        room = %room,
                        "Mailbox full, evicting client"
                    );
                    full.push(client);
                }
                Err(Overflow::Closed) => {
                    debug!(client = %client, room = %room, "Mailbox closed, dropping client");
                    gone.push(client);
                }
            }
        }

        for client in full {
            if self.unregister(client) {
                self.evictions += 1;
            }
        }
        for client in gone {
            self.unregister(client);
        }

        self.delivered += delivered as u64;
        trace!(room = %room, recipients = delivered, "Broadcast");
        delivered
    }

    /// Identities currently joined to a room.
    #[must_use]
    pub fn members_of(&self, room: &str) -> HashSet<String> {
        self.rooms
            .get(room)
            .map(|members| {
                members
                    .iter()
                    .filter_map(|client| self.clients.get(&client))
                    .map(|entry| entry.member.identity.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Check if a client is registered.
    #[must_use]
    pub fn is_registered(&self, client: ClientId) -> bool {
        self.clients.contains_key(&client)
    }

    /// Rooms a client has joined.
    #[must_use]
    pub fn rooms_of(&self, client: ClientId) -> Vec<RoomId> {
        self.clients
            .get(&client)
            .map(|entry| entry.rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Check if a room exists (has at least one member).
    #[must_use]
    pub fn room_exists(&self, room: &str) -> bool {
        self.rooms.contains_key(room)
    }

    /// Get hub statistics.
    #[must_use]
    pub fn stats(&self) -> HubStats {
        HubStats {
            clients: self.clients.len(),
            rooms: self.rooms.len(),
            memberships: self.rooms.values().map(Room::len).sum(),
            evictions: self.evictions,
            delivered: self.delivered,
        }
    }
}

/// Cloneable handle for sending commands to a running hub.
#[derive(Debug, Clone)]
pub struct HubHandle {
    commands: mpsc::Sender<Command>,
}

impl HubHandle {
    /// Queue a command.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub has stopped.
    pub async fn send(&self, command: Command) -> Result<(), HubError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| HubError::Closed)
    }

    /// Register a client.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub has stopped.
    pub async fn register(&self, member: Member) -> Result<(), HubError> {
        self.send(Command::Register(member)).await
    }

    /// Unregister a client. Safe to call more than once.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub has stopped.
    pub async fn unregister(&self, client: ClientId) -> Result<(), HubError> {
        self.send(Command::Unregister(client)).await
    }

    /// Join a client to a room.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub has stopped.
    pub async fn join(&self, room: impl Into<RoomId>, client: ClientId) -> Result<(), HubError> {
        self.send(Command::Join {
            room: room.into(),
            client,
        })
        .await
    }

    /// Remove a client from a room.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub has stopped.
    pub async fn leave(&self, room: impl Into<RoomId>, client: ClientId) -> Result<(), HubError> {
        self.send(Command::Leave {
            room: room.into(),
            client,
        })
        .await
    }

    /// Broadcast a pre-encoded frame to a room.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub has stopped.
    pub async fn broadcast(
        &self,
        room: impl Into<RoomId>,
        payload: impl Into<Bytes>,
        exclude: Option<&str>,
    ) -> Result<(), HubError> {
        self.send(Command::Broadcast {
            room: room.into(),
            payload: payload.into(),
            exclude: exclude.map(str::to_string),
        })
        .await
    }

    /// Identities currently in a room.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub has stopped.
    pub async fn members_of(&self, room: impl Into<RoomId>) -> Result<HashSet<String>, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::MembersOf {
            room: room.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| HubError::Closed)
    }

    /// Hub statistics.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub has stopped.
    pub async fn stats(&self) -> Result<HubStats, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stats { reply }).await?;
        rx.await.map_err(|_| HubError::Closed)
    }

    /// Check if the hub has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}
