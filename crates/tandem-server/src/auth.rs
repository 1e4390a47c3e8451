//! Static token authentication and room access.

use crate::config::AuthConfig;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tandem_core::RoomAccess;

/// Authenticator backed by the `[auth]` config section.
#[derive(Debug, Default)]
pub struct StaticAuth {
    tokens: HashMap<String, String>,
    rooms: HashMap<String, HashSet<String>>,
    open_rooms: bool,
}

impl StaticAuth {
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        let tokens = config
            .users
            .iter()
            .map(|user| (user.token.clone(), user.id.clone()))
            .collect();
        let rooms = config
            .rooms
            .iter()
            .map(|room| (room.id.clone(), room.members.iter().cloned().collect()))
            .collect();

        Self {
            tokens,
            rooms,
            open_rooms: config.open_rooms,
        }
    }

    /// Resolve a bearer token to an identity.
    #[must_use]
    pub fn authenticate(&self, token: &str) -> Option<&str> {
        self.tokens.get(token).map(String::as_str)
    }

    fn is_participant(&self, identity: &str, room_id: &str) -> bool {
        match self.rooms.get(room_id) {
            Some(members) => members.contains(identity),
            None => self.open_rooms,
        }
    }
}

#[async_trait]
impl RoomAccess for StaticAuth {
    async fn can_access(&self, identity: &str, room_id: &str) -> bool {
        self.is_participant(identity, room_id)
    }
}
