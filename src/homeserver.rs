//! In-memory homeserver used by the binary.
//!
//! Implements `RoomService` against a `RoomDirectory` so the client can run
//! without any network. It behaves like a real server in the ways the
//! create-room dialog cares about: it rejects malformed or taken aliases with
//! the server's own error strings, it answers after a simulated latency, and
//! it announces new rooms through the directory *after* the create call has
//! already returned, the way a sync response would.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::Rng;
use rand::distr::Alphanumeric;
use tokio::time::{Duration, sleep};

use crate::service::{
    CreateRoomRequest, DEFAULT_CREATOR_POWER_LEVEL, RoomDirectory, RoomId, RoomService,
    RoomSummary, ServiceError,
};

/// A single-user, single-process stand-in for a homeserver.
#[derive(Debug, Clone)]
pub struct LocalHomeserver {
    server_name: String,
    directory: RoomDirectory,
    /// Full aliases of every accepted room, including ones not yet announced.
    claimed: Arc<Mutex<HashSet<String>>>,
    /// Delay before each answer and before a created room is announced.
    latency: Duration,
}

impl LocalHomeserver {
    pub fn new(
        server_name: impl Into<String>,
        directory: RoomDirectory,
        latency: Duration,
    ) -> Self {
        Self {
            server_name: server_name.into(),
            directory,
            claimed: Arc::default(),
            latency,
        }
    }

    fn is_taken(&self, claimed: &HashSet<String>, alias: &str) -> bool {
        claimed.contains(alias) || self.directory.contains_alias(alias)
    }

    fn new_room_id(&self) -> RoomId {
        // `sample_iter(Alphanumeric)` yields random ASCII letters/digits as
        // `u8`s; `char::from` turns each into a char for `collect::<String>()`.
        let local: String = rand::rng()
            .sample_iter(Alphanumeric)
            .take(18)
            .map(char::from)
            .collect();
        RoomId::new(format!("!{local}:{}", self.server_name))
    }
}

/// Alias localparts may not contain whitespace or the server separator.
fn has_invalid_alias_characters(localpart: &str) -> bool {
    localpart.chars().any(|c| c.is_whitespace() || c == ':')
}

#[async_trait]
impl RoomService for LocalHomeserver {
    async fn create_room(&self, request: CreateRoomRequest) -> Result<(), ServiceError> {
        sleep(self.latency).await;

        let alias = match &request.alias {
            Some(localpart) => {
                if has_invalid_alias_characters(localpart) {
                    return Err(ServiceError::new(
                        "M_UNKNOWN",
                        "Invalid characters in room alias",
                    ));
                }
                let full = format!("#{localpart}:{}", self.server_name);
                // Check and claim under one lock so two creates racing for
                // the same alias can't both win.
                let mut claimed = self
                    .claimed
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                if self.is_taken(&claimed, &full) {
                    return Err(ServiceError::new("M_ROOM_IN_USE", "Room alias already taken"));
                }
                claimed.insert(full.clone());
                Some(full)
            }
            None => None,
        };

        let room = RoomSummary {
            id: self.new_room_id(),
            name: request.name,
            topic: request.topic,
            alias,
            is_public: request.is_public,
            is_encrypted: request.is_encrypted,
            creator_power_level: request
                .power_level_override
                .unwrap_or(DEFAULT_CREATOR_POWER_LEVEL),
            messages: Vec::new(),
        };
        tracing::info!(room_id = %room.id, alias = ?room.alias, "room created");

        // Announce the room on a later "sync", independent of this call.
        let directory = self.directory.clone();
        let latency = self.latency;
        tokio::spawn(async move {
            sleep(latency).await;
            directory.insert(room);
        });
        Ok(())
    }

    async fn is_alias_available(&self, alias: &str) -> Result<bool, ServiceError> {
        sleep(self.latency).await;
        let claimed = self
            .claimed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(!self.is_taken(&claimed, alias))
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, alias: Option<&str>) -> CreateRoomRequest {
        CreateRoomRequest {
            name: name.into(),
            topic: None,
            is_public: alias.is_some(),
            alias: alias.map(str::to_string),
            is_encrypted: alias.is_none(),
            power_level_override: None,
        }
    }

    fn server() -> (LocalHomeserver, RoomDirectory) {
        let directory = RoomDirectory::new();
        let hs = LocalHomeserver::new("localhost", directory.clone(), Duration::from_millis(100));
        (hs, directory)
    }

    #[test]
    fn alias_character_rules() {
        assert!(!has_invalid_alias_characters("my_room-1"));
        assert!(has_invalid_alias_characters("my room"));
        assert!(has_invalid_alias_characters("a:b"));
    }

    #[tokio::test(start_paused = true)]
    async fn created_room_is_announced_after_the_call_returns() {
        let (hs, directory) = server();
        let mut created = directory.subscribe();

        hs.create_room(request("Lobby", Some("lobby"))).await.unwrap();
        // The call has returned but the room isn't in the directory yet.
        assert!(directory.rooms().is_empty());

        let id = created.recv().await;
        let room = directory.get(&id).unwrap();
        assert_eq!(room.name, "Lobby");
        assert_eq!(room.alias.as_deref(), Some("#lobby:localhost"));
        assert_eq!(room.creator_power_level, DEFAULT_CREATOR_POWER_LEVEL);
        assert!(id.as_str().ends_with(":localhost"));
    }

    #[tokio::test(start_paused = true)]
    async fn taken_alias_is_rejected() {
        let (hs, directory) = server();
        let mut created = directory.subscribe();
        hs.create_room(request("One", Some("lobby"))).await.unwrap();
        created.recv().await;

        assert!(!hs.is_alias_available("#lobby:localhost").await.unwrap());
        let err = hs.create_room(request("Two", Some("lobby"))).await.unwrap_err();
        assert_eq!(err.to_string(), crate::error::ALIAS_IN_USE);
    }

    #[tokio::test(start_paused = true)]
    async fn alias_is_reserved_before_the_room_is_announced() {
        let (hs, directory) = server();
        hs.create_room(request("One", Some("lobby"))).await.unwrap();
        assert!(directory.rooms().is_empty());

        assert!(!hs.is_alias_available("#lobby:localhost").await.unwrap());
        let err = hs.create_room(request("Two", Some("lobby"))).await.unwrap_err();
        assert_eq!(err.to_string(), crate::error::ALIAS_IN_USE);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_creates_for_one_alias_have_one_winner() {
        let (hs, _) = server();
        let (first, second) = tokio::join!(
            hs.create_room(request("One", Some("lobby"))),
            hs.create_room(request("Two", Some("lobby"))),
        );
        assert_eq!([first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_alias_is_rejected() {
        let (hs, _) = server();
        let err = hs
            .create_room(request("Bad", Some("no spaces")))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), crate::error::INVALID_ALIAS_CHARACTERS);
    }

    #[tokio::test(start_paused = true)]
    async fn power_level_override_is_applied() {
        let (hs, directory) = server();
        let mut created = directory.subscribe();
        let mut req = request("Mine", None);
        req.power_level_override = Some(101);
        hs.create_room(req).await.unwrap();
        let room = directory.get(&created.recv().await).unwrap();
        assert_eq!(room.creator_power_level, 101);
        assert!(room.alias.is_none());
    }
}
