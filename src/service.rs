//! The boundary to the remote room service.
//!
//! Everything the create-room workflow needs from "the server" lives behind
//! the `RoomService` trait: creating a room and asking whether an alias is
//! free. The `RoomDirectory` is the client-side room list. The shell reads
//! it to draw the sidebar, and it broadcasts a notification every time a room
//! appears so an open dialog can finish up.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

/// Power level the service gives a room creator when no override is sent.
pub const DEFAULT_CREATOR_POWER_LEVEL: i64 = 100;

/// Opaque room identifier (`!abc123:server`).
///
/// A newtype rather than a bare `String` so a room ID can't be confused with
/// an alias or a display name at a call site.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything the service needs to create a room.
///
/// `Option` fields are *absent* from the request when `None`; the service
/// applies its own default (no topic, no alias, default power level).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoomRequest {
    pub name: String,
    pub topic: Option<String>,
    pub is_public: bool,
    /// The alias localpart (`my_room`, not `#my_room:server`).
    pub alias: Option<String>,
    pub is_encrypted: bool,
    pub power_level_override: Option<i64>,
}

/// An error reported by the room service.
///
/// The service speaks in `errcode: message` pairs; `Display` renders them the
/// same way, which is the string the create-room workflow classifies on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{errcode}: {message}")]
pub struct ServiceError {
    pub errcode: String,
    pub message: String,
}

impl ServiceError {
    pub fn new(errcode: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            errcode: errcode.into(),
            message: message.into(),
        }
    }
}

/// The remote operations the create-room workflow depends on.
///
/// `#[async_trait]` rewrites the `async fn`s into methods returning boxed
/// futures, which keeps the trait object-safe: the dialog stores an
/// `Arc<dyn RoomService>` and clones it into each background task.
#[async_trait]
pub trait RoomService: Send + Sync {
    /// Ask the service to create a room. Success only means the request was
    /// accepted; the room shows up later through `RoomDirectory`.
    async fn create_room(&self, request: CreateRoomRequest) -> Result<(), ServiceError>;

    /// Whether a full alias (`#name:server`) is free to claim.
    async fn is_alias_available(&self, alias: &str) -> Result<bool, ServiceError>;
}

// ── Room directory ───────────────────────────────────────────────────────────

/// What the client knows about a joined room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSummary {
    pub id: RoomId,
    pub name: String,
    pub topic: Option<String>,
    /// Full alias (`#name:server`), if the room has one.
    pub alias: Option<String>,
    pub is_public: bool,
    pub is_encrypted: bool,
    pub creator_power_level: i64,
    pub messages: Vec<String>,
}

/// Shared room list plus a "room created" broadcast.
///
/// Cloning is cheap: both halves are reference-counted, so the homeserver,
/// the shell and every open dialog can hold their own handle.
#[derive(Debug, Clone)]
pub struct RoomDirectory {
    rooms: Arc<RwLock<BTreeMap<RoomId, RoomSummary>>>,
    created: broadcast::Sender<RoomId>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        let (created, _) = broadcast::channel(16);
        Self {
            rooms: Arc::default(),
            created,
        }
    }

    /// Add a room and notify every subscriber.
    pub fn insert(&self, room: RoomSummary) {
        let id = room.id.clone();
        self.rooms
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id.clone(), room);
        // `send` only fails when nobody is subscribed, which is fine.
        let _ = self.created.send(id);
    }

    pub fn get(&self, id: &RoomId) -> Option<RoomSummary> {
        self.read().get(id).cloned()
    }

    /// All rooms, ordered by ID.
    pub fn rooms(&self) -> Vec<RoomSummary> {
        self.read().values().cloned().collect()
    }

    pub fn contains_alias(&self, alias: &str) -> bool {
        self.read()
            .values()
            .any(|room| room.alias.as_deref() == Some(alias))
    }

    /// Append a message to a room's timeline. Returns `false` if the room is
    /// unknown.
    pub fn push_message(&self, id: &RoomId, text: String) -> bool {
        let mut rooms = self
            .rooms
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match rooms.get_mut(id) {
            Some(room) => {
                room.messages.push(text);
                true
            }
            None => false,
        }
    }

    /// Start receiving "room created" notifications. Every creation is
    /// delivered, no filtering; dropping the subscription unsubscribes.
    pub fn subscribe(&self) -> RoomCreatedSubscription {
        RoomCreatedSubscription(self.created.subscribe())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<RoomId, RoomSummary>> {
        self.rooms
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A scoped listener for "room created" notifications.
///
/// The listener lives exactly as long as this value. There is no separate
/// unregister call to forget.
#[derive(Debug)]
pub struct RoomCreatedSubscription(broadcast::Receiver<RoomId>);

impl RoomCreatedSubscription {
    /// Wait for the next created room. Never resolves once the directory is
    /// gone.
    pub async fn recv(&mut self) -> RoomId {
        loop {
            match self.0.recv().await {
                Ok(id) => return id,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "room created subscription lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    std::future::pending::<()>().await;
                }
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn room(id: &str, alias: Option<&str>) -> RoomSummary {
        RoomSummary {
            id: RoomId::new(id),
            name: "General".into(),
            topic: None,
            alias: alias.map(str::to_string),
            is_public: alias.is_some(),
            is_encrypted: true,
            creator_power_level: DEFAULT_CREATOR_POWER_LEVEL,
            messages: Vec::new(),
        }
    }

    #[test]
    fn service_error_display_is_errcode_and_message() {
        let err = ServiceError::new("M_ROOM_IN_USE", "Room alias already taken");
        assert_eq!(err.to_string(), "M_ROOM_IN_USE: Room alias already taken");
    }

    #[test]
    fn directory_tracks_aliases() {
        let dir = RoomDirectory::new();
        dir.insert(room("!a:localhost", Some("#lobby:localhost")));
        assert!(dir.contains_alias("#lobby:localhost"));
        assert!(!dir.contains_alias("#other:localhost"));
        assert_eq!(dir.rooms().len(), 1);
    }

    #[test]
    fn push_message_to_unknown_room_fails() {
        let dir = RoomDirectory::new();
        assert!(!dir.push_message(&RoomId::new("!missing:localhost"), "hi".into()));
        dir.insert(room("!a:localhost", None));
        assert!(dir.push_message(&RoomId::new("!a:localhost"), "hi".into()));
        assert_eq!(dir.get(&RoomId::new("!a:localhost")).unwrap().messages, ["hi"]);
    }

    #[tokio::test]
    async fn subscribers_see_every_created_room() {
        let dir = RoomDirectory::new();
        let mut first = dir.subscribe();
        let mut second = dir.subscribe();
        dir.insert(room("!a:localhost", None));
        assert_eq!(first.recv().await, RoomId::new("!a:localhost"));
        assert_eq!(second.recv().await, RoomId::new("!a:localhost"));
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let dir = RoomDirectory::new();
        let sub = dir.subscribe();
        assert_eq!(dir.created.receiver_count(), 1);
        drop(sub);
        assert_eq!(dir.created.receiver_count(), 0);
    }
}
