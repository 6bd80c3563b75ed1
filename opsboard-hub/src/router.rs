//! Connection manager: live connections and their room memberships.
//!
//! Each WebSocket connection gets a [`ConnectionId`] and an outbound
//! channel. Clients subscribe to rooms explicitly; nothing is auto-joined.
//! Broadcasts reach every live connection, room sends reach only that
//! room's members. Delivery is fire-and-forget: a closed channel drops the
//! connection and nothing is queued for absent recipients.
//!
//! State lives only as long as the process and is rebuilt as clients
//! reconnect and replay their subscriptions.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::Message;
use opsboard::dispatch::{Notifier, NotifyError};
use opsboard_proto::event::Notification;
use opsboard_proto::hub::{self, HubMessage};
use opsboard_proto::operative::RoomId;
use tokio::sync::{RwLock, mpsc};

/// Default cap on rooms a single connection may join.
pub const DEFAULT_MAX_ROOMS_PER_CONNECTION: usize = 16;

/// Process-local connection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Errors from room membership and delivery.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// The room name is empty or whitespace.
    #[error("room name must not be blank")]
    BlankRoom,
    /// The connection already belongs to the maximum number of rooms.
    #[error("room limit reached (max {max} rooms per connection)")]
    RoomLimit {
        /// Configured cap.
        max: usize,
    },
    /// The connection is not registered (already disconnected).
    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),
    /// The frame could not be encoded.
    #[error("failed to encode frame: {0}")]
    Encode(#[from] hub::CodecError),
}

struct Connection {
    sender: mpsc::UnboundedSender<Message>,
    rooms: HashSet<RoomId>,
}

#[derive(Default)]
struct Registry {
    connections: HashMap<ConnectionId, Connection>,
    rooms: HashMap<RoomId, HashSet<ConnectionId>>,
}

impl Registry {
    /// Removes a connection and every membership it held.
    fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        let conn = self.connections.remove(&id)?;
        for room in &conn.rooms {
            if let Some(members) = self.rooms.get_mut(room) {
                members.remove(&id);
                if members.is_empty() {
                    self.rooms.remove(room);
                }
            }
        }
        Some(conn)
    }
}

/// Owns the connection table and the room index.
pub struct ConnectionManager {
    next_id: AtomicU64,
    registry: RwLock<Registry>,
    max_rooms_per_connection: usize,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    /// Creates an empty manager with the default room cap.
    #[must_use]
    pub fn new() -> Self {
        Self::with_room_limit(DEFAULT_MAX_ROOMS_PER_CONNECTION)
    }

    /// Creates an empty manager allowing `max_rooms_per_connection` rooms
    /// per connection.
    #[must_use]
    pub fn with_room_limit(max_rooms_per_connection: usize) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            registry: RwLock::new(Registry::default()),
            max_rooms_per_connection,
        }
    }

    /// Registers a connection's outbound channel and returns its handle.
    pub async fn connect(&self, sender: mpsc::UnboundedSender<Message>) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.registry.write().await.connections.insert(
            id,
            Connection {
                sender,
                rooms: HashSet::new(),
            },
        );
        tracing::debug!(conn = %id, "connection registered");
        id
    }

    /// Drops a connection and all of its room memberships.
    ///
    /// Returns `false` if it was already gone.
    pub async fn disconnect(&self, id: ConnectionId) -> bool {
        let removed = self.registry.write().await.remove(id);
        if let Some(conn) = &removed {
            tracing::debug!(conn = %id, rooms = conn.rooms.len(), "connection removed");
        }
        removed.is_some()
    }

    /// Adds a connection to a room.
    ///
    /// Returns `true` if it was newly added, `false` if already a member.
    ///
    /// # Errors
    ///
    /// [`RouterError::BlankRoom`], [`RouterError::UnknownConnection`], or
    /// [`RouterError::RoomLimit`] when joining one more room would exceed
    /// the cap.
    pub async fn join(&self, id: ConnectionId, room: &RoomId) -> Result<bool, RouterError> {
        if room.is_blank() {
            return Err(RouterError::BlankRoom);
        }
        let mut registry = self.registry.write().await;
        let conn = registry
            .connections
            .get_mut(&id)
            .ok_or(RouterError::UnknownConnection(id))?;
        if conn.rooms.contains(room) {
            return Ok(false);
        }
        if conn.rooms.len() >= self.max_rooms_per_connection {
            return Err(RouterError::RoomLimit {
                max: self.max_rooms_per_connection,
            });
        }
        conn.rooms.insert(room.clone());
        registry.rooms.entry(room.clone()).or_default().insert(id);
        drop(registry);
        tracing::debug!(conn = %id, room = %room, "joined room");
        Ok(true)
    }

    /// Removes a connection from a room. Returns `false` if it was not a member.
    pub async fn leave(&self, id: ConnectionId, room: &RoomId) -> bool {
        let mut registry = self.registry.write().await;
        let was_member = registry
            .connections
            .get_mut(&id)
            .is_some_and(|conn| conn.rooms.remove(room));
        if was_member && let Some(members) = registry.rooms.get_mut(room) {
            members.remove(&id);
            if members.is_empty() {
                registry.rooms.remove(room);
            }
        }
        drop(registry);
        if was_member {
            tracing::debug!(conn = %id, room = %room, "left room");
        }
        was_member
    }

    /// Sends a frame to every live connection. Returns how many accepted it.
    ///
    /// # Errors
    ///
    /// [`RouterError::Encode`] if the frame cannot be encoded.
    pub async fn broadcast(&self, msg: &HubMessage) -> Result<usize, RouterError> {
        let bytes = hub::encode(msg)?;
        let targets: Vec<_> = {
            let registry = self.registry.read().await;
            registry
                .connections
                .iter()
                .map(|(id, conn)| (*id, conn.sender.clone()))
                .collect()
        };
        Ok(self.deliver(targets, &bytes).await)
    }

    /// Sends a frame to the members of `room`. Returns how many accepted it.
    ///
    /// A room with no members is not an error; the frame is dropped.
    ///
    /// # Errors
    ///
    /// [`RouterError::Encode`] if the frame cannot be encoded.
    pub async fn send_to_room(&self, room: &RoomId, msg: &HubMessage) -> Result<usize, RouterError> {
        let bytes = hub::encode(msg)?;
        let targets: Vec<_> = {
            let registry = self.registry.read().await;
            registry
                .rooms
                .get(room)
                .into_iter()
                .flatten()
                .filter_map(|id| {
                    registry
                        .connections
                        .get(id)
                        .map(|conn| (*id, conn.sender.clone()))
                })
                .collect()
        };
        if targets.is_empty() {
            tracing::debug!(room = %room, "no subscribers, frame dropped");
        }
        Ok(self.deliver(targets, &bytes).await)
    }

    /// Sends a frame to a single connection.
    ///
    /// # Errors
    ///
    /// [`RouterError::Encode`] or [`RouterError::UnknownConnection`].
    pub async fn send_to(&self, id: ConnectionId, msg: &HubMessage) -> Result<(), RouterError> {
        let bytes = hub::encode(msg)?;
        let sender = self
            .registry
            .read()
            .await
            .connections
            .get(&id)
            .map(|conn| conn.sender.clone())
            .ok_or(RouterError::UnknownConnection(id))?;
        if self.deliver(vec![(id, sender)], &bytes).await == 0 {
            return Err(RouterError::UnknownConnection(id));
        }
        Ok(())
    }

    /// Members currently in `room`.
    pub async fn room_size(&self, room: &RoomId) -> usize {
        self.registry
            .read()
            .await
            .rooms
            .get(room)
            .map_or(0, HashSet::len)
    }

    /// Live connections.
    pub async fn connection_count(&self) -> usize {
        self.registry.read().await.connections.len()
    }

    /// Sends a close frame to every connection.
    pub async fn close_all(&self) {
        let registry = self.registry.read().await;
        for (id, conn) in &registry.connections {
            tracing::info!(conn = %id, "sending close frame");
            let _ = conn.sender.send(Message::Close(None));
        }
    }

    /// Pushes `bytes` to each target, dropping any whose channel is closed.
    async fn deliver(
        &self,
        targets: Vec<(ConnectionId, mpsc::UnboundedSender<Message>)>,
        bytes: &[u8],
    ) -> usize {
        let mut delivered = 0;
        let mut dead = Vec::new();
        for (id, sender) in targets {
            if sender.send(Message::Binary(bytes.to_vec().into())).is_ok() {
                delivered += 1;
            } else {
                dead.push(id);
            }
        }
        if !dead.is_empty() {
            let mut registry = self.registry.write().await;
            for id in dead {
                tracing::warn!(conn = %id, "send failed, dropping connection");
                registry.remove(id);
            }
        }
        delivered
    }
}

impl Notifier for ConnectionManager {
    async fn broadcast(&self, notification: &Notification) -> Result<usize, NotifyError> {
        Self::broadcast(self, &HubMessage::Event(notification.clone()))
            .await
            .map_err(notify_error)
    }

    async fn send_to_room(
        &self,
        room: &RoomId,
        notification: &Notification,
    ) -> Result<usize, NotifyError> {
        Self::send_to_room(self, room, &HubMessage::Event(notification.clone()))
            .await
            .map_err(notify_error)
    }
}

fn notify_error(err: RouterError) -> NotifyError {
    match err {
        RouterError::Encode(e) => NotifyError::Encode(e.to_string()),
        _ => NotifyError::Closed,
    }
}
