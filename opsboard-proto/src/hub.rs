//! Hub frame protocol.
//!
//! Defines the [`HubMessage`] enum that is postcard-encoded and sent over
//! WebSocket binary frames between clients and the notification hub.
//!
//! A client connects, then subscribes to the rooms it wants targeted events
//! for (normally its own operative id). Subscriptions are not remembered
//! across reconnects; the client replays them.

use serde::{Deserialize, Serialize};

use crate::event::Notification;
use crate::operative::RoomId;

/// Error type for hub frame encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization failed.
    #[error("hub encode error: {0}")]
    Encode(String),
    /// Deserialization failed.
    #[error("hub decode error: {0}")]
    Decode(String),
}

/// Messages exchanged between clients and the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HubMessage {
    /// Client joins a room.
    ///
    /// Hub responds with [`HubMessage::Subscribed`] or [`HubMessage::Error`].
    Subscribe {
        /// Room to join.
        room: RoomId,
    },

    /// Client leaves a room.
    Unsubscribe {
        /// Room to leave.
        room: RoomId,
    },

    /// Hub confirms a subscription.
    Subscribed {
        /// The room that was joined (echoed back).
        room: RoomId,
    },

    /// Hub confirms an unsubscription.
    Unsubscribed {
        /// The room that was left.
        room: RoomId,
    },

    /// A notification pushed by the hub.
    Event(Notification),

    /// Hub reports an error condition for the last client frame.
    Error {
        /// Human-readable error description.
        reason: String,
    },
}

/// Encodes a [`HubMessage`] into bytes using postcard.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if serialization fails.
pub fn encode(msg: &HubMessage) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(msg).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decodes a [`HubMessage`] from bytes using postcard.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] if the bytes are not a valid frame.
pub fn decode(bytes: &[u8]) -> Result<HubMessage, CodecError> {
    postcard::from_bytes(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}
