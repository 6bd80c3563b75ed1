//! Operative identity, role, and room identifiers.

use serde::{Deserialize, Serialize};

/// Opaque identifier of a registered operative.
///
/// Issued by the identity collaborator; the hub never interprets it beyond
/// using it as a room name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperativeId(String);

impl OperativeId {
    /// Creates an operative identifier from its string form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the string representation of this identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The room that targets this operative's connections.
    #[must_use]
    pub fn room(&self) -> RoomId {
        RoomId(self.0.clone())
    }
}

impl std::fmt::Display for OperativeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role of an operative. Exactly two roles exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Assigns, re-prioritizes and deletes missions; administers scores.
    Chair,
    /// Works assigned missions.
    #[default]
    Employee,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chair => write!(f, "Chair"),
            Self::Employee => write!(f, "Employee"),
        }
    }
}

/// Logical channel used for targeted delivery.
///
/// In practice every room is named after an operative, but clients may
/// subscribe to any non-empty name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(String);

impl RoomId {
    /// Creates a room identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the room name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the room name is empty or whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&OperativeId> for RoomId {
    fn from(id: &OperativeId) -> Self {
        id.room()
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
