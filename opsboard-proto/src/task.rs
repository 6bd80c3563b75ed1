//! Task identity, priority and status types.
//!
//! These are the task attributes that travel inside notifications. The full
//! task record lives in the `opsboard` core crate.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a task, based on UUID v7 for time-ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Creates a new time-ordered task identifier (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `TaskId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID value.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Urgency of a task as set by the Chair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    /// Can wait.
    Low,
    /// Normal urgency.
    #[default]
    Medium,
    /// Should be picked up before medium work.
    High,
    /// Drop everything.
    Emergency,
}

impl Priority {
    /// Sort weight used when listing tasks: Emergency=4 down to Low=1.
    #[must_use]
    pub const fn weight(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Emergency => 4,
        }
    }

    /// Whether a change to this priority must be flagged as urgent.
    #[must_use]
    pub const fn is_urgent(self) -> bool {
        matches!(self, Self::Emergency)
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
            Self::Emergency => write!(f, "Emergency"),
        }
    }
}

/// Lifecycle status of a task.
///
/// Any status may follow any other; there is no terminal state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Assigned but not started.
    #[default]
    Pending,
    /// Actively being worked on.
    InProgress,
    /// Done. May be reverted.
    Completed,
}

impl TaskStatus {
    /// Progress percentage implied by this status.
    #[must_use]
    pub const fn progress(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::InProgress => 50,
            Self::Completed => 100,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::InProgress => write!(f, "In Progress"),
            Self::Completed => write!(f, "Completed"),
        }
    }
}
