//! Notification taxonomy and delivery classes.
//!
//! Every state change in the core is described by a [`Notification`]. A
//! [`Dispatch`] pairs it with a [`Delivery`] class: either every connected
//! client, or only the connections subscribed to one room.
//!
//! Notifications are a latency optimization for UI refresh. Clients that
//! miss one re-fetch the task list; nothing here is replayed.

use serde::{Deserialize, Serialize};

use crate::operative::RoomId;
use crate::task::{Priority, TaskId};

/// A domain event as seen by connected clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notification {
    /// A new mission was assigned.
    TaskCreated {
        /// The new task.
        task_id: TaskId,
        /// Title at creation time.
        title: String,
    },
    /// A mission's priority was set, sent to the assignee only.
    PriorityChanged {
        /// The affected task.
        task_id: TaskId,
        /// Task title for display.
        title: String,
        /// The priority now in effect.
        priority: Priority,
        /// True iff `priority` is `Emergency`.
        urgent: bool,
    },
    /// Generic "something changed, re-fetch" signal.
    TaskSync,
    /// A comment was appended to a task's log.
    CommentAdded {
        /// The task that received the comment.
        task_id: TaskId,
        /// Task title for display.
        title: String,
    },
    /// A task was deleted.
    TaskDeleted {
        /// Identifier of the removed task.
        task_id: TaskId,
    },
    /// The deadline sweep found tasks due soon.
    DeadlinesApproaching {
        /// How many open tasks fall inside the reminder window.
        task_count: u32,
    },
    /// Operative scores were reset.
    ScoresReset {
        /// Number of operative records touched.
        affected: u32,
    },
}

impl Notification {
    /// Builds a priority notification, deriving the urgent flag.
    #[must_use]
    pub fn priority_changed(task_id: TaskId, title: impl Into<String>, priority: Priority) -> Self {
        Self::PriorityChanged {
            task_id,
            title: title.into(),
            priority,
            urgent: priority.is_urgent(),
        }
    }

    /// The event name clients dispatch on.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::TaskCreated { .. } => "task_created",
            Self::PriorityChanged { .. } => "priority_changed",
            Self::TaskSync => "task_sync",
            Self::CommentAdded { .. } => "comment_added",
            Self::TaskDeleted { .. } => "task_deleted",
            Self::DeadlinesApproaching { .. } => "deadlines_approaching",
            Self::ScoresReset { .. } => "scores_reset",
        }
    }
}

/// Who receives a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Delivery {
    /// Every currently connected client.
    Broadcast,
    /// Only connections currently subscribed to this room.
    Room(RoomId),
}

/// A notification together with its delivery class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispatch {
    /// Delivery class.
    pub delivery: Delivery,
    /// Event to deliver.
    pub notification: Notification,
}

impl Dispatch {
    /// A notification for every connected client.
    #[must_use]
    pub const fn broadcast(notification: Notification) -> Self {
        Self {
            delivery: Delivery::Broadcast,
            notification,
        }
    }

    /// A notification for one room only.
    #[must_use]
    pub const fn to_room(room: RoomId, notification: Notification) -> Self {
        Self {
            delivery: Delivery::Room(room),
            notification,
        }
    }
}
