//! Task, operative, and requester records.

use chrono::{DateTime, Utc};
use opsboard_proto::operative::{OperativeId, Role};
use opsboard_proto::task::{Priority, TaskId, TaskStatus};
use serde::{Deserialize, Serialize};

use crate::comments::{Comment, CommentLog};

/// Identity of whoever issued a command.
///
/// Supplied by the identity collaborator and trusted as already verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    /// Operative issuing the command.
    pub id: OperativeId,
    /// Role at the time of the command.
    pub role: Role,
    /// Current display name, snapshotted into comments.
    pub display_name: String,
}

impl Requester {
    /// A Chair requester.
    pub fn chair(id: OperativeId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            role: Role::Chair,
            display_name: display_name.into(),
        }
    }

    /// An Employee requester.
    pub fn employee(id: OperativeId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            role: Role::Employee,
            display_name: display_name.into(),
        }
    }
}

impl From<&Operative> for Requester {
    fn from(op: &Operative) -> Self {
        Self {
            id: op.id.clone(),
            role: op.role,
            display_name: op.display_name.clone(),
        }
    }
}

/// The slice of an operative profile the core reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operative {
    pub id: OperativeId,
    pub display_name: String,
    /// Mail address for deadline notices, if known.
    pub email: Option<String>,
    pub role: Role,
    /// Reputation score. Changed only by status transitions and
    /// administrative override or reset.
    pub score: u32,
}

impl Operative {
    /// Creates a profile with no email and a zero score.
    pub fn new(id: OperativeId, display_name: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            email: None,
            role,
            score: 0,
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub const fn with_score(mut self, score: u32) -> Self {
        self.score = score;
        self
    }
}

/// A mission assigned by the Chair to an operative.
///
/// Progress is not stored: it is derived from the status on every read, so
/// the two can never disagree. `updated_at` moves only when the task
/// transitions into `Completed`, which freezes the completion moment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    title: String,
    description: String,
    assigned_to: OperativeId,
    assigned_by: OperativeId,
    priority: Priority,
    deadline: DateTime<Utc>,
    status: TaskStatus,
    comments: CommentLog,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
}

impl Task {
    /// Builds a pending task at version 0.
    pub(crate) fn new(
        title: String,
        description: String,
        assigned_to: OperativeId,
        assigned_by: OperativeId,
        priority: Priority,
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TaskId::new(),
            title,
            description,
            assigned_to,
            assigned_by,
            priority,
            deadline,
            status: TaskStatus::Pending,
            comments: CommentLog::new(),
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    #[must_use]
    pub const fn id(&self) -> &TaskId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub const fn assigned_to(&self) -> &OperativeId {
        &self.assigned_to
    }

    #[must_use]
    pub const fn assigned_by(&self) -> &OperativeId {
        &self.assigned_by
    }

    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    #[must_use]
    pub const fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Progress percentage: 0, 50 or 100, following the status.
    #[must_use]
    pub const fn progress(&self) -> u8 {
        self.status.progress()
    }

    #[must_use]
    pub const fn comments(&self) -> &CommentLog {
        &self.comments
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Write counter used for compare-and-swap commits.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Sets the status, pinning `updated_at` when the task becomes completed.
    pub(crate) fn set_status(&mut self, status: TaskStatus, now: DateTime<Utc>) {
        if status == TaskStatus::Completed && self.status != TaskStatus::Completed {
            self.updated_at = now;
        }
        self.status = status;
    }

    pub(crate) const fn set_priority(&mut self, priority: Priority) {
        self.priority = priority;
    }

    pub(crate) fn append_comment(&mut self, comment: Comment) {
        self.comments.append(comment);
    }

    /// Stamps the version this task will carry once committed.
    pub(crate) const fn advance_version(&mut self) {
        self.version += 1;
    }
}

/// Orders tasks for presentation: highest priority first, then the
/// nearest deadline.
pub fn sort_for_listing(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        b.priority
            .weight()
            .cmp(&a.priority.weight())
            .then_with(|| a.deadline.cmp(&b.deadline))
    });
}
