//! Store collaborator contracts.
//!
//! The core treats storage as a key-addressed document store. Adapters
//! implement [`TaskStore`] and [`OperativeStore`]; the in-process
//! [`crate::memory::MemoryStore`] is the reference implementation.
//!
//! # Invariant
//!
//! [`TaskStore::commit_task`] is the only write path for an existing task.
//! It MUST compare the stored version against `expected_version` and apply
//! the optional score adjustment in the same atomic step, so a status change
//! and its score effect either both land or neither does.

use std::future::Future;

use chrono::{DateTime, Utc};
use opsboard_proto::operative::{OperativeId, Role};
use opsboard_proto::task::{TaskId, TaskStatus};

use crate::model::{Operative, Task};
use crate::scoring::ScoreDelta;

/// Errors reported by store adapters.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Compare-and-swap failed: someone else committed first.
    #[error("task {task_id} is at version {found}, expected {expected}")]
    VersionConflict {
        /// Task being written.
        task_id: TaskId,
        /// Version the writer read.
        expected: u64,
        /// Version actually stored.
        found: u64,
    },

    /// The task to update no longer exists.
    #[error("task {0} does not exist")]
    MissingTask(TaskId),

    /// The operative to update does not exist.
    #[error("operative {0} does not exist")]
    MissingOperative(OperativeId),

    /// A task with this id is already stored.
    #[error("task {0} already exists")]
    DuplicateTask(TaskId),

    /// The backing store could not be reached or failed internally.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Selects tasks for [`TaskStore::find_tasks`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskFilter {
    /// Every task.
    All,
    /// Tasks assigned to one operative.
    AssignedTo(OperativeId),
    /// Tasks with a deadline in `[from, until]` whose status is not `excluding`.
    DueBetween {
        /// Window start, inclusive.
        from: DateTime<Utc>,
        /// Window end, inclusive.
        until: DateTime<Utc>,
        /// Status to leave out.
        excluding: TaskStatus,
    },
}

impl TaskFilter {
    /// Whether `task` passes this filter.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::AssignedTo(id) => task.assigned_to() == id,
            Self::DueBetween {
                from,
                until,
                excluding,
            } => {
                task.status() != *excluding && task.deadline() >= *from && task.deadline() <= *until
            }
        }
    }
}

/// A score change to apply atomically with a task commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreAdjustment {
    /// Whose score changes.
    pub operative: OperativeId,
    /// How it changes.
    pub delta: ScoreDelta,
}

/// Which operatives a score reset touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetScope {
    /// Every operative regardless of role.
    Everyone,
    /// Only operatives with this role.
    Role(Role),
}

impl ResetScope {
    #[must_use]
    pub fn includes(&self, operative: &Operative) -> bool {
        match self {
            Self::Everyone => true,
            Self::Role(role) => operative.role == *role,
        }
    }
}

/// Durable record of tasks.
pub trait TaskStore: Send + Sync {
    /// Looks up one task.
    fn find_task(
        &self,
        id: &TaskId,
    ) -> impl Future<Output = Result<Option<Task>, StoreError>> + Send;

    /// Returns every task matching `filter`, in no particular order.
    fn find_tasks(
        &self,
        filter: &TaskFilter,
    ) -> impl Future<Output = Result<Vec<Task>, StoreError>> + Send;

    /// Stores a newly created task.
    fn insert_task(&self, task: Task) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Replaces a stored task if its version still equals
    /// `expected_version`, applying `adjustment` in the same atomic step.
    ///
    /// Returns the task as stored.
    fn commit_task(
        &self,
        task: Task,
        expected_version: u64,
        adjustment: Option<ScoreAdjustment>,
    ) -> impl Future<Output = Result<Task, StoreError>> + Send;

    /// Removes a task with its comments. Returns `false` if it was absent.
    fn delete_task(&self, id: &TaskId) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

/// Durable record of operative profiles.
pub trait OperativeStore: Send + Sync {
    fn find_operative(
        &self,
        id: &OperativeId,
    ) -> impl Future<Output = Result<Option<Operative>, StoreError>> + Send;

    fn list_operatives(&self) -> impl Future<Output = Result<Vec<Operative>, StoreError>> + Send;

    /// Inserts or replaces a profile.
    fn upsert_operative(
        &self,
        operative: Operative,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Overwrites one operative's score.
    fn set_score(
        &self,
        id: &OperativeId,
        score: u32,
    ) -> impl Future<Output = Result<Operative, StoreError>> + Send;

    /// Sets the score of every operative in `scope` to zero, returning how
    /// many records were touched.
    fn reset_scores(
        &self,
        scope: ResetScope,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;
}
