//! Mission lifecycle engine.
//!
//! [`MissionEngine`] owns the task state machine. Each command authorizes
//! the requester through a [`Policy`], validates input, computes the new
//! state (including the score effect of a status change), and commits it
//! with a single compare-and-swap store call. Notifications and mail are
//! returned as [`Effects`] for a dispatcher to deliver.
//!
//! Status transitions are unrestricted: any status may follow any other.
//! The only coupling is the scoring side effect.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mockable::Clock;
use opsboard_proto::event::Notification;
use opsboard_proto::operative::OperativeId;
use opsboard_proto::task::{Priority, TaskId, TaskStatus};

use crate::comments::Comment;
use crate::dispatch::{Effects, Outcome};
use crate::error::CommandError;
use crate::mail::MailNotice;
use crate::model::{Requester, Task, sort_for_listing};
use crate::policy::Policy;
use crate::ports::{OperativeStore, ScoreAdjustment, TaskFilter, TaskStore};
use crate::scoring::score_transition;

/// Input for [`MissionEngine::create`].
///
/// Optional fields model what a client may omit; the engine rejects the
/// command if a required one is missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub assigned_to: Option<OperativeId>,
    /// Defaults to `Medium`.
    pub priority: Option<Priority>,
    pub deadline: Option<DateTime<Utc>>,
}

impl NewTask {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn assigned_to(mut self, operative: OperativeId) -> Self {
        self.assigned_to = Some(operative);
        self
    }

    #[must_use]
    pub const fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    #[must_use]
    pub const fn deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Input for [`MissionEngine::update`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    /// If set, the command fails with `Conflict` unless the stored task is
    /// still at this version.
    pub expected_version: Option<u64>,
}

impl TaskUpdate {
    #[must_use]
    pub const fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            priority: None,
            expected_version: None,
        }
    }

    #[must_use]
    pub const fn priority(priority: Priority) -> Self {
        Self {
            status: None,
            priority: Some(priority),
            expected_version: None,
        }
    }

    #[must_use]
    pub const fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    #[must_use]
    pub const fn expecting_version(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// Task lifecycle orchestration over a store and a clock.
pub struct MissionEngine<S, C>
where
    S: TaskStore + OperativeStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
}

impl<S, C> Clone for MissionEngine<S, C>
where
    S: TaskStore + OperativeStore,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S, C> MissionEngine<S, C>
where
    S: TaskStore + OperativeStore,
    C: Clock + Send + Sync,
{
    /// Creates an engine over the given store and clock.
    #[must_use]
    pub const fn new(store: Arc<S>, clock: Arc<C>) -> Self {
        Self { store, clock }
    }

    /// The backing store.
    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.utc()
    }

    /// Assigns a new mission.
    ///
    /// Emits a `task_created` broadcast and a `priority_changed` event to
    /// the assignee's room, and queues a mission-assigned mail notice if
    /// the assignee has an address on file.
    ///
    /// # Errors
    ///
    /// [`CommandError::Forbidden`] unless the requester is the Chair;
    /// [`CommandError::InvalidInput`] if title, description, assignee or
    /// deadline is missing; [`CommandError::Store`] if persisting fails.
    pub async fn create(
        &self,
        requester: &Requester,
        input: NewTask,
    ) -> Result<Outcome<Task>, CommandError> {
        if !Policy::for_requester(requester).can_create_task() {
            return Err(CommandError::Forbidden(
                "only the Chair can assign missions".to_string(),
            ));
        }

        let title = required_text(input.title, "title")?;
        let description = required_text(input.description, "description")?;
        let assigned_to = input
            .assigned_to
            .filter(|id| !id.as_str().trim().is_empty())
            .ok_or_else(|| CommandError::InvalidInput("assigned_to is required".to_string()))?;
        let deadline = input
            .deadline
            .ok_or_else(|| CommandError::InvalidInput("deadline is required".to_string()))?;
        let priority = input.priority.unwrap_or_default();

        let now = self.now();
        let task = Task::new(
            title,
            description,
            assigned_to,
            requester.id.clone(),
            priority,
            deadline,
            now,
        );
        self.store.insert_task(task.clone()).await?;

        tracing::info!(
            task_id = %task.id(),
            assigned_to = %task.assigned_to(),
            priority = %priority,
            "mission created"
        );

        let mut effects = Effects::new();
        effects.broadcast(Notification::TaskCreated {
            task_id: task.id().clone(),
            title: task.title().to_string(),
        });
        effects.to_room(
            task.assigned_to().room(),
            Notification::priority_changed(task.id().clone(), task.title(), priority),
        );

        // Best-effort: a missing profile or lookup failure only skips the mail.
        match self.store.find_operative(task.assigned_to()).await {
            Ok(Some(op)) => {
                if let Some(email) = op.email {
                    effects.mail(MailNotice::assigned(email, &task, now));
                }
            }
            Ok(None) => {
                tracing::debug!(assigned_to = %task.assigned_to(), "assignee has no profile, skipping mail");
            }
            Err(e) => {
                tracing::warn!(assigned_to = %task.assigned_to(), error = %e, "assignee lookup failed, skipping mail");
            }
        }

        Ok(Outcome::new(task, effects))
    }

    /// Lists the tasks visible to the requester, highest priority first and
    /// nearest deadline first within a priority.
    ///
    /// # Errors
    ///
    /// [`CommandError::Store`] if the store query fails.
    pub async fn list(&self, requester: &Requester) -> Result<Vec<Task>, CommandError> {
        let filter = if Policy::for_requester(requester).can_view_all_tasks() {
            TaskFilter::All
        } else {
            TaskFilter::AssignedTo(requester.id.clone())
        };
        let mut tasks = self.store.find_tasks(&filter).await?;
        sort_for_listing(&mut tasks);
        Ok(tasks)
    }

    /// Fetches one task the requester may see.
    ///
    /// # Errors
    ///
    /// [`CommandError::NotFound`] if absent; [`CommandError::Forbidden`] if
    /// the requester is neither the assignee nor the Chair.
    pub async fn get(&self, requester: &Requester, task_id: &TaskId) -> Result<Task, CommandError> {
        let task = self.load(task_id).await?;
        if !Policy::for_requester(requester).can_view_task(&task) {
            return Err(CommandError::Forbidden(format!(
                "task {task_id} is not assigned to {}",
                requester.id
            )));
        }
        Ok(task)
    }

    /// Changes status, priority, or both.
    ///
    /// A status change computes its score effect from the status being
    /// left, the deadline, and the current time, and commits it atomically
    /// with the task. A priority change notifies the assignee's room. Every
    /// successful call ends with a `task_sync` broadcast. Submitting values
    /// equal to the current ones writes nothing.
    ///
    /// # Errors
    ///
    /// [`CommandError::NotFound`], [`CommandError::Forbidden`] (neither
    /// assignee nor Chair, or a non-Chair changing priority),
    /// [`CommandError::Conflict`] (stale
    /// `expected_version` or a concurrent writer), [`CommandError::Store`].
    pub async fn update(
        &self,
        requester: &Requester,
        task_id: &TaskId,
        update: TaskUpdate,
    ) -> Result<Outcome<Task>, CommandError> {
        let current = self.load(task_id).await?;
        let policy = Policy::for_requester(requester);
        if !policy.can_mutate_task(&current) {
            return Err(CommandError::Forbidden(format!(
                "{} may not modify task {task_id}",
                requester.id
            )));
        }
        if update.priority.is_some_and(|p| p != current.priority()) && !policy.can_change_priority() {
            return Err(CommandError::Forbidden(
                "only the Chair can change a mission's priority".to_string(),
            ));
        }
        if let Some(expected) = update.expected_version
            && expected != current.version()
        {
            return Err(CommandError::Conflict {
                expected,
                found: current.version(),
            });
        }

        let now = self.now();
        let mut next = current.clone();
        let mut effects = Effects::new();
        let mut adjustment = None;
        let mut changed = false;

        if let Some(status) = update.status
            && status != current.status()
        {
            adjustment = score_transition(current.status(), status, current.deadline(), now).map(
                |delta| ScoreAdjustment {
                    operative: current.assigned_to().clone(),
                    delta,
                },
            );
            next.set_status(status, now);
            changed = true;
        }

        if let Some(priority) = update.priority
            && priority != current.priority()
        {
            next.set_priority(priority);
            effects.to_room(
                next.assigned_to().room(),
                Notification::priority_changed(next.id().clone(), next.title(), priority),
            );
            changed = true;
        }

        let task = if changed {
            next.advance_version();
            let stored = self
                .store
                .commit_task(next, current.version(), adjustment.clone())
                .await?;
            tracing::info!(
                task_id = %task_id,
                by = %requester.id,
                status = %stored.status(),
                priority = %stored.priority(),
                version = stored.version(),
                score = ?adjustment.map(|a| a.delta),
                "mission updated"
            );
            stored
        } else {
            tracing::debug!(task_id = %task_id, "update carried no changes");
            current
        };

        effects.broadcast(Notification::TaskSync);
        Ok(Outcome::new(task, effects))
    }

    /// Appends a comment to the task's log.
    ///
    /// The comment snapshots the requester's current display name and role.
    /// All clients get a `comment_added` broadcast.
    ///
    /// # Errors
    ///
    /// [`CommandError::NotFound`], [`CommandError::Forbidden`] (requester
    /// cannot see the task), [`CommandError::InvalidInput`] (blank text),
    /// [`CommandError::Conflict`] (concurrent writer), [`CommandError::Store`].
    pub async fn add_comment(
        &self,
        requester: &Requester,
        task_id: &TaskId,
        text: &str,
    ) -> Result<Outcome<Task>, CommandError> {
        let current = self.load(task_id).await?;
        if !Policy::for_requester(requester).can_view_task(&current) {
            return Err(CommandError::Forbidden(format!(
                "{} may not comment on task {task_id}",
                requester.id
            )));
        }
        let text = required_text(text.to_string(), "comment text")?;

        let mut next = current.clone();
        next.append_comment(Comment::from_requester(requester, text, self.now()));
        next.advance_version();
        let task = self
            .store
            .commit_task(next, current.version(), None)
            .await?;

        tracing::info!(task_id = %task_id, by = %requester.id, comments = task.comments().len(), "comment added");

        let mut effects = Effects::new();
        effects.broadcast(Notification::CommentAdded {
            task_id: task.id().clone(),
            title: task.title().to_string(),
        });
        Ok(Outcome::new(task, effects))
    }

    /// Deletes a task together with its comment log.
    ///
    /// # Errors
    ///
    /// [`CommandError::Forbidden`] unless the requester is the Chair;
    /// [`CommandError::NotFound`] if absent; [`CommandError::Store`].
    pub async fn delete(
        &self,
        requester: &Requester,
        task_id: &TaskId,
    ) -> Result<Outcome<TaskId>, CommandError> {
        if !Policy::for_requester(requester).can_delete_task() {
            return Err(CommandError::Forbidden(
                "only the Chair can delete missions".to_string(),
            ));
        }
        self.load(task_id).await?;
        if !self.store.delete_task(task_id).await? {
            return Err(CommandError::NotFound(format!("task {task_id}")));
        }

        tracing::info!(task_id = %task_id, by = %requester.id, "mission deleted");

        let mut effects = Effects::new();
        effects.broadcast(Notification::TaskDeleted {
            task_id: task_id.clone(),
        });
        Ok(Outcome::new(task_id.clone(), effects))
    }

    async fn load(&self, task_id: &TaskId) -> Result<Task, CommandError> {
        self.store
            .find_task(task_id)
            .await?
            .ok_or_else(|| CommandError::NotFound(format!("task {task_id}")))
    }
}

/// Rejects empty or whitespace-only text.
fn required_text(value: String, field: &str) -> Result<String, CommandError> {
    if value.trim().is_empty() {
        return Err(CommandError::InvalidInput(format!("{field} is required")));
    }
    Ok(value)
}
