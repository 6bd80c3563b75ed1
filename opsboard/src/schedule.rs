//! Periodic jobs: deadline reminders and the monthly score reset.
//!
//! These are plain engine methods. The hub binary decides when to call
//! them; tests call them directly with a controlled clock.

use chrono::Duration;
use mockable::Clock;
use opsboard_proto::event::Notification;
use opsboard_proto::operative::Role;
use opsboard_proto::task::TaskStatus;

use crate::admin::scores_reset;
use crate::dispatch::{Effects, Outcome};
use crate::error::CommandError;
use crate::lifecycle::MissionEngine;
use crate::mail::MailNotice;
use crate::model::{Task, sort_for_listing};
use crate::ports::{OperativeStore, ResetScope, TaskFilter, TaskStore};

/// Default reminder horizon, in hours.
pub const DEFAULT_DEADLINE_WINDOW_HOURS: i64 = 24;

/// Longest reminder horizon accepted from configuration, in hours.
pub const MAX_DEADLINE_WINDOW_HOURS: i64 = 24 * 366;

impl<S, C> MissionEngine<S, C>
where
    S: TaskStore + OperativeStore,
    C: Clock + Send + Sync,
{
    /// Unfinished tasks due between now and `now + window`, inclusive,
    /// in listing order.
    ///
    /// # Errors
    ///
    /// [`CommandError::InvalidInput`] if `window` is not positive or
    /// reaches past the representable calendar; [`CommandError::Store`] if
    /// the store query fails.
    pub async fn tasks_due_within(&self, window: Duration) -> Result<Vec<Task>, CommandError> {
        if window <= Duration::zero() {
            return Err(CommandError::InvalidInput(
                "deadline window must be positive".to_string(),
            ));
        }
        let now = self.now();
        let until = now.checked_add_signed(window).ok_or_else(|| {
            CommandError::InvalidInput(format!(
                "deadline window of {} hours is out of range",
                window.num_hours()
            ))
        })?;
        let filter = TaskFilter::DueBetween {
            from: now,
            until,
            excluding: TaskStatus::Completed,
        };
        let mut tasks = self.store().find_tasks(&filter).await?;
        sort_for_listing(&mut tasks);
        Ok(tasks)
    }

    /// Queues a deadline warning for every assignee with an address whose
    /// task is due within `window`, and broadcasts how many tasks are due.
    ///
    /// Returns the number of tasks found.
    ///
    /// # Errors
    ///
    /// Same as [`Self::tasks_due_within`]. Profile lookup failures only
    /// skip that task's mail.
    pub async fn remind_due_tasks(&self, window: Duration) -> Result<Outcome<usize>, CommandError> {
        let now = self.now();
        let due = self.tasks_due_within(window).await?;
        let mut effects = Effects::new();

        for task in &due {
            match self.store().find_operative(task.assigned_to()).await {
                Ok(Some(op)) => match op.email {
                    Some(email) => {
                        effects.mail(MailNotice::deadline_warning(email, task, window, now));
                    }
                    None => tracing::debug!(task_id = %task.id(), "assignee has no email"),
                },
                Ok(None) => tracing::debug!(task_id = %task.id(), "assignee has no profile"),
                Err(e) => {
                    tracing::warn!(task_id = %task.id(), error = %e, "assignee lookup failed");
                }
            }
        }

        tracing::info!(due = due.len(), reminders = effects.mail.len(), "deadline sweep finished");
        effects.broadcast(Notification::DeadlinesApproaching {
            task_count: u32::try_from(due.len()).unwrap_or(u32::MAX),
        });
        Ok(Outcome::new(due.len(), effects))
    }

    /// Zeroes every Employee score. The Chair keeps theirs.
    ///
    /// # Errors
    ///
    /// [`CommandError::Store`] if the reset fails.
    pub async fn monthly_reset(&self) -> Result<Outcome<usize>, CommandError> {
        let affected = self
            .store()
            .reset_scores(ResetScope::Role(Role::Employee))
            .await?;
        tracing::info!(affected, "monthly score reset");
        Ok(Outcome::new(affected, scores_reset(affected)))
    }
}
