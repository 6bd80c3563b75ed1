//! Reputation score side effects of status transitions.
//!
//! [`score_transition`] is pure: it looks only at the two statuses, the
//! deadline, and the moment the transition is applied. The resulting
//! [`ScoreDelta`] is applied by the store inside the same atomic commit as
//! the status change, against whatever score is current at that point.

use chrono::{DateTime, Utc};
use opsboard_proto::task::TaskStatus;
use serde::{Deserialize, Serialize};

/// Points awarded for completing a task at or before its deadline.
pub const ON_TIME_AWARD: u32 = 10;

/// Points removed when a completed task is reopened.
pub const REOPEN_PENALTY: u32 = 10;

/// A pending change to one operative's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreDelta {
    /// Add points.
    Award(u32),
    /// Remove `amount` points, but only if the score is at least
    /// `min_balance`. Below that the score is left as is, not clamped.
    Deduct {
        /// Points to remove.
        amount: u32,
        /// Smallest score the deduction applies to.
        min_balance: u32,
    },
}

impl ScoreDelta {
    /// Returns the score after applying this delta to `current`.
    #[must_use]
    pub const fn apply(self, current: u32) -> u32 {
        match self {
            Self::Award(points) => current.saturating_add(points),
            Self::Deduct {
                amount,
                min_balance,
            } => {
                if current >= min_balance {
                    current.saturating_sub(amount)
                } else {
                    current
                }
            }
        }
    }
}

/// Computes the score effect of moving a task from `previous` to `next`.
///
/// - Into `Completed` from anything else: [`ON_TIME_AWARD`] when
///   `now <= deadline`, nothing when late.
/// - Out of `Completed`: a [`REOPEN_PENALTY`] deduction guarded so the
///   score never goes negative.
/// - Anything else, including `Completed` to `Completed`: no effect.
#[must_use]
pub fn score_transition(
    previous: TaskStatus,
    next: TaskStatus,
    deadline: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<ScoreDelta> {
    match (previous, next) {
        (TaskStatus::Completed, TaskStatus::Completed) => None,
        (_, TaskStatus::Completed) => (now <= deadline).then_some(ScoreDelta::Award(ON_TIME_AWARD)),
        (TaskStatus::Completed, _) => Some(ScoreDelta::Deduct {
            amount: REOPEN_PENALTY,
            min_balance: REOPEN_PENALTY,
        }),
        _ => None,
    }
}
