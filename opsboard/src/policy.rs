//! Capability checks resolved once per command.
//!
//! The lifecycle engine asks a [`Policy`] what the requester may do and
//! keeps role logic out of the state machine itself.

use opsboard_proto::operative::Role;

use crate::model::{Requester, Task};

/// What a single requester is allowed to do.
#[derive(Debug, Clone, Copy)]
pub struct Policy<'a> {
    requester: &'a Requester,
}

impl<'a> Policy<'a> {
    /// Resolves the policy for `requester`.
    #[must_use]
    pub const fn for_requester(requester: &'a Requester) -> Self {
        Self { requester }
    }

    const fn is_chair(&self) -> bool {
        matches!(self.requester.role, Role::Chair)
    }

    fn is_assignee(&self, task: &Task) -> bool {
        task.assigned_to() == &self.requester.id
    }

    /// Only the Chair assigns missions.
    #[must_use]
    pub const fn can_create_task(&self) -> bool {
        self.is_chair()
    }

    /// Only the Chair deletes missions.
    #[must_use]
    pub const fn can_delete_task(&self) -> bool {
        self.is_chair()
    }

    /// The Chair lists every task; everyone else only their own.
    #[must_use]
    pub const fn can_view_all_tasks(&self) -> bool {
        self.is_chair()
    }

    #[must_use]
    pub fn can_view_task(&self, task: &Task) -> bool {
        self.is_chair() || self.is_assignee(task)
    }

    /// The assignee or the Chair may change status.
    #[must_use]
    pub fn can_mutate_task(&self, task: &Task) -> bool {
        self.is_chair() || self.is_assignee(task)
    }

    /// Only the Chair re-prioritizes a mission.
    #[must_use]
    pub const fn can_change_priority(&self) -> bool {
        self.is_chair()
    }

    /// Score override and reset are Chair commands.
    #[must_use]
    pub const fn can_administer_scores(&self) -> bool {
        self.is_chair()
    }
}
