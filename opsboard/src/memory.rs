//! In-process store adapter.
//!
//! [`MemoryStore`] keeps tasks and operative profiles behind a single
//! [`RwLock`], so a task commit and its score adjustment happen under one
//! write guard. The lock is never held across an await point.
//!
//! Contents are lost when the process exits.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use opsboard_proto::operative::OperativeId;
use opsboard_proto::task::TaskId;
use parking_lot::RwLock;

use crate::model::{Operative, Task};
use crate::ports::{
    OperativeStore, ResetScope, ScoreAdjustment, StoreError, TaskFilter, TaskStore,
};

#[derive(Debug, Default)]
struct Inner {
    tasks: HashMap<TaskId, Task>,
    operatives: HashMap<OperativeId, Operative>,
}

/// Thread-safe in-memory implementation of both store ports.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    offline: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with operative profiles.
    #[must_use]
    pub fn with_operatives(operatives: impl IntoIterator<Item = Operative>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.write();
            for op in operatives {
                inner.operatives.insert(op.id.clone(), op);
            }
        }
        store
    }

    /// Simulates an outage: while offline every call fails with
    /// [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of stored tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.inner.read().tasks.len()
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }
}

impl TaskStore for MemoryStore {
    async fn find_task(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
        self.ensure_online()?;
        Ok(self.inner.read().tasks.get(id).cloned())
    }

    async fn find_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
        self.ensure_online()?;
        let inner = self.inner.read();
        Ok(inner
            .tasks
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    async fn insert_task(&self, task: Task) -> Result<(), StoreError> {
        self.ensure_online()?;
        let mut inner = self.inner.write();
        if inner.tasks.contains_key(task.id()) {
            return Err(StoreError::DuplicateTask(task.id().clone()));
        }
        inner.tasks.insert(task.id().clone(), task);
        drop(inner);
        Ok(())
    }

    async fn commit_task(
        &self,
        task: Task,
        expected_version: u64,
        adjustment: Option<ScoreAdjustment>,
    ) -> Result<Task, StoreError> {
        self.ensure_online()?;
        let mut inner = self.inner.write();

        let found = inner
            .tasks
            .get(task.id())
            .map(Task::version)
            .ok_or_else(|| StoreError::MissingTask(task.id().clone()))?;
        if found != expected_version {
            return Err(StoreError::VersionConflict {
                task_id: task.id().clone(),
                expected: expected_version,
                found,
            });
        }

        // Validate the score target before touching anything.
        if let Some(adj) = &adjustment {
            let op = inner
                .operatives
                .get_mut(&adj.operative)
                .ok_or_else(|| StoreError::MissingOperative(adj.operative.clone()))?;
            op.score = adj.delta.apply(op.score);
        }

        inner.tasks.insert(task.id().clone(), task.clone());
        drop(inner);
        Ok(task)
    }

    async fn delete_task(&self, id: &TaskId) -> Result<bool, StoreError> {
        self.ensure_online()?;
        Ok(self.inner.write().tasks.remove(id).is_some())
    }
}

impl OperativeStore for MemoryStore {
    async fn find_operative(&self, id: &OperativeId) -> Result<Option<Operative>, StoreError> {
        self.ensure_online()?;
        Ok(self.inner.read().operatives.get(id).cloned())
    }

    async fn list_operatives(&self) -> Result<Vec<Operative>, StoreError> {
        self.ensure_online()?;
        Ok(self.inner.read().operatives.values().cloned().collect())
    }

    async fn upsert_operative(&self, operative: Operative) -> Result<(), StoreError> {
        self.ensure_online()?;
        self.inner
            .write()
            .operatives
            .insert(operative.id.clone(), operative);
        Ok(())
    }

    async fn set_score(&self, id: &OperativeId, score: u32) -> Result<Operative, StoreError> {
        self.ensure_online()?;
        let mut inner = self.inner.write();
        let op = inner
            .operatives
            .get_mut(id)
            .ok_or_else(|| StoreError::MissingOperative(id.clone()))?;
        op.score = score;
        Ok(op.clone())
    }

    async fn reset_scores(&self, scope: ResetScope) -> Result<usize, StoreError> {
        self.ensure_online()?;
        let mut inner = self.inner.write();
        let mut touched = 0;
        for op in inner.operatives.values_mut().filter(|op| scope.includes(op)) {
            op.score = 0;
            touched += 1;
        }
        drop(inner);
        Ok(touched)
    }
}
