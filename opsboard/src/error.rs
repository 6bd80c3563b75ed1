//! Errors surfaced to command callers.

use thiserror::Error;

use crate::ports::StoreError;

/// Reason a command was rejected or failed.
///
/// Authorization and existence checks run before any write, so every
/// variant except [`CommandError::Store`] means nothing was mutated.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The requester's role or relationship to the task does not allow this.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// The referenced task or operative does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// A required field is missing or malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The task changed since the caller (or this command) read it.
    #[error("task was modified concurrently: expected version {expected}, found {found}")]
    Conflict {
        /// Version the writer based its change on.
        expected: u64,
        /// Version currently stored.
        found: u64,
    },
    /// The store collaborator failed.
    #[error("store failure: {0}")]
    Store(#[source] StoreError),
}

impl From<StoreError> for CommandError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict {
                expected, found, ..
            } => Self::Conflict { expected, found },
            StoreError::MissingTask(id) => Self::NotFound(format!("task {id}")),
            StoreError::MissingOperative(id) => Self::NotFound(format!("operative {id}")),
            other => Self::Store(other),
        }
    }
}
