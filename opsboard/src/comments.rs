//! Append-only comment log attached to a task.
//!
//! Each [`Comment`] keeps a snapshot of the author's display name and role
//! as they were when the comment was written. Renaming an operative later
//! does not rewrite history.

use chrono::{DateTime, Utc};
use opsboard_proto::operative::{OperativeId, Role};
use serde::{Deserialize, Serialize};

use crate::model::Requester;

/// One message in a task's log. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    author: OperativeId,
    author_name: String,
    author_role: Role,
    text: String,
    created_at: DateTime<Utc>,
}

impl Comment {
    /// Snapshots the requester's identity alongside the message body.
    #[must_use]
    pub fn from_requester(requester: &Requester, text: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            author: requester.id.clone(),
            author_name: requester.display_name.clone(),
            author_role: requester.role,
            text: text.into(),
            created_at: now,
        }
    }

    #[must_use]
    pub const fn author(&self) -> &OperativeId {
        &self.author
    }

    /// Display name at write time.
    #[must_use]
    pub fn author_name(&self) -> &str {
        &self.author_name
    }

    /// Role at write time.
    #[must_use]
    pub const fn author_role(&self) -> Role {
        self.author_role
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Ordered, append-only sequence of comments.
///
/// Read order is insertion order. There is no edit, delete, or
/// pagination; the whole log travels with its task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentLog(Vec<Comment>);

impl CommentLog {
    /// Creates an empty log.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a comment at the end of the log.
    pub fn append(&mut self, comment: Comment) {
        self.0.push(comment);
    }

    /// Iterates comments oldest first.
    pub fn iter(&self) -> std::slice::Iter<'_, Comment> {
        self.0.iter()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The most recently appended comment.
    #[must_use]
    pub fn last(&self) -> Option<&Comment> {
        self.0.last()
    }
}

impl<'a> IntoIterator for &'a CommentLog {
    type Item = &'a Comment;
    type IntoIter = std::slice::Iter<'a, Comment>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
