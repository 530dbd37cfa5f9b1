//! Household comments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use foodbank_core::{CommentId, HouseholdId};

/// Maximum comment length in characters.
pub const MAX_COMMENT_LENGTH: usize = 2000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub household_id: HouseholdId,
    /// GitHub account ID of the author. `None` for comments written by the
    /// system.
    pub author_github_id: Option<i64>,
    /// GitHub login of the author when the comment was written.
    pub author: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    /// Whether the GitHub account `github_id` wrote this comment.
    #[must_use]
    pub fn is_written_by(&self, github_id: i64) -> bool {
        self.author_github_id == Some(github_id)
    }
}

/// A comment with the author's GitHub profile attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub author_name: Option<String>,
    pub author_avatar_url: Option<String>,
}

impl From<Comment> for CommentView {
    fn from(comment: Comment) -> Self {
        Self {
            comment,
            author_name: None,
            author_avatar_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentInput {
    pub text: String,
}
