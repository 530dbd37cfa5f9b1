//! Household comment repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use foodbank_core::{CommentId, HouseholdId};

use super::RepositoryError;
use crate::models::Comment;

#[derive(Debug, sqlx::FromRow)]
struct CommentRow {
    id: Uuid,
    household_id: Uuid,
    author_github_id: Option<i64>,
    author: Option<String>,
    text: String,
    created_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Self {
            id: CommentId::new(row.id),
            household_id: HouseholdId::new(row.household_id),
            author_github_id: row.author_github_id,
            author: row.author,
            text: row.text,
            created_at: row.created_at,
        }
    }
}

/// Repository for household comments.
pub struct CommentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CommentRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Comments on a household, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_household(
        &self,
        household_id: HouseholdId,
    ) -> Result<Vec<Comment>, RepositoryError> {
        let rows = sqlx::query_as::<_, CommentRow>(
            r"
            SELECT id, household_id, author_github_id, author, text, created_at
            FROM household_comments
            WHERE household_id = $1
            ORDER BY created_at DESC
            ",
        )
        .bind(household_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Add a comment to a household that has not been anonymized.
    ///
    /// `author` is the GitHub account ID and login of the writer. Returns
    /// `None` when the household is missing or anonymized.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        household_id: HouseholdId,
        author: Option<(i64, &str)>,
        text: &str,
    ) -> Result<Option<Comment>, RepositoryError> {
        let row = sqlx::query_as::<_, CommentRow>(
            r"
            INSERT INTO household_comments (id, household_id, author_github_id, author, text)
            SELECT $1, h.id, $3, $4, $5
            FROM households h
            WHERE h.id = $2 AND h.anonymized_at IS NULL
            RETURNING id, household_id, author_github_id, author, text, created_at
            ",
        )
        .bind(CommentId::generate())
        .bind(household_id)
        .bind(author.map(|(github_id, _)| github_id))
        .bind(author.map(|(_, login)| login))
        .bind(text)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CommentId) -> Result<Option<Comment>, RepositoryError> {
        let row = sqlx::query_as::<_, CommentRow>(
            "SELECT id, household_id, author_github_id, author, text, created_at FROM household_comments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Delete a comment written by the GitHub account `author_github_id`.
    /// Returns whether a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_by_author(
        &self,
        id: CommentId,
        author_github_id: i64,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM household_comments WHERE id = $1 AND author_github_id = $2")
            .bind(id)
            .bind(author_github_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
