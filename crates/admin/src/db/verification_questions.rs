//! Verification question repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use foodbank_core::VerificationQuestionId;

use super::RepositoryError;
use crate::models::{VerificationQuestion, VerificationQuestionInput};

#[derive(Debug, sqlx::FromRow)]
struct QuestionRow {
    id: Uuid,
    question_sv: String,
    question_en: String,
    help_text_sv: Option<String>,
    help_text_en: Option<String>,
    is_required: bool,
    is_active: bool,
    display_order: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<QuestionRow> for VerificationQuestion {
    fn from(row: QuestionRow) -> Self {
        Self {
            id: VerificationQuestionId::new(row.id),
            question_sv: row.question_sv,
            question_en: row.question_en,
            help_text_sv: row.help_text_sv,
            help_text_en: row.help_text_en,
            is_required: row.is_required,
            is_active: row.is_active,
            display_order: row.display_order,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const QUESTION_COLUMNS: &str = "id, question_sv, question_en, help_text_sv, help_text_en, \
     is_required, is_active, display_order, created_at, updated_at";

/// Repository for the enrollment checklist.
pub struct VerificationQuestionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> VerificationQuestionRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Questions in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, include_inactive: bool) -> Result<Vec<VerificationQuestion>, RepositoryError> {
        let rows = sqlx::query_as::<_, QuestionRow>(&format!(
            r"
            SELECT {QUESTION_COLUMNS}
            FROM verification_questions
            WHERE $1 OR is_active
            ORDER BY display_order, created_at
            "
        ))
        .bind(include_inactive)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// IDs of the questions that must be confirmed at enrollment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn required_ids(&self) -> Result<Vec<VerificationQuestionId>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM verification_questions WHERE is_active AND is_required ORDER BY display_order",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(ids.into_iter().map(VerificationQuestionId::new).collect())
    }

    /// Append a question at the end of the list.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        input: &VerificationQuestionInput,
    ) -> Result<VerificationQuestion, RepositoryError> {
        let row = sqlx::query_as::<_, QuestionRow>(&format!(
            r"
            INSERT INTO verification_questions
                (id, question_sv, question_en, help_text_sv, help_text_en, is_required, display_order)
            VALUES ($1, $2, $3, $4, $5, $6,
                    (SELECT COALESCE(MAX(display_order), -1) + 1 FROM verification_questions))
            RETURNING {QUESTION_COLUMNS}
            "
        ))
        .bind(VerificationQuestionId::generate())
        .bind(&input.question_sv)
        .bind(&input.question_en)
        .bind(input.help_text_sv.as_deref())
        .bind(input.help_text_en.as_deref())
        .bind(input.is_required)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no question has this ID.
    pub async fn update(
        &self,
        id: VerificationQuestionId,
        input: &VerificationQuestionInput,
    ) -> Result<VerificationQuestion, RepositoryError> {
        let row = sqlx::query_as::<_, QuestionRow>(&format!(
            r"
            UPDATE verification_questions
            SET question_sv = $2, question_en = $3, help_text_sv = $4, help_text_en = $5,
                is_required = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING {QUESTION_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&input.question_sv)
        .bind(&input.question_en)
        .bind(input.help_text_sv.as_deref())
        .bind(input.help_text_en.as_deref())
        .bind(input.is_required)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Deactivate a question. Deactivated questions stay in the table so
    /// past enrollments keep their meaning.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no question has this ID.
    pub async fn deactivate(&self, id: VerificationQuestionId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE verification_questions SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Set `display_order` from the position of each ID in `ids`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if any ID is unknown; nothing is
    /// changed in that case.
    pub async fn reorder(&self, ids: &[VerificationQuestionId]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for (position, id) in ids.iter().enumerate() {
            let order = i32::try_from(position)
                .map_err(|_| RepositoryError::Conflict("too many questions".to_string()))?;
            let result = sqlx::query(
                "UPDATE verification_questions SET display_order = $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(id)
            .bind(order)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 0 {
                return Err(RepositoryError::NotFound);
            }
        }

        tx.commit().await?;
        Ok(())
    }
}
