//! Usage agreement repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use foodbank_core::AgreementId;

use super::RepositoryError;
use crate::models::Agreement;

#[derive(Debug, sqlx::FromRow)]
struct AgreementRow {
    id: Uuid,
    version: i32,
    content: String,
    effective_from: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<AgreementRow> for Agreement {
    fn from(row: AgreementRow) -> Self {
        Self {
            id: AgreementId::new(row.id),
            version: row.version,
            content: row.content,
            effective_from: row.effective_from,
            created_at: row.created_at,
        }
    }
}

/// Repository for agreements and acceptances.
pub struct AgreementRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AgreementRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The agreement in force at `now`: the latest `effective_from` that
    /// is not in the future.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn current(&self, now: DateTime<Utc>) -> Result<Option<Agreement>, RepositoryError> {
        let row = sqlx::query_as::<_, AgreementRow>(
            r"
            SELECT id, version, content, effective_from, created_at
            FROM agreements
            WHERE effective_from <= $1
            ORDER BY effective_from DESC, version DESC
            LIMIT 1
            ",
        )
        .bind(now)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// When the user accepted the agreement, if they did.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn accepted_at(
        &self,
        github_id: i64,
        agreement_id: AgreementId,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        let accepted = sqlx::query_scalar::<_, DateTime<Utc>>(
            "SELECT accepted_at FROM agreement_acceptances WHERE github_id = $1 AND agreement_id = $2",
        )
        .bind(github_id)
        .bind(agreement_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(accepted)
    }

    /// Record an acceptance. Accepting twice keeps the first timestamp.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn accept(
        &self,
        github_id: i64,
        agreement_id: AgreementId,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO agreement_acceptances (github_id, agreement_id, accepted_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (github_id, agreement_id) DO NOTHING
            ",
        )
        .bind(github_id)
        .bind(agreement_id)
        .bind(now)
        .execute(self.pool)
        .await?;

        self.accepted_at(github_id, agreement_id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Publish a new agreement version.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the version already exists.
    pub async fn publish(
        &self,
        version: i32,
        content: &str,
        effective_from: DateTime<Utc>,
    ) -> Result<Agreement, RepositoryError> {
        let row = sqlx::query_as::<_, AgreementRow>(
            r"
            INSERT INTO agreements (id, version, content, effective_from)
            VALUES ($1, $2, $3, $4)
            RETURNING id, version, content, effective_from, created_at
            ",
        )
        .bind(AgreementId::generate())
        .bind(version)
        .bind(content)
        .bind(effective_from)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            RepositoryError::from_unique_violation(e, &format!("agreement version {version} exists"))
        })?;

        Ok(row.into())
    }
}
