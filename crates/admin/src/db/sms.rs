//! Outgoing SMS repository.
//!
//! Records move `queued -> sending -> sent|retrying|failed`. Claiming uses
//! `FOR UPDATE SKIP LOCKED` so concurrent dispatchers never pick the same
//! record. Transitions out of `sending` are conditioned on the record still
//! being `sending`, and a record whose claim is older than the lease is
//! claimed again.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use foodbank_core::{HouseholdId, ParcelId, SmsId, SmsIntent, SmsStatus};

use super::{RepositoryError, to_unsigned};
use crate::models::SmsRecord;

/// A message to put on the queue.
#[derive(Debug, Clone)]
pub struct NewSms {
    pub id: SmsId,
    pub intent: SmsIntent,
    pub household_id: HouseholdId,
    pub parcel_id: Option<ParcelId>,
    pub to_e164: String,
    pub text: String,
    pub next_attempt_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct SmsRow {
    id: Uuid,
    intent: SmsIntent,
    household_id: Uuid,
    parcel_id: Option<Uuid>,
    to_e164: String,
    text: String,
    status: SmsStatus,
    attempt_count: i32,
    next_attempt_at: DateTime<Utc>,
    last_error: Option<String>,
    provider_message_id: Option<String>,
    sent_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<SmsRow> for SmsRecord {
    type Error = RepositoryError;

    fn try_from(row: SmsRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: SmsId::new(row.id),
            intent: row.intent,
            household_id: HouseholdId::new(row.household_id),
            parcel_id: row.parcel_id.map(ParcelId::new),
            to_e164: row.to_e164,
            text: row.text,
            status: row.status,
            attempt_count: to_unsigned(row.attempt_count, "attempt_count")?,
            next_attempt_at: row.next_attempt_at,
            last_error: row.last_error,
            provider_message_id: row.provider_message_id,
            sent_at: row.sent_at,
            created_at: row.created_at,
        })
    }
}

const SMS_COLUMNS: &str = "id, intent, household_id, parcel_id, to_e164, text, status, \
     attempt_count, next_attempt_at, last_error, provider_message_id, sent_at, created_at";

/// Repository for the SMS queue.
pub struct SmsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SmsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Queue a message.
    ///
    /// Returns `None` when a live record already exists for the same
    /// intent and parcel.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert(&self, sms: &NewSms) -> Result<Option<SmsRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, SmsRow>(&format!(
            r"
            INSERT INTO outgoing_sms (id, intent, household_id, parcel_id, to_e164, text, next_attempt_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT DO NOTHING
            RETURNING {SMS_COLUMNS}
            "
        ))
        .bind(sms.id)
        .bind(sms.intent)
        .bind(sms.household_id)
        .bind(sms.parcel_id)
        .bind(&sms.to_e164)
        .bind(&sms.text)
        .bind(sms.next_attempt_at)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Claim up to `limit` due records, moving them to `sending` and
    /// counting the attempt.
    ///
    /// Records claimed before `stale_before` and never settled are due
    /// again.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn claim_due(
        &self,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<SmsRecord>, RepositoryError> {
        let rows = sqlx::query_as::<_, SmsRow>(&format!(
            r"
            UPDATE outgoing_sms
            SET status = 'sending', attempt_count = attempt_count + 1, claimed_at = $1
            WHERE id IN (
                SELECT id FROM outgoing_sms
                WHERE (status IN ('queued', 'retrying') AND next_attempt_at <= $1)
                   OR (status = 'sending' AND claimed_at < $2)
                ORDER BY next_attempt_at
                LIMIT $3
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {SMS_COLUMNS}
            "
        ))
        .bind(now)
        .bind(stale_before)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_sent(
        &self,
        id: SmsId,
        provider_message_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE outgoing_sms
            SET status = 'sent', provider_message_id = $2, sent_at = $3, last_error = NULL
            WHERE id = $1 AND status = 'sending'
            ",
        )
        .bind(id)
        .bind(provider_message_id)
        .bind(now)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Put a `sending` record back on the queue for another attempt.
    ///
    /// The record is cancelled instead when its household was anonymized
    /// while the send was in flight. Returns the status written, or `None`
    /// if the record had already left `sending`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn schedule_retry(
        &self,
        id: SmsId,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<Option<SmsStatus>, RepositoryError> {
        let status = sqlx::query_scalar::<_, SmsStatus>(
            r"
            UPDATE outgoing_sms s
            SET status = CASE WHEN h.anonymized_at IS NULL
                              THEN 'retrying'::sms_status
                              ELSE 'cancelled'::sms_status END,
                last_error = $2,
                next_attempt_at = $3
            FROM households h
            WHERE s.id = $1 AND s.status = 'sending' AND h.id = s.household_id
            RETURNING s.status
            ",
        )
        .bind(id)
        .bind(error)
        .bind(next_attempt_at)
        .fetch_optional(self.pool)
        .await?;
        Ok(status)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_failed(&self, id: SmsId, error: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE outgoing_sms SET status = 'failed', last_error = $2 WHERE id = $1 AND status = 'sending'",
        )
        .bind(id)
        .bind(error)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Cancel a claimed record without sending it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn cancel_sending(&self, id: SmsId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE outgoing_sms SET status = 'cancelled' WHERE id = $1 AND status = 'sending'")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Cancel everything still waiting to be sent for a parcel.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn cancel_pending_for_parcel(&self, parcel_id: ParcelId) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE outgoing_sms
            SET status = 'cancelled'
            WHERE parcel_id = $1 AND status IN ('queued', 'retrying')
            ",
        )
        .bind(parcel_id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// The live (non-cancelled) record for an intent and parcel.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_for_parcel(
        &self,
        intent: SmsIntent,
        parcel_id: ParcelId,
    ) -> Result<Option<SmsRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, SmsRow>(&format!(
            r"
            SELECT {SMS_COLUMNS}
            FROM outgoing_sms
            WHERE intent = $1 AND parcel_id = $2 AND status <> 'cancelled'
            ORDER BY created_at DESC
            LIMIT 1
            "
        ))
        .bind(intent)
        .bind(parcel_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Put a finished record back on the queue with a fresh attempt budget.
    ///
    /// Returns `None` unless the record is `sent` or `failed`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn requeue(
        &self,
        id: SmsId,
        now: DateTime<Utc>,
    ) -> Result<Option<SmsRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, SmsRow>(&format!(
            r"
            UPDATE outgoing_sms
            SET status = 'queued', attempt_count = 0, next_attempt_at = $2,
                last_error = NULL, provider_message_id = NULL, sent_at = NULL
            WHERE id = $1 AND status IN ('sent', 'failed')
            RETURNING {SMS_COLUMNS}
            "
        ))
        .bind(id)
        .bind(now)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// SMS history of a household, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_household(
        &self,
        household_id: HouseholdId,
    ) -> Result<Vec<SmsRecord>, RepositoryError> {
        let rows = sqlx::query_as::<_, SmsRow>(&format!(
            "SELECT {SMS_COLUMNS} FROM outgoing_sms WHERE household_id = $1 ORDER BY created_at DESC"
        ))
        .bind(household_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Parcels starting in `[from, until)` that have no pickup reminder yet.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn parcels_needing_reminder(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<ParcelId>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r"
            SELECT p.id
            FROM food_parcels p
            JOIN households h ON h.id = p.household_id
            WHERE p.deleted_at IS NULL
              AND NOT p.is_picked_up
              AND p.no_show_at IS NULL
              AND h.anonymized_at IS NULL
              AND p.earliest_pickup_time >= $1
              AND p.earliest_pickup_time < $2
              AND NOT EXISTS (
                  SELECT 1 FROM outgoing_sms s
                  WHERE s.parcel_id = p.id
                    AND s.intent = 'pickup_reminder'
                    AND s.status <> 'cancelled'
              )
            ORDER BY p.earliest_pickup_time
            ",
        )
        .bind(from)
        .bind(until)
        .fetch_all(self.pool)
        .await?;

        Ok(ids.into_iter().map(ParcelId::new).collect())
    }
}
