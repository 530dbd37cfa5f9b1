//! Outgoing SMS queue.
//!
//! Messages are rendered and stored when they are queued, then delivered by
//! [`SmsQueueService::dispatch_due`], which the CLI runs on a schedule and
//! staff can trigger from the API. Each claimed record counts one attempt.

use std::future::Future;

use chrono::{DateTime, Duration, Local, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, error, info, instrument, warn};

use foodbank_core::{HouseholdId, ParcelId, SmsId, SmsIntent, SmsStatus};

use crate::db::{
    HouseholdRepository, LocationRepository, NewSms, ParcelRepository, RepositoryError,
    SmsRepository,
};
use crate::error::AppError;
use crate::models::SmsRecord;
use crate::sms::{SmsBalance, SmsClient, SmsContext, SmsError, render};

/// Delay before retry `n`, indexed by the attempt that just failed.
pub const RETRY_DELAYS_MINUTES: [i64; 3] = [5, 15, 60];

/// How far ahead pickup reminders are queued.
pub const REMINDER_WINDOW_HOURS: i64 = 48;

/// Records claimed per dispatch pass unless the caller says otherwise.
pub const DEFAULT_DISPATCH_LIMIT: i64 = 50;

/// A record left in `sending` this long is claimed again.
pub const SENDING_LEASE_MINUTES: i64 = 10;

/// Backoff after a transient failure of attempt `attempt_count` (1-based).
///
/// `None` once the retries are used up.
#[must_use]
pub fn retry_delay(attempt_count: u32) -> Option<Duration> {
    let index = usize::try_from(attempt_count.checked_sub(1)?).ok()?;
    RETRY_DELAYS_MINUTES
        .get(index)
        .map(|minutes| Duration::minutes(*minutes))
}

/// What to record after a send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Sent,
    Retry(Duration),
    Failed,
}

/// Decide the next state of a record after attempt `attempt_count`.
///
/// Transient failures are retried on the backoff schedule, never sooner
/// than the provider's `Retry-After`.
#[must_use]
pub fn settle<T>(attempt_count: u32, result: &Result<T, SmsError>) -> Settlement {
    match result {
        Ok(_) => Settlement::Sent,
        Err(e) if e.is_transient() => retry_delay(attempt_count).map_or(Settlement::Failed, |delay| {
            let delay = match e {
                SmsError::RateLimited(secs) => i64::try_from(*secs)
                    .ok()
                    .and_then(Duration::try_seconds)
                    .map_or(delay, |retry_after| delay.max(retry_after)),
                _ => delay,
            };
            Settlement::Retry(delay)
        }),
        Err(_) => Settlement::Failed,
    }
}

/// Outcome of one dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub sent: usize,
    pub retried: usize,
    pub failed: usize,
    /// Records dropped because the household was anonymized.
    pub cancelled: usize,
    /// Records whose outcome could not be written; they are claimed again
    /// once the lease runs out.
    pub unrecorded: usize,
}

/// Queue storage used by [`dispatch_due`].
///
/// Every transition out of `sending` only applies while the record is
/// still `sending`.
pub trait SmsOutbox {
    /// Move up to `limit` due records to `sending`, counting the attempt.
    /// Records stuck in `sending` since before `stale_before` are due too.
    fn claim_due(
        &self,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<SmsRecord>, RepositoryError>> + Send;

    fn mark_sent(
        &self,
        id: SmsId,
        provider_message_id: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Schedule another attempt. Cancels instead when the household has
    /// been anonymized; returns the status written, if any.
    fn schedule_retry(
        &self,
        id: SmsId,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<SmsStatus>, RepositoryError>> + Send;

    fn mark_failed(
        &self,
        id: SmsId,
        error: &str,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    fn cancel(&self, id: SmsId) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

impl SmsOutbox for SmsRepository<'_> {
    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<SmsRecord>, RepositoryError> {
        SmsRepository::claim_due(self, now, stale_before, limit).await
    }

    async fn mark_sent(
        &self,
        id: SmsId,
        provider_message_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        SmsRepository::mark_sent(self, id, provider_message_id, now).await
    }

    async fn schedule_retry(
        &self,
        id: SmsId,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<Option<SmsStatus>, RepositoryError> {
        SmsRepository::schedule_retry(self, id, error, next_attempt_at).await
    }

    async fn mark_failed(&self, id: SmsId, error: &str) -> Result<(), RepositoryError> {
        SmsRepository::mark_failed(self, id, error).await
    }

    async fn cancel(&self, id: SmsId) -> Result<(), RepositoryError> {
        SmsRepository::cancel_sending(self, id).await
    }
}

/// Claim and deliver up to `limit` due messages.
///
/// A write that fails after a send is logged and counted; the pass goes
/// on with the remaining records.
///
/// # Errors
///
/// Returns `RepositoryError` only if the claim itself fails.
#[instrument(skip(outbox, client))]
pub async fn dispatch_due<O: SmsOutbox>(
    outbox: &O,
    client: &SmsClient,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<DispatchReport, RepositoryError> {
    let stale_before = now - Duration::minutes(SENDING_LEASE_MINUTES);
    let mut report = DispatchReport::default();

    for record in outbox.claim_due(now, stale_before, limit).await? {
        if record.is_scrubbed() {
            debug!(sms_id = %record.id, "Recipient anonymized, cancelling");
            match outbox.cancel(record.id).await {
                Ok(()) => report.cancelled += 1,
                Err(e) => {
                    error!(sms_id = %record.id, error = %e, "Failed to cancel SMS");
                    report.unrecorded += 1;
                }
            }
            continue;
        }

        let result = client.send(&record.to_e164, &record.text).await;
        let written = match (&result, settle(record.attempt_count, &result)) {
            (Ok(provider_id), _) => outbox
                .mark_sent(record.id, provider_id, now)
                .await
                .map(|()| report.sent += 1),
            (Err(e), Settlement::Retry(delay)) => {
                warn!(sms_id = %record.id, attempt = record.attempt_count, error = %e, "SMS send failed, retrying");
                outbox
                    .schedule_retry(record.id, &e.to_string(), now + delay)
                    .await
                    .map(|status| match status {
                        Some(SmsStatus::Cancelled) => report.cancelled += 1,
                        _ => report.retried += 1,
                    })
            }
            (Err(e), _) => {
                warn!(sms_id = %record.id, attempt = record.attempt_count, error = %e, "SMS send failed permanently");
                outbox
                    .mark_failed(record.id, &e.to_string())
                    .await
                    .map(|()| report.failed += 1)
            }
        };

        if let Err(e) = written {
            error!(sms_id = %record.id, error = %e, "Failed to record SMS outcome");
            report.unrecorded += 1;
        }
    }

    if report != DispatchReport::default() {
        info!(
            sent = report.sent,
            retried = report.retried,
            failed = report.failed,
            cancelled = report.cancelled,
            unrecorded = report.unrecorded,
            "SMS dispatch complete"
        );
    }
    Ok(report)
}

/// Queue and deliver SMS.
pub struct SmsQueueService {
    pool: PgPool,
    sms: Option<SmsClient>,
}

impl SmsQueueService {
    #[must_use]
    pub const fn new(pool: PgPool, sms: Option<SmsClient>) -> Self {
        Self { pool, sms }
    }

    fn client(&self) -> Result<&SmsClient, SmsError> {
        self.sms.as_ref().ok_or(SmsError::NotConfigured)
    }

    /// Render and queue a message for a household, optionally about a
    /// parcel.
    ///
    /// Returns `None` when nothing was queued: the household is anonymized
    /// or a live record for the same intent and parcel already exists.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the household or parcel is missing.
    #[instrument(skip(self, now), fields(intent = %intent, household_id = %household_id))]
    pub async fn enqueue(
        &self,
        intent: SmsIntent,
        household_id: HouseholdId,
        parcel_id: Option<ParcelId>,
        now: &DateTime<Local>,
    ) -> Result<Option<SmsRecord>, AppError> {
        let household = HouseholdRepository::new(&self.pool)
            .get(household_id)
            .await?
            .ok_or(AppError::NotFound("Household"))?;

        if household.is_anonymized() {
            debug!("Household anonymized, not queueing");
            return Ok(None);
        }

        let mut location_name = None;
        let mut pickup_window = None;
        if let Some(parcel_id) = parcel_id {
            let parcel = ParcelRepository::new(&self.pool)
                .get(parcel_id)
                .await?
                .filter(|p| p.household_id == household_id)
                .ok_or(AppError::NotFound("Parcel"))?;
            location_name = LocationRepository::new(&self.pool)
                .get(parcel.pickup_location_id)
                .await?
                .map(|l| l.name);
            pickup_window = Some((parcel.earliest_pickup_time, parcel.latest_pickup_time));
        }

        let ctx = SmsContext {
            first_name: &household.first_name,
            location_name: location_name.as_deref(),
            pickup_window,
        };
        let text = render(intent, household.locale, &ctx, &now.timezone());

        let record = SmsRepository::new(&self.pool)
            .insert(&NewSms {
                id: SmsId::generate(),
                intent,
                household_id,
                parcel_id,
                to_e164: household.phone_number.as_str().to_string(),
                text,
                next_attempt_at: now.with_timezone(&Utc),
            })
            .await?;

        match &record {
            Some(record) => info!(sms_id = %record.id, "SMS queued"),
            None => debug!("SMS already queued for this parcel"),
        }
        Ok(record)
    }

    /// Deliver up to `limit` due messages.
    ///
    /// # Errors
    ///
    /// Returns `SmsError::NotConfigured` without an SMS provider, or a
    /// database error if the claim fails. Provider failures are recorded
    /// per message.
    pub async fn dispatch_due(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<DispatchReport, AppError> {
        let client = self.client()?;
        let repo = SmsRepository::new(&self.pool);
        Ok(dispatch_due(&repo, client, now, limit).await?)
    }

    /// Queue pickup reminders for parcels starting within the next
    /// [`REMINDER_WINDOW_HOURS`] that have none yet.
    ///
    /// # Errors
    ///
    /// Returns error if a database query fails.
    #[instrument(skip(self))]
    pub async fn queue_reminders(&self, now: &DateTime<Local>) -> Result<usize, AppError> {
        let from = now.with_timezone(&Utc);
        let until = from + Duration::hours(REMINDER_WINDOW_HOURS);
        let parcels = SmsRepository::new(&self.pool)
            .parcels_needing_reminder(from, until)
            .await?;

        let mut queued = 0;
        for parcel_id in parcels {
            let Some(parcel) = ParcelRepository::new(&self.pool).get(parcel_id).await? else {
                continue;
            };
            if self
                .enqueue(
                    SmsIntent::PickupReminder,
                    parcel.household_id,
                    Some(parcel_id),
                    now,
                )
                .await?
                .is_some()
            {
                queued += 1;
            }
        }

        info!(queued, "Pickup reminders queued");
        Ok(queued)
    }

    /// Stop queued messages for a cancelled parcel.
    ///
    /// Returns whether a reminder had already gone out, in which case the
    /// household should be told about the cancellation.
    ///
    /// # Errors
    ///
    /// Returns error if a database query fails.
    pub async fn cancel_for_parcel(&self, parcel_id: ParcelId) -> Result<bool, AppError> {
        let repo = SmsRepository::new(&self.pool);
        let reminder = repo
            .find_for_parcel(SmsIntent::PickupReminder, parcel_id)
            .await?;
        let cancelled = repo.cancel_pending_for_parcel(parcel_id).await?;
        debug!(cancelled, "Pending SMS cancelled for parcel");
        Ok(reminder.is_some_and(|r| r.status == SmsStatus::Sent))
    }

    /// Send a parcel's pickup reminder again.
    ///
    /// A sent or failed reminder is put back on the queue; a parcel without
    /// one gets a new reminder.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the parcel does not belong to the
    /// household, and a conflict if the household is anonymized, the parcel
    /// is cancelled, or a reminder is still pending.
    #[instrument(skip(self, now))]
    pub async fn resend(
        &self,
        household_id: HouseholdId,
        parcel_id: ParcelId,
        now: &DateTime<Local>,
    ) -> Result<SmsRecord, AppError> {
        let household = HouseholdRepository::new(&self.pool)
            .get(household_id)
            .await?
            .ok_or(AppError::NotFound("Household"))?;
        if household.is_anonymized() {
            return Err(AppError::already_anonymized());
        }

        let parcel = ParcelRepository::new(&self.pool)
            .get(parcel_id)
            .await?
            .filter(|p| p.household_id == household_id)
            .ok_or(AppError::NotFound("Parcel"))?;
        if parcel.is_cancelled() {
            return Err(AppError::conflict(
                "PARCEL_CANCELLED",
                "Parcel has been cancelled",
            ));
        }

        let repo = SmsRepository::new(&self.pool);
        let pending = || AppError::conflict("SMS_ALREADY_PENDING", "A reminder is already queued");

        let record = match repo
            .find_for_parcel(SmsIntent::PickupReminder, parcel_id)
            .await?
        {
            Some(existing) if matches!(existing.status, SmsStatus::Sent | SmsStatus::Failed) => repo
                .requeue(existing.id, now.with_timezone(&Utc))
                .await?
                .ok_or_else(pending)?,
            Some(_) => return Err(pending()),
            None => self
                .enqueue(SmsIntent::PickupReminder, household_id, Some(parcel_id), now)
                .await?
                .ok_or_else(pending)?,
        };

        info!(sms_id = %record.id, "Reminder re-queued");
        Ok(record)
    }

    /// Provider account balance.
    ///
    /// # Errors
    ///
    /// Returns `SmsError::NotConfigured` without an SMS provider.
    pub async fn balance(&self) -> Result<SmsBalance, AppError> {
        Ok(self.client()?.balance().await?)
    }
}
