//! Parcel scheduling and outcomes.
//!
//! Cancel and no-show follow the same date-only rule as removal: a parcel
//! is upcoming for the whole of its pickup date.

use chrono::{DateTime, Local, Utc};
use tracing::{info, instrument, warn};

use foodbank_core::{
    HouseholdId, ParcelId, SmsIntent, is_upcoming,
    schedule::{day_bounds, local_date},
    start_of_day,
};

use super::auth::AuthenticatedActor;
use super::sms_queue::SmsQueueService;
use super::validation::ValidationError;
use crate::db::{ParcelInsert, ParcelRepository};
use crate::error::AppError;
use crate::models::{FoodParcel, ScheduleParcelInput};
use crate::state::AppState;

/// Check a pickup window before it reaches the database.
///
/// # Errors
///
/// Returns `ValidationError::Invalid` if the window is empty or spans more
/// than one local date, and `PARCEL_IN_PAST` if its date has passed.
pub fn check_window(
    earliest: DateTime<Utc>,
    latest: DateTime<Utc>,
    now: &DateTime<Local>,
) -> Result<(), AppError> {
    if earliest >= latest {
        return Err(ValidationError::Invalid {
            field: "latest_pickup_time",
            message: "must be after earliest_pickup_time".to_string(),
        }
        .into());
    }
    let tz = now.timezone();
    if local_date(earliest, &tz) != local_date(latest, &tz) {
        return Err(ValidationError::Invalid {
            field: "latest_pickup_time",
            message: "must be on the same day as earliest_pickup_time".to_string(),
        }
        .into());
    }
    if !is_upcoming(earliest, now) {
        return Err(AppError::conflict(
            "PARCEL_IN_PAST",
            "Pickup date has already passed",
        ));
    }
    Ok(())
}

/// Why an outcome update matched no row.
fn explain_unchanged(parcel: Option<FoodParcel>) -> AppError {
    match parcel {
        None => AppError::NotFound("Parcel"),
        Some(p) if p.is_cancelled() => {
            AppError::conflict("PARCEL_CANCELLED", "Parcel has been cancelled")
        }
        Some(p) if p.has_outcome() => AppError::conflict(
            "PARCEL_COMPLETED",
            "Parcel already has a recorded outcome",
        ),
        Some(_) => AppError::conflict("PARCEL_IN_PAST", "Pickup date has already passed"),
    }
}

/// Parcel operations on behalf of a staff member.
pub struct ParcelService<'a> {
    state: &'a AppState,
}

impl<'a> ParcelService<'a> {
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    fn repo(&self) -> ParcelRepository<'a> {
        ParcelRepository::new(self.state.pool())
    }

    /// Schedule a parcel, respecting the location's daily capacity.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad window, `NotFound` for an
    /// unknown household or location, `ALREADY_ANONYMIZED`, or
    /// `LOCATION_FULL`.
    #[instrument(skip(self, input, actor, now), fields(actor = %actor.login))]
    pub async fn schedule(
        &self,
        household_id: HouseholdId,
        input: &ScheduleParcelInput,
        actor: &AuthenticatedActor,
        now: &DateTime<Local>,
    ) -> Result<FoodParcel, AppError> {
        check_window(input.earliest_pickup_time, input.latest_pickup_time, now)?;

        let tz = now.timezone();
        let day = day_bounds(local_date(input.earliest_pickup_time, &tz), &tz);

        let parcel = match self
            .repo()
            .create(
                ParcelId::generate(),
                household_id,
                input.pickup_location_id,
                input.earliest_pickup_time,
                input.latest_pickup_time,
                day,
                actor.login(),
            )
            .await?
        {
            ParcelInsert::Created(parcel) => parcel,
            ParcelInsert::HouseholdNotFound => return Err(AppError::NotFound("Household")),
            ParcelInsert::HouseholdAnonymized => return Err(AppError::already_anonymized()),
            ParcelInsert::LocationNotFound => return Err(AppError::NotFound("Pickup location")),
            ParcelInsert::LocationFull { max } => {
                return Err(AppError::conflict(
                    "LOCATION_FULL",
                    format!("Pickup location is fully booked on that date ({max} parcels)"),
                ));
            }
        };

        self.state.views().invalidate_household(household_id).await;
        info!(parcel_id = %parcel.id, "Parcel scheduled");
        Ok(parcel)
    }

    /// Cancel an upcoming parcel.
    ///
    /// Queued messages for the parcel are cancelled; if a reminder already
    /// went out, the household is told about the cancellation.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `PARCEL_CANCELLED`, `PARCEL_COMPLETED` or
    /// `PARCEL_IN_PAST`.
    #[instrument(skip(self, actor, now), fields(actor = %actor.login))]
    pub async fn cancel(
        &self,
        id: ParcelId,
        actor: &AuthenticatedActor,
        now: &DateTime<Local>,
    ) -> Result<FoodParcel, AppError> {
        let repo = self.repo();
        let Some(parcel) = repo
            .cancel(id, actor.login(), start_of_day(now), now.with_timezone(&Utc))
            .await?
        else {
            return Err(explain_unchanged(repo.get(id).await?));
        };

        self.state
            .views()
            .invalidate_household(parcel.household_id)
            .await;
        info!(parcel_id = %id, "Parcel cancelled");

        // The cancellation is committed; SMS follow-up failures are only logged.
        let queue = SmsQueueService::new(self.state.pool().clone(), self.state.sms().cloned());
        match queue.cancel_for_parcel(id).await {
            Ok(true) => {
                if let Err(e) = queue
                    .enqueue(SmsIntent::ParcelCancelled, parcel.household_id, Some(id), now)
                    .await
                {
                    warn!(error = %e, "Failed to queue cancellation SMS");
                }
            }
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Failed to cancel queued SMS"),
        }

        Ok(parcel)
    }

    /// Record that the household collected the parcel.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `PARCEL_CANCELLED` or `PARCEL_COMPLETED`.
    #[instrument(skip(self, actor), fields(actor = %actor.login))]
    pub async fn mark_picked_up(
        &self,
        id: ParcelId,
        actor: &AuthenticatedActor,
    ) -> Result<FoodParcel, AppError> {
        let repo = self.repo();
        let Some(parcel) = repo.mark_picked_up(id, actor.login(), Utc::now()).await? else {
            return Err(explain_unchanged(repo.get(id).await?));
        };

        self.state
            .views()
            .invalidate_household(parcel.household_id)
            .await;
        info!(parcel_id = %id, "Parcel picked up");
        Ok(parcel)
    }

    /// Record that the household did not come.
    ///
    /// Only parcels whose pickup date is today or earlier qualify.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `PARCEL_CANCELLED`, `PARCEL_COMPLETED` or
    /// `PARCEL_NOT_DUE`.
    #[instrument(skip(self, actor, now), fields(actor = %actor.login))]
    pub async fn mark_no_show(
        &self,
        id: ParcelId,
        actor: &AuthenticatedActor,
        now: &DateTime<Local>,
    ) -> Result<FoodParcel, AppError> {
        let (_, today_end) = day_bounds(now.date_naive(), &now.timezone());
        let repo = self.repo();
        let Some(parcel) = repo
            .mark_no_show(id, actor.login(), today_end, now.with_timezone(&Utc))
            .await?
        else {
            return Err(match repo.get(id).await? {
                Some(p) if !p.is_cancelled() && !p.has_outcome() => AppError::conflict(
                    "PARCEL_NOT_DUE",
                    "Pickup date has not been reached",
                ),
                other => explain_unchanged(other),
            });
        };

        self.state
            .views()
            .invalidate_household(parcel.household_id)
            .await;
        info!(parcel_id = %id, "Parcel marked as no-show");
        Ok(parcel)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, h, min, 0).single().unwrap()
    }

    #[test]
    fn test_window_must_be_ordered() {
        let now = local(2026, 10, 19, 9, 0);
        let start = local(2026, 10, 20, 10, 0).with_timezone(&Utc);
        let err = check_window(start, start, &now).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_window_must_stay_on_one_day() {
        let now = local(2026, 10, 19, 9, 0);
        let start = local(2026, 10, 20, 22, 0).with_timezone(&Utc);
        let end = local(2026, 10, 21, 1, 0).with_timezone(&Utc);
        assert!(check_window(start, end, &now).is_err());
    }

    #[test]
    fn test_earlier_today_is_still_schedulable() {
        let now = local(2026, 10, 19, 15, 0);
        let start = local(2026, 10, 19, 8, 0).with_timezone(&Utc);
        assert!(check_window(start, start + Duration::hours(1), &now).is_ok());
    }

    #[test]
    fn test_yesterday_is_in_the_past() {
        let now = local(2026, 10, 19, 9, 0);
        let start = local(2026, 10, 18, 10, 0).with_timezone(&Utc);
        let err = check_window(start, start + Duration::hours(1), &now).unwrap_err();
        assert_eq!(err.code(), "PARCEL_IN_PAST");
    }

    #[test]
    fn test_unchanged_outcome_explanations() {
        assert_eq!(explain_unchanged(None).code(), "NOT_FOUND");
    }
}
