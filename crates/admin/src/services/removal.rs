//! Household removal.
//!
//! Preconditions are checked in a fixed order and the first failure wins:
//! the household must exist, must not be anonymized, the typed last name
//! must match, and there must be no upcoming parcels. A household whose
//! parcels were all cancelled is deleted outright; otherwise it is
//! anonymized so the parcel statistics survive.
//!
//! Every failure comes back as a [`RemovalError`]; persistence failures are
//! folded into [`RemovalError::Failed`].

use std::future::Future;

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use foodbank_core::{
    HouseholdId, RemovalErrorCode, RemovalOutcome, confirmation_matches, start_of_day,
};

use super::auth::AuthenticatedActor;
use super::view_cache::ViewCache;
use crate::db::{HouseholdRepository, RemovalCommit, RepositoryError};

/// What the precondition checks need to know about a household.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalCandidate {
    pub last_name: String,
    pub anonymized_at: Option<DateTime<Utc>>,
}

/// Persistence used by [`remove_household`].
pub trait RemovalStore {
    /// Last name and anonymization timestamp, `None` if the household does
    /// not exist.
    fn removal_candidate(
        &self,
        id: HouseholdId,
    ) -> impl Future<Output = Result<Option<RemovalCandidate>, RepositoryError>> + Send;

    /// Non-cancelled parcels with earliest pickup at or after `today_start`.
    fn count_upcoming_parcels(
        &self,
        id: HouseholdId,
        today_start: DateTime<Utc>,
    ) -> impl Future<Output = Result<i64, RepositoryError>> + Send;

    /// Delete or anonymize in one transaction conditioned on the household
    /// not being anonymized.
    fn remove(
        &self,
        id: HouseholdId,
        actor: &str,
        today_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<RemovalCommit, RepositoryError>> + Send;
}

impl RemovalStore for HouseholdRepository<'_> {
    async fn removal_candidate(
        &self,
        id: HouseholdId,
    ) -> Result<Option<RemovalCandidate>, RepositoryError> {
        Ok(HouseholdRepository::removal_candidate(self, id)
            .await?
            .map(|(last_name, anonymized_at)| RemovalCandidate {
                last_name,
                anonymized_at,
            }))
    }

    async fn count_upcoming_parcels(
        &self,
        id: HouseholdId,
        today_start: DateTime<Utc>,
    ) -> Result<i64, RepositoryError> {
        HouseholdRepository::count_upcoming_parcels(self, id, today_start).await
    }

    async fn remove(
        &self,
        id: HouseholdId,
        actor: &str,
        today_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<RemovalCommit, RepositoryError> {
        HouseholdRepository::remove(self, id, actor, today_start, now).await
    }
}

/// Removal request.
#[derive(Debug, Clone)]
pub struct RemovalInput {
    pub household_id: HouseholdId,
    pub last_name_confirmation: String,
}

/// Body of `POST /api/households/{id}/remove`.
#[derive(Debug, Clone, Deserialize)]
pub struct RemovalRequest {
    pub last_name_confirmation: String,
}

/// Why a household could not be removed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemovalError {
    #[error("Household not found")]
    NotFound,

    #[error("Household has already been anonymized")]
    AlreadyAnonymized,

    #[error("Last name confirmation does not match")]
    ConfirmationMismatch,

    #[error(
        "Household has {count} upcoming parcel(s); reschedule or cancel the upcoming parcel(s) first"
    )]
    HasUpcomingParcels { count: i64 },

    #[error("Removal failed: {0}")]
    Failed(String),
}

impl RemovalError {
    #[must_use]
    pub const fn code(&self) -> RemovalErrorCode {
        match self {
            Self::NotFound => RemovalErrorCode::NotFound,
            Self::AlreadyAnonymized => RemovalErrorCode::AlreadyAnonymized,
            Self::ConfirmationMismatch => RemovalErrorCode::ConfirmationMismatch,
            Self::HasUpcomingParcels { .. } => RemovalErrorCode::HasUpcomingParcels,
            Self::Failed(_) => RemovalErrorCode::RemovalFailed,
        }
    }
}

impl From<RepositoryError> for RemovalError {
    fn from(err: RepositoryError) -> Self {
        Self::Failed(err.to_string())
    }
}

/// Remove a household after checking every precondition.
///
/// `now` carries the organization's time zone; "upcoming" means on or
/// after midnight of `now`'s local date.
///
/// # Errors
///
/// See [`RemovalError`]; checks run in declaration order.
#[instrument(skip_all, fields(household_id = %input.household_id, actor = %actor.login))]
pub async fn remove_household<S, Tz>(
    store: &S,
    views: &ViewCache,
    input: &RemovalInput,
    actor: &AuthenticatedActor,
    now: &DateTime<Tz>,
) -> Result<RemovalOutcome, RemovalError>
where
    S: RemovalStore + Sync,
    Tz: TimeZone,
{
    let id = input.household_id;
    let today_start = start_of_day(now);
    let now_utc = now.with_timezone(&Utc);

    let candidate = store
        .removal_candidate(id)
        .await?
        .ok_or(RemovalError::NotFound)?;

    if candidate.anonymized_at.is_some() {
        return Err(RemovalError::AlreadyAnonymized);
    }

    if !confirmation_matches(&input.last_name_confirmation, &candidate.last_name) {
        return Err(RemovalError::ConfirmationMismatch);
    }

    let count = store.count_upcoming_parcels(id, today_start).await?;
    if count > 0 {
        return Err(RemovalError::HasUpcomingParcels { count });
    }

    let outcome = match store.remove(id, &actor.login, today_start, now_utc).await? {
        RemovalCommit::Removed(outcome) => outcome,
        RemovalCommit::AlreadyRemoved => {
            warn!("Household was removed concurrently");
            return Err(RemovalError::AlreadyAnonymized);
        }
        RemovalCommit::UpcomingParcels(count) => {
            return Err(RemovalError::HasUpcomingParcels { count });
        }
    };

    views.invalidate_household(id).await;
    info!(outcome = ?outcome, "Household removed");

    Ok(outcome)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_upcoming_message_carries_count() {
        let err = RemovalError::HasUpcomingParcels { count: 2 };
        assert_eq!(
            err.to_string(),
            "Household has 2 upcoming parcel(s); reschedule or cancel the upcoming parcel(s) first"
        );
        assert_eq!(err.code(), RemovalErrorCode::HasUpcomingParcels);
    }

    #[test]
    fn test_repository_errors_become_removal_failed() {
        let err: RemovalError = RepositoryError::DataCorruption("bad row".to_string()).into();
        assert_eq!(err.code(), RemovalErrorCode::RemovalFailed);
        assert!(err.to_string().contains("bad row"));
    }
}
