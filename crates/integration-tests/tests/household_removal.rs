//! Integration tests for household removal.
//!
//! The removal flow runs against an in-memory store that mirrors the
//! repository's transactional behavior: delete when there is no
//! non-cancelled parcel, anonymize otherwise.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use pretty_assertions::assert_eq;

use foodbank_admin::db::{RemovalCommit, RepositoryError};
use foodbank_admin::services::removal::RemovalCandidate;
use foodbank_admin::services::{
    AuthenticatedActor, RemovalError, RemovalInput, RemovalStore, ViewCache, remove_household,
};
use foodbank_core::{HouseholdId, RemovalErrorCode, RemovalOutcome};
use foodbank_integration_tests::local;

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Debug, Clone)]
struct StoredParcel {
    earliest_pickup: DateTime<Utc>,
    cancelled: bool,
}

#[derive(Debug, Clone)]
struct StoredHousehold {
    last_name: String,
    anonymized_at: Option<DateTime<Utc>>,
    anonymized_by: Option<String>,
    parcels: Vec<StoredParcel>,
}

#[derive(Default)]
struct MemoryStore {
    households: Mutex<HashMap<HouseholdId, StoredHousehold>>,
}

impl MemoryStore {
    fn insert(&self, last_name: &str, parcels: Vec<StoredParcel>) -> HouseholdId {
        let id = HouseholdId::generate();
        self.households.lock().unwrap().insert(
            id,
            StoredHousehold {
                last_name: last_name.to_string(),
                anonymized_at: None,
                anonymized_by: None,
                parcels,
            },
        );
        id
    }

    fn get(&self, id: HouseholdId) -> Option<StoredHousehold> {
        self.households.lock().unwrap().get(&id).cloned()
    }

    fn upcoming(household: &StoredHousehold, today_start: DateTime<Utc>) -> i64 {
        let count = household
            .parcels
            .iter()
            .filter(|p| !p.cancelled && p.earliest_pickup >= today_start)
            .count();
        i64::try_from(count).unwrap()
    }
}

impl RemovalStore for MemoryStore {
    async fn removal_candidate(
        &self,
        id: HouseholdId,
    ) -> Result<Option<RemovalCandidate>, RepositoryError> {
        Ok(self.get(id).map(|h| RemovalCandidate {
            last_name: h.last_name,
            anonymized_at: h.anonymized_at,
        }))
    }

    async fn count_upcoming_parcels(
        &self,
        id: HouseholdId,
        today_start: DateTime<Utc>,
    ) -> Result<i64, RepositoryError> {
        Ok(self
            .get(id)
            .map_or(0, |h| Self::upcoming(&h, today_start)))
    }

    async fn remove(
        &self,
        id: HouseholdId,
        actor: &str,
        today_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<RemovalCommit, RepositoryError> {
        let mut households = self.households.lock().unwrap();
        let Some(household) = households.get_mut(&id) else {
            return Ok(RemovalCommit::AlreadyRemoved);
        };
        if household.anonymized_at.is_some() {
            return Ok(RemovalCommit::AlreadyRemoved);
        }
        let upcoming = Self::upcoming(household, today_start);
        if upcoming > 0 {
            return Ok(RemovalCommit::UpcomingParcels(upcoming));
        }

        if household.parcels.iter().all(|p| p.cancelled) {
            households.remove(&id);
            return Ok(RemovalCommit::Removed(RemovalOutcome::HardDeleted));
        }

        household.last_name = String::new();
        household.anonymized_at = Some(now);
        household.anonymized_by = Some(actor.to_string());
        Ok(RemovalCommit::Removed(RemovalOutcome::Anonymized))
    }
}

/// A store whose writes always fail.
struct BrokenStore;

impl RemovalStore for BrokenStore {
    async fn removal_candidate(
        &self,
        _id: HouseholdId,
    ) -> Result<Option<RemovalCandidate>, RepositoryError> {
        Ok(Some(RemovalCandidate {
            last_name: "Andersson".to_string(),
            anonymized_at: None,
        }))
    }

    async fn count_upcoming_parcels(
        &self,
        _id: HouseholdId,
        _today_start: DateTime<Utc>,
    ) -> Result<i64, RepositoryError> {
        Ok(0)
    }

    async fn remove(
        &self,
        _id: HouseholdId,
        _actor: &str,
        _today_start: DateTime<Utc>,
        _now: DateTime<Utc>,
    ) -> Result<RemovalCommit, RepositoryError> {
        Err(RepositoryError::DataCorruption("connection reset".to_string()))
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn actor() -> AuthenticatedActor {
    AuthenticatedActor {
        github_id: 7,
        login: "staffer".to_string(),
        name: None,
    }
}

fn input(id: HouseholdId, confirmation: &str) -> RemovalInput {
    RemovalInput {
        household_id: id,
        last_name_confirmation: confirmation.to_string(),
    }
}

fn parcel_at(at: DateTime<Utc>) -> StoredParcel {
    StoredParcel {
        earliest_pickup: at,
        cancelled: false,
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_household_without_parcels_is_deleted() {
    let store = MemoryStore::default();
    let id = store.insert("Andersson", Vec::new());
    let now = local(2026, 10, 19, 15, 0);

    let outcome = remove_household(
        &store,
        &ViewCache::default(),
        &input(id, "Andersson"),
        &actor(),
        &now,
    )
    .await
    .unwrap();

    assert_eq!(outcome, RemovalOutcome::HardDeleted);
    assert!(store.get(id).is_none());
}

#[tokio::test]
async fn test_confirmation_is_case_insensitive() {
    let store = MemoryStore::default();
    let id = store.insert("Andersson", Vec::new());
    let now = local(2026, 10, 19, 15, 0);

    let outcome = remove_household(
        &store,
        &ViewCache::default(),
        &input(id, "andersson"),
        &actor(),
        &now,
    )
    .await
    .unwrap();

    assert_eq!(outcome, RemovalOutcome::HardDeleted);
}

#[tokio::test]
async fn test_parcel_earlier_today_blocks_removal() {
    let store = MemoryStore::default();
    let this_morning = local(2026, 10, 19, 9, 0).with_timezone(&Utc);
    let id = store.insert("Andersson", vec![parcel_at(this_morning)]);
    let now = local(2026, 10, 19, 15, 0);

    let err = remove_household(
        &store,
        &ViewCache::default(),
        &input(id, "Andersson"),
        &actor(),
        &now,
    )
    .await
    .unwrap_err();

    assert_eq!(err, RemovalError::HasUpcomingParcels { count: 1 });
    assert_eq!(err.code(), RemovalErrorCode::HasUpcomingParcels);
    assert!(store.get(id).is_some_and(|h| h.anonymized_at.is_none()));
}

#[tokio::test]
async fn test_already_anonymized_wins_over_confirmation() {
    let store = MemoryStore::default();
    let yesterday = local(2026, 10, 18, 10, 0).with_timezone(&Utc);
    let id = store.insert("Andersson", vec![parcel_at(yesterday)]);
    let now = local(2026, 10, 19, 15, 0);

    remove_household(
        &store,
        &ViewCache::default(),
        &input(id, "Andersson"),
        &actor(),
        &now,
    )
    .await
    .unwrap();

    for confirmation in ["Andersson", "wrong", ""] {
        let err = remove_household(
            &store,
            &ViewCache::default(),
            &input(id, confirmation),
            &actor(),
            &now,
        )
        .await
        .unwrap_err();
        assert_eq!(err, RemovalError::AlreadyAnonymized);
    }
}

#[tokio::test]
async fn test_misspelled_confirmation_is_rejected() {
    let store = MemoryStore::default();
    let id = store.insert("Andersson", Vec::new());
    let now = local(2026, 10, 19, 15, 0);

    let err = remove_household(
        &store,
        &ViewCache::default(),
        &input(id, "Anderson"),
        &actor(),
        &now,
    )
    .await
    .unwrap_err();

    assert_eq!(err, RemovalError::ConfirmationMismatch);
    assert!(store.get(id).is_some());
}

// =============================================================================
// Outcomes and edge cases
// =============================================================================

#[tokio::test]
async fn test_past_parcels_lead_to_anonymization() {
    let store = MemoryStore::default();
    let last_week = local(2026, 10, 12, 10, 0).with_timezone(&Utc);
    let id = store.insert("Andersson", vec![parcel_at(last_week)]);
    let now = local(2026, 10, 19, 15, 0);

    let outcome = remove_household(
        &store,
        &ViewCache::default(),
        &input(id, "  ANDERSSON "),
        &actor(),
        &now,
    )
    .await
    .unwrap();

    assert_eq!(outcome, RemovalOutcome::Anonymized);
    let stored = store.get(id).unwrap();
    assert_eq!(stored.anonymized_at, Some(now.with_timezone(&Utc)));
    assert_eq!(stored.anonymized_by.as_deref(), Some("staffer"));
    assert_eq!(stored.last_name, "");
}

#[tokio::test]
async fn test_cancelled_upcoming_parcels_do_not_block() {
    let store = MemoryStore::default();
    let tomorrow = local(2026, 10, 20, 10, 0).with_timezone(&Utc);
    let id = store.insert(
        "Andersson",
        vec![StoredParcel {
            earliest_pickup: tomorrow,
            cancelled: true,
        }],
    );
    let now = local(2026, 10, 19, 15, 0);

    let outcome = remove_household(
        &store,
        &ViewCache::default(),
        &input(id, "Andersson"),
        &actor(),
        &now,
    )
    .await
    .unwrap();

    assert_eq!(outcome, RemovalOutcome::HardDeleted);
    assert!(store.get(id).is_none());
}

#[tokio::test]
async fn test_past_parcel_with_cancelled_future_one_is_anonymized() {
    let store = MemoryStore::default();
    let last_week = local(2026, 10, 12, 10, 0).with_timezone(&Utc);
    let tomorrow = local(2026, 10, 20, 10, 0).with_timezone(&Utc);
    let id = store.insert(
        "Andersson",
        vec![
            parcel_at(last_week),
            StoredParcel {
                earliest_pickup: tomorrow,
                cancelled: true,
            },
        ],
    );
    let now = local(2026, 10, 19, 15, 0);

    let outcome = remove_household(
        &store,
        &ViewCache::default(),
        &input(id, "Andersson"),
        &actor(),
        &now,
    )
    .await
    .unwrap();

    assert_eq!(outcome, RemovalOutcome::Anonymized);
    assert!(store.get(id).is_some_and(|h| h.anonymized_at.is_some()));
}

#[tokio::test]
async fn test_upcoming_count_includes_every_future_parcel() {
    let store = MemoryStore::default();
    let now = local(2026, 10, 19, 23, 30);
    let parcels = vec![
        parcel_at(local(2026, 10, 19, 0, 0).with_timezone(&Utc)),
        parcel_at(local(2026, 10, 25, 12, 0).with_timezone(&Utc)),
        parcel_at(local(2026, 10, 18, 23, 59).with_timezone(&Utc)),
    ];
    let id = store.insert("Andersson", parcels);

    let err = remove_household(
        &store,
        &ViewCache::default(),
        &input(id, "Andersson"),
        &actor(),
        &now,
    )
    .await
    .unwrap_err();

    assert_eq!(err, RemovalError::HasUpcomingParcels { count: 2 });
}

#[tokio::test]
async fn test_unknown_household_is_not_found() {
    let store = MemoryStore::default();
    let now = local(2026, 10, 19, 15, 0);

    let err = remove_household(
        &store,
        &ViewCache::default(),
        &input(HouseholdId::generate(), "Andersson"),
        &actor(),
        &now,
    )
    .await
    .unwrap_err();

    assert_eq!(err, RemovalError::NotFound);
    assert_eq!(err.code(), RemovalErrorCode::NotFound);
}

#[tokio::test]
async fn test_store_failure_is_removal_failed() {
    let now = local(2026, 10, 19, 15, 0);

    let err = remove_household(
        &BrokenStore,
        &ViewCache::default(),
        &input(HouseholdId::generate(), "Andersson"),
        &actor(),
        &now,
    )
    .await
    .unwrap_err();

    assert_eq!(err.code(), RemovalErrorCode::RemovalFailed);
    assert!(err.to_string().contains("connection reset"));
}
