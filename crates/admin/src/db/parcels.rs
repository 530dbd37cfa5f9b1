//! Food parcel repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use foodbank_core::{HouseholdId, ParcelId, PickupLocationId};

use super::RepositoryError;
use crate::models::FoodParcel;

/// Result of a capacity-checked parcel insert.
#[derive(Debug, Clone)]
pub enum ParcelInsert {
    Created(FoodParcel),
    HouseholdNotFound,
    HouseholdAnonymized,
    LocationNotFound,
    /// The location already has `max` parcels on that date.
    LocationFull { max: i32 },
}

#[derive(Debug, sqlx::FromRow)]
struct ParcelRow {
    id: Uuid,
    household_id: Uuid,
    pickup_location_id: Uuid,
    earliest_pickup_time: DateTime<Utc>,
    latest_pickup_time: DateTime<Utc>,
    is_picked_up: bool,
    picked_up_at: Option<DateTime<Utc>>,
    picked_up_by: Option<String>,
    no_show_at: Option<DateTime<Utc>>,
    no_show_by: Option<String>,
    deleted_at: Option<DateTime<Utc>>,
    deleted_by: Option<String>,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ParcelRow> for FoodParcel {
    fn from(row: ParcelRow) -> Self {
        Self {
            id: ParcelId::new(row.id),
            household_id: HouseholdId::new(row.household_id),
            pickup_location_id: PickupLocationId::new(row.pickup_location_id),
            earliest_pickup_time: row.earliest_pickup_time,
            latest_pickup_time: row.latest_pickup_time,
            is_picked_up: row.is_picked_up,
            picked_up_at: row.picked_up_at,
            picked_up_by: row.picked_up_by,
            no_show_at: row.no_show_at,
            no_show_by: row.no_show_by,
            deleted_at: row.deleted_at,
            deleted_by: row.deleted_by,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ParcelWithLocationRow {
    #[sqlx(flatten)]
    parcel: ParcelRow,
    location_name: String,
}

const PARCEL_COLUMNS: &str = "id, household_id, pickup_location_id, earliest_pickup_time, \
     latest_pickup_time, is_picked_up, picked_up_at, picked_up_by, no_show_at, no_show_by, \
     deleted_at, deleted_by, created_by, created_at";

/// Repository for food parcel database operations.
pub struct ParcelRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ParcelRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a parcel by ID, including cancelled ones.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ParcelId) -> Result<Option<FoodParcel>, RepositoryError> {
        let row = sqlx::query_as::<_, ParcelRow>(&format!(
            "SELECT {PARCEL_COLUMNS} FROM food_parcels WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Non-cancelled parcels of a household with their location name,
    /// latest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_household(
        &self,
        household_id: HouseholdId,
    ) -> Result<Vec<(FoodParcel, String)>, RepositoryError> {
        let rows = sqlx::query_as::<_, ParcelWithLocationRow>(
            r"
            SELECT p.id, p.household_id, p.pickup_location_id, p.earliest_pickup_time,
                   p.latest_pickup_time, p.is_picked_up, p.picked_up_at, p.picked_up_by,
                   p.no_show_at, p.no_show_by, p.deleted_at, p.deleted_by, p.created_by,
                   p.created_at, l.name AS location_name
            FROM food_parcels p
            JOIN pickup_locations l ON l.id = p.pickup_location_id
            WHERE p.household_id = $1 AND p.deleted_at IS NULL
            ORDER BY p.earliest_pickup_time DESC
            ",
        )
        .bind(household_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.parcel.into(), row.location_name))
            .collect())
    }

    /// Insert a parcel if the household is active and the location has room
    /// on that date.
    ///
    /// The location row is locked for the duration of the transaction so two
    /// concurrent inserts cannot both take the last slot.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        id: ParcelId,
        household_id: HouseholdId,
        location_id: PickupLocationId,
        earliest: DateTime<Utc>,
        latest: DateTime<Utc>,
        day: (DateTime<Utc>, DateTime<Utc>),
        created_by: &str,
    ) -> Result<ParcelInsert, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let household = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            "SELECT anonymized_at FROM households WHERE id = $1 FOR SHARE",
        )
        .bind(household_id)
        .fetch_optional(&mut *tx)
        .await?;
        match household {
            None => return Ok(ParcelInsert::HouseholdNotFound),
            Some(Some(_)) => return Ok(ParcelInsert::HouseholdAnonymized),
            Some(None) => {}
        }

        let capacity = sqlx::query_scalar::<_, Option<i32>>(
            "SELECT parcels_max_per_day FROM pickup_locations WHERE id = $1 FOR UPDATE",
        )
        .bind(location_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(capacity) = capacity else {
            return Ok(ParcelInsert::LocationNotFound);
        };

        if let Some(max) = capacity {
            let booked = sqlx::query_scalar::<_, i64>(
                r"
                SELECT COUNT(*)
                FROM food_parcels
                WHERE pickup_location_id = $1
                  AND deleted_at IS NULL
                  AND earliest_pickup_time >= $2
                  AND earliest_pickup_time < $3
                ",
            )
            .bind(location_id)
            .bind(day.0)
            .bind(day.1)
            .fetch_one(&mut *tx)
            .await?;
            if booked >= i64::from(max) {
                return Ok(ParcelInsert::LocationFull { max });
            }
        }

        let row = sqlx::query_as::<_, ParcelRow>(&format!(
            r"
            INSERT INTO food_parcels
                (id, household_id, pickup_location_id, earliest_pickup_time, latest_pickup_time, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PARCEL_COLUMNS}
            "
        ))
        .bind(id)
        .bind(household_id)
        .bind(location_id)
        .bind(earliest)
        .bind(latest)
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(ParcelInsert::Created(row.into()))
    }

    /// Soft-delete an upcoming parcel without a recorded outcome.
    ///
    /// Returns `None` when the parcel is not cancellable.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn cancel(
        &self,
        id: ParcelId,
        by: &str,
        today_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<FoodParcel>, RepositoryError> {
        let row = sqlx::query_as::<_, ParcelRow>(&format!(
            r"
            UPDATE food_parcels
            SET deleted_at = $3, deleted_by = $2
            WHERE id = $1
              AND deleted_at IS NULL
              AND NOT is_picked_up
              AND no_show_at IS NULL
              AND earliest_pickup_time >= $4
            RETURNING {PARCEL_COLUMNS}
            "
        ))
        .bind(id)
        .bind(by)
        .bind(now)
        .bind(today_start)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Record a pickup. Returns `None` when an outcome already exists or
    /// the parcel is cancelled.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_picked_up(
        &self,
        id: ParcelId,
        by: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<FoodParcel>, RepositoryError> {
        let row = sqlx::query_as::<_, ParcelRow>(&format!(
            r"
            UPDATE food_parcels
            SET is_picked_up = TRUE, picked_up_at = $3, picked_up_by = $2
            WHERE id = $1
              AND deleted_at IS NULL
              AND NOT is_picked_up
              AND no_show_at IS NULL
            RETURNING {PARCEL_COLUMNS}
            "
        ))
        .bind(id)
        .bind(by)
        .bind(now)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Record a no-show for a parcel whose pickup date has been reached.
    ///
    /// `today_end` is the first instant of tomorrow; parcels at or after it
    /// are left untouched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_no_show(
        &self,
        id: ParcelId,
        by: &str,
        today_end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<FoodParcel>, RepositoryError> {
        let row = sqlx::query_as::<_, ParcelRow>(&format!(
            r"
            UPDATE food_parcels
            SET no_show_at = $3, no_show_by = $2
            WHERE id = $1
              AND deleted_at IS NULL
              AND NOT is_picked_up
              AND no_show_at IS NULL
              AND earliest_pickup_time < $4
            RETURNING {PARCEL_COLUMNS}
            "
        ))
        .bind(id)
        .bind(by)
        .bind(now)
        .bind(today_end)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }
}
