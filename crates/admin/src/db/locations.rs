//! Pickup location repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use foodbank_core::{Email, PhoneNumber, PickupLocationId, PostalCode};

use super::{RepositoryError, to_unsigned};
use crate::models::PickupLocation;

#[derive(Debug, sqlx::FromRow)]
struct LocationRow {
    id: Uuid,
    name: String,
    street_address: String,
    postal_code: String,
    contact_name: Option<String>,
    contact_email: Option<String>,
    contact_phone: Option<String>,
    parcels_max_per_day: Option<i32>,
    created_at: DateTime<Utc>,
}

impl TryFrom<LocationRow> for PickupLocation {
    type Error = RepositoryError;

    fn try_from(row: LocationRow) -> Result<Self, Self::Error> {
        let postal_code = PostalCode::parse(&row.postal_code)
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid postal code: {e}")))?;
        let contact_email = row
            .contact_email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid contact email: {e}")))?;
        let contact_phone = row
            .contact_phone
            .as_deref()
            .map(PhoneNumber::parse)
            .transpose()
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid contact phone: {e}")))?;
        let parcels_max_per_day = row
            .parcels_max_per_day
            .map(|max| to_unsigned(max, "parcels_max_per_day"))
            .transpose()?;

        Ok(Self {
            id: PickupLocationId::new(row.id),
            name: row.name,
            street_address: row.street_address,
            postal_code,
            contact_name: row.contact_name,
            contact_email,
            contact_phone,
            parcels_max_per_day,
            created_at: row.created_at,
        })
    }
}

const LOCATION_COLUMNS: &str = "id, name, street_address, postal_code, contact_name, \
     contact_email, contact_phone, parcels_max_per_day, created_at";

/// Repository for pickup locations.
pub struct LocationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> LocationRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All locations ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<PickupLocation>, RepositoryError> {
        let rows = sqlx::query_as::<_, LocationRow>(&format!(
            "SELECT {LOCATION_COLUMNS} FROM pickup_locations ORDER BY name"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: PickupLocationId) -> Result<Option<PickupLocation>, RepositoryError> {
        let row = sqlx::query_as::<_, LocationRow>(&format!(
            "SELECT {LOCATION_COLUMNS} FROM pickup_locations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Insert a new location.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, location: &PickupLocation) -> Result<PickupLocation, RepositoryError> {
        let row = sqlx::query_as::<_, LocationRow>(&format!(
            r"
            INSERT INTO pickup_locations
                (id, name, street_address, postal_code, contact_name, contact_email,
                 contact_phone, parcels_max_per_day)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {LOCATION_COLUMNS}
            "
        ))
        .bind(location.id)
        .bind(&location.name)
        .bind(&location.street_address)
        .bind(location.postal_code.as_str())
        .bind(location.contact_name.as_deref())
        .bind(location.contact_email.as_ref().map(Email::as_str))
        .bind(location.contact_phone.as_ref().map(PhoneNumber::as_str))
        .bind(max_per_day(location)?)
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    /// Overwrite a location's editable fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no location has this ID.
    pub async fn update(&self, location: &PickupLocation) -> Result<PickupLocation, RepositoryError> {
        let row = sqlx::query_as::<_, LocationRow>(&format!(
            r"
            UPDATE pickup_locations
            SET name = $2, street_address = $3, postal_code = $4, contact_name = $5,
                contact_email = $6, contact_phone = $7, parcels_max_per_day = $8
            WHERE id = $1
            RETURNING {LOCATION_COLUMNS}
            "
        ))
        .bind(location.id)
        .bind(&location.name)
        .bind(&location.street_address)
        .bind(location.postal_code.as_str())
        .bind(location.contact_name.as_deref())
        .bind(location.contact_email.as_ref().map(Email::as_str))
        .bind(location.contact_phone.as_ref().map(PhoneNumber::as_str))
        .bind(max_per_day(location)?)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }
}

fn max_per_day(location: &PickupLocation) -> Result<Option<i32>, RepositoryError> {
    location
        .parcels_max_per_day
        .map(|max| {
            i32::try_from(max)
                .map_err(|_| RepositoryError::Conflict(format!("parcels_max_per_day too large: {max}")))
        })
        .transpose()
}
