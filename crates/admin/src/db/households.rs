//! Household repository.
//!
//! Besides plain CRUD this holds the two removal paths. Both run in a single
//! transaction that locks the household row and only proceeds while
//! `anonymized_at IS NULL`, so two concurrent removals cannot both succeed.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use foodbank_core::{HouseholdId, Locale, MemberSex, PhoneNumber, PostalCode, RemovalOutcome};

use super::{RepositoryError, to_unsigned};
use crate::models::{Household, HouseholdData, HouseholdMember, HouseholdSummary, Pet};

/// Replacement for first and last name after anonymization.
pub const ANONYMIZED_NAME: &str = "Anonymized";
/// Replacement phone number after anonymization. Valid E.164 so the row
/// still parses.
pub const ANONYMIZED_PHONE: &str = "+46000000000";
/// Replacement postal code after anonymization.
pub const ANONYMIZED_POSTAL_CODE: &str = "00000";

/// Result of the transactional removal write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalCommit {
    Removed(RemovalOutcome),
    /// The row was gone or already anonymized once the lock was taken.
    AlreadyRemoved,
    /// A parcel was scheduled between the eligibility check and the write.
    UpcomingParcels(i64),
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct HouseholdRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    phone_number: String,
    postal_code: String,
    locale: Locale,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    anonymized_at: Option<DateTime<Utc>>,
    anonymized_by: Option<String>,
}

impl TryFrom<HouseholdRow> for Household {
    type Error = RepositoryError;

    fn try_from(row: HouseholdRow) -> Result<Self, Self::Error> {
        let phone_number = PhoneNumber::parse(&row.phone_number).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid phone number in database: {e}"))
        })?;
        let postal_code = PostalCode::parse(&row.postal_code).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid postal code in database: {e}"))
        })?;

        Ok(Self {
            id: HouseholdId::new(row.id),
            first_name: row.first_name,
            last_name: row.last_name,
            phone_number,
            postal_code,
            locale: row.locale,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
            anonymized_at: row.anonymized_at,
            anonymized_by: row.anonymized_by,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct HouseholdSummaryRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    phone_number: String,
    postal_code: String,
    created_at: DateTime<Utc>,
    anonymized_at: Option<DateTime<Utc>>,
    next_pickup: Option<DateTime<Utc>>,
}

impl From<HouseholdSummaryRow> for HouseholdSummary {
    fn from(row: HouseholdSummaryRow) -> Self {
        Self {
            id: HouseholdId::new(row.id),
            first_name: row.first_name,
            last_name: row.last_name,
            phone_number: row.phone_number,
            postal_code: row.postal_code,
            created_at: row.created_at,
            anonymized_at: row.anonymized_at,
            next_pickup: row.next_pickup,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MemberRow {
    age: i32,
    sex: MemberSex,
}

impl TryFrom<MemberRow> for HouseholdMember {
    type Error = RepositoryError;

    fn try_from(row: MemberRow) -> Result<Self, Self::Error> {
        let age = u8::try_from(row.age).map_err(|_| {
            RepositoryError::DataCorruption(format!("invalid member age: {}", row.age))
        })?;
        Ok(Self { age, sex: row.sex })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PetRow {
    species: String,
    count: i32,
}

impl TryFrom<PetRow> for Pet {
    type Error = RepositoryError;

    fn try_from(row: PetRow) -> Result<Self, Self::Error> {
        Ok(Self {
            species: row.species,
            count: to_unsigned(row.count, "pet count")?,
        })
    }
}

const HOUSEHOLD_COLUMNS: &str = "id, first_name, last_name, phone_number, postal_code, locale, \
     created_by, created_at, updated_at, anonymized_at, anonymized_by";

// =============================================================================
// Repository
// =============================================================================

/// Repository for household database operations.
pub struct HouseholdRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> HouseholdRepository<'a> {
    /// Create a new household repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List households, newest first.
    ///
    /// `next_pickup` is the earliest non-cancelled parcel on or after
    /// `today_start`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        include_anonymized: bool,
        today_start: DateTime<Utc>,
    ) -> Result<Vec<HouseholdSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, HouseholdSummaryRow>(
            r"
            SELECT h.id, h.first_name, h.last_name, h.phone_number, h.postal_code,
                   h.created_at, h.anonymized_at,
                   (SELECT MIN(p.earliest_pickup_time)
                      FROM food_parcels p
                     WHERE p.household_id = h.id
                       AND p.deleted_at IS NULL
                       AND p.earliest_pickup_time >= $2) AS next_pickup
            FROM households h
            WHERE $1 OR h.anonymized_at IS NULL
            ORDER BY h.created_at DESC
            ",
        )
        .bind(include_anonymized)
        .bind(today_start)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a household by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn get(&self, id: HouseholdId) -> Result<Option<Household>, RepositoryError> {
        let row = sqlx::query_as::<_, HouseholdRow>(&format!(
            "SELECT {HOUSEHOLD_COLUMNS} FROM households WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Last name and anonymization timestamp, the inputs of the removal
    /// preconditions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn removal_candidate(
        &self,
        id: HouseholdId,
    ) -> Result<Option<(String, Option<DateTime<Utc>>)>, RepositoryError> {
        let row = sqlx::query_as::<_, (String, Option<DateTime<Utc>>)>(
            "SELECT last_name, anonymized_at FROM households WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Count non-cancelled parcels whose earliest pickup is at or after
    /// `today_start`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_upcoming_parcels(
        &self,
        id: HouseholdId,
        today_start: DateTime<Utc>,
    ) -> Result<i64, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        count_upcoming(&mut conn, id, today_start).await
    }

    /// Members of a household.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn members(&self, id: HouseholdId) -> Result<Vec<HouseholdMember>, RepositoryError> {
        let rows = sqlx::query_as::<_, MemberRow>(
            "SELECT age, sex FROM household_members WHERE household_id = $1 ORDER BY age DESC",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Pets of a household.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn pets(&self, id: HouseholdId) -> Result<Vec<Pet>, RepositoryError> {
        let rows = sqlx::query_as::<_, PetRow>(
            "SELECT species, count FROM pets WHERE household_id = $1 ORDER BY species",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Names of the household's dietary restrictions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn dietary_restrictions(&self, id: HouseholdId) -> Result<Vec<String>, RepositoryError> {
        let names = sqlx::query_scalar::<_, String>(
            r"
            SELECT d.name
            FROM household_dietary_restrictions hd
            JOIN dietary_restrictions d ON d.id = hd.dietary_restriction_id
            WHERE hd.household_id = $1
            ORDER BY d.name
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(names)
    }

    /// Names of the household's additional needs.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn additional_needs(&self, id: HouseholdId) -> Result<Vec<String>, RepositoryError> {
        let names = sqlx::query_scalar::<_, String>(
            r"
            SELECT n.name
            FROM household_additional_needs hn
            JOIN additional_needs n ON n.id = hn.additional_need_id
            WHERE hn.household_id = $1
            ORDER BY n.name
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(names)
    }

    /// Insert a household and its composition in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails.
    /// Returns `RepositoryError::DataCorruption` if the inserted row is invalid.
    pub async fn create(
        &self,
        id: HouseholdId,
        data: &HouseholdData,
        created_by: Option<&str>,
    ) -> Result<Household, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, HouseholdRow>(&format!(
            r"
            INSERT INTO households (id, first_name, last_name, phone_number, postal_code, locale, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {HOUSEHOLD_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(data.phone_number.as_str())
        .bind(data.postal_code.as_str())
        .bind(data.locale)
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await?;

        replace_composition(&mut tx, id, data).await?;
        tx.commit().await?;

        row.try_into()
    }

    /// Update a household that has not been anonymized.
    ///
    /// Returns `None` without writing anything when the household does not
    /// exist or is anonymized.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails.
    pub async fn update(
        &self,
        id: HouseholdId,
        data: &HouseholdData,
    ) -> Result<Option<Household>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, HouseholdRow>(&format!(
            r"
            UPDATE households
            SET first_name = $2, last_name = $3, phone_number = $4,
                postal_code = $5, locale = $6, updated_at = NOW()
            WHERE id = $1 AND anonymized_at IS NULL
            RETURNING {HOUSEHOLD_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(data.phone_number.as_str())
        .bind(data.postal_code.as_str())
        .bind(data.locale)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        replace_composition(&mut tx, id, data).await?;
        tx.commit().await?;

        row.try_into().map(Some)
    }

    /// Remove a household: hard delete when it has no non-cancelled parcel,
    /// anonymize otherwise.
    ///
    /// Anonymization scrubs names, phone number and postal code, deletes
    /// comments, scrubs SMS recipients and texts (cancelling anything still
    /// queued), and keeps members, pets, needs and parcels for statistics.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; the
    /// transaction is rolled back.
    pub async fn remove(
        &self,
        id: HouseholdId,
        actor: &str,
        today_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<RemovalCommit, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let locked = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            "SELECT anonymized_at FROM households WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        if !matches!(locked, Some(None)) {
            tx.rollback().await?;
            return Ok(RemovalCommit::AlreadyRemoved);
        }

        let upcoming = count_upcoming(&mut tx, id, today_start).await?;
        if upcoming > 0 {
            tx.rollback().await?;
            return Ok(RemovalCommit::UpcomingParcels(upcoming));
        }

        let parcels = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM food_parcels WHERE household_id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        let outcome = if parcels == 0 {
            let deleted = sqlx::query("DELETE FROM households WHERE id = $1 AND anonymized_at IS NULL")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            if deleted.rows_affected() == 0 {
                tx.rollback().await?;
                return Ok(RemovalCommit::AlreadyRemoved);
            }
            RemovalOutcome::HardDeleted
        } else {
            let updated = sqlx::query(
                r"
                UPDATE households
                SET first_name = $2, last_name = $2, phone_number = $3, postal_code = $4,
                    anonymized_at = $5, anonymized_by = $6, updated_at = $5
                WHERE id = $1 AND anonymized_at IS NULL
                ",
            )
            .bind(id)
            .bind(ANONYMIZED_NAME)
            .bind(ANONYMIZED_PHONE)
            .bind(ANONYMIZED_POSTAL_CODE)
            .bind(now)
            .bind(actor)
            .execute(&mut *tx)
            .await?;
            if updated.rows_affected() == 0 {
                tx.rollback().await?;
                return Ok(RemovalCommit::AlreadyRemoved);
            }

            sqlx::query("DELETE FROM household_comments WHERE household_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;

            sqlx::query(
                r"
                UPDATE outgoing_sms
                SET to_e164 = $2,
                    text = '',
                    status = CASE WHEN status IN ('queued', 'retrying')
                                  THEN 'cancelled'::sms_status
                                  ELSE status END
                WHERE household_id = $1
                ",
            )
            .bind(id)
            .bind(ANONYMIZED_PHONE)
            .execute(&mut *tx)
            .await?;

            RemovalOutcome::Anonymized
        };

        tx.commit().await?;
        Ok(RemovalCommit::Removed(outcome))
    }
}

async fn count_upcoming(
    conn: &mut PgConnection,
    id: HouseholdId,
    today_start: DateTime<Utc>,
) -> Result<i64, RepositoryError> {
    let count = sqlx::query_scalar::<_, i64>(
        r"
        SELECT COUNT(*)
        FROM food_parcels
        WHERE household_id = $1
          AND deleted_at IS NULL
          AND earliest_pickup_time >= $2
        ",
    )
    .bind(id)
    .bind(today_start)
    .fetch_one(conn)
    .await?;

    Ok(count)
}

/// Replace members, pets and lookup links of a household.
async fn replace_composition(
    conn: &mut PgConnection,
    id: HouseholdId,
    data: &HouseholdData,
) -> Result<(), RepositoryError> {
    for table in [
        "household_members",
        "pets",
        "household_dietary_restrictions",
        "household_additional_needs",
    ] {
        sqlx::query(&format!("DELETE FROM {table} WHERE household_id = $1"))
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }

    for member in &data.members {
        sqlx::query("INSERT INTO household_members (household_id, age, sex) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(i32::from(member.age))
            .bind(member.sex)
            .execute(&mut *conn)
            .await?;
    }

    for pet in &data.pets {
        let count = i32::try_from(pet.count)
            .map_err(|_| RepositoryError::Conflict(format!("pet count too large: {}", pet.count)))?;
        sqlx::query("INSERT INTO pets (household_id, species, count) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(&pet.species)
            .bind(count)
            .execute(&mut *conn)
            .await?;
    }

    link_lookup(
        conn,
        id,
        &data.dietary_restrictions,
        "dietary_restrictions",
        "household_dietary_restrictions",
        "dietary_restriction_id",
    )
    .await?;
    link_lookup(
        conn,
        id,
        &data.additional_needs,
        "additional_needs",
        "household_additional_needs",
        "additional_need_id",
    )
    .await?;

    Ok(())
}

/// Link names from a lookup table, inserting unknown names first.
async fn link_lookup(
    conn: &mut PgConnection,
    id: HouseholdId,
    names: &[String],
    lookup_table: &str,
    link_table: &str,
    link_column: &str,
) -> Result<(), RepositoryError> {
    for name in names {
        let lookup_id = sqlx::query_scalar::<_, Uuid>(&format!(
            r"
            INSERT INTO {lookup_table} (name) VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "
        ))
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;

        sqlx::query(&format!(
            "INSERT INTO {link_table} (household_id, {link_column}) VALUES ($1, $2) ON CONFLICT DO NOTHING"
        ))
        .bind(id)
        .bind(lookup_id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymized_placeholders_still_parse() {
        assert!(PhoneNumber::parse(ANONYMIZED_PHONE).is_ok());
        assert!(PostalCode::parse(ANONYMIZED_POSTAL_CODE).is_ok());
    }

    #[test]
    fn test_member_row_rejects_out_of_range_age() {
        let row = MemberRow {
            age: -1,
            sex: MemberSex::Other,
        };
        assert!(HouseholdMember::try_from(row).is_err());
    }
}
