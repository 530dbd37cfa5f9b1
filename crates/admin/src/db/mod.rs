//! Database operations for the foodbank `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `households`, `household_members`, `pets` - Registered households
//! - `dietary_restrictions`, `additional_needs` (+ link tables) - Shared lookups
//! - `household_comments` - Staff notes on a household
//! - `pickup_locations`, `food_parcels` - Scheduling
//! - `outgoing_sms` - SMS queue and history
//! - `verification_questions` - Enrollment checklist
//! - `agreements`, `agreement_acceptances` - Usage agreement versions
//! - `auth.session` - Session storage
//!
//! # Migrations
//!
//! Migrations are stored in `crates/admin/migrations/` and run via:
//! ```bash
//! cargo run -p foodbank-cli -- migrate
//! ```

pub mod agreements;
pub mod comments;
pub mod households;
pub mod locations;
pub mod parcels;
pub mod sms;
pub mod verification_questions;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use agreements::AgreementRepository;
pub use comments::CommentRepository;
pub use households::{HouseholdRepository, RemovalCommit};
pub use locations::LocationRepository;
pub use parcels::{ParcelInsert, ParcelRepository};
pub use sms::{NewSms, SmsRepository};
pub use verification_questions::VerificationQuestionRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate agreement version).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique-violation into `Conflict`, passing other errors through.
    pub(crate) fn from_unique_violation(err: sqlx::Error, message: &str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Conflict(message.to_string())
            }
            _ => Self::Database(err),
        }
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Convert a non-negative database integer into an unsigned count.
pub(crate) fn to_unsigned(value: i32, column: &str) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative {column}: {value}")))
}
