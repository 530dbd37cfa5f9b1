//! Session middleware configuration.
//!
//! `PostgreSQL`-backed sessions in the `auth` schema, expiring after a day
//! of inactivity.

use sqlx::PgPool;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::AppConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "foodbank_session";

/// Session expiry time in seconds (24 hours).
const SESSION_EXPIRY_SECONDS: i64 = 24 * 60 * 60;

const SESSION_SCHEMA: &str = "auth";
const SESSION_TABLE: &str = "session";

/// The session store rejected its schema or table name.
#[derive(Debug, thiserror::Error)]
#[error("invalid session store identifier: {0}")]
pub struct SessionLayerError(String);

/// Create the session layer with `PostgreSQL` store.
///
/// The session table is created by migration.
///
/// # Errors
///
/// Returns error if the schema or table name is not a valid identifier.
pub fn create_session_layer(
    pool: &PgPool,
    config: &AppConfig,
) -> Result<SessionManagerLayer<PostgresStore>, SessionLayerError> {
    let store = PostgresStore::new(pool.clone())
        .with_schema_name(SESSION_SCHEMA)
        .map_err(SessionLayerError)?
        .with_table_name(SESSION_TABLE)
        .map_err(SessionLayerError)?;

    Ok(SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        // Lax: the cookie must survive the top-level redirect back from GitHub
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/"))
}

