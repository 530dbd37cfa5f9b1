//! Usage agreement commands.

use std::path::Path;

use chrono::{DateTime, Utc};

use foodbank_admin::db::{AgreementRepository, RepositoryError};

use super::{CommandError, connect};

#[derive(Debug, thiserror::Error)]
pub enum AgreementError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error("Failed to read {0}: {1}")]
    Read(String, std::io::Error),

    #[error("Agreement text is empty")]
    Empty,

    #[error("Version must be positive, got {0}")]
    InvalidVersion(i32),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Publish `file` as agreement `version`.
///
/// Members who accepted an older version must accept again once
/// `effective_from` has passed.
pub async fn publish(
    version: i32,
    file: &Path,
    effective_from: DateTime<Utc>,
) -> Result<(), AgreementError> {
    if version <= 0 {
        return Err(AgreementError::InvalidVersion(version));
    }
    let content = tokio::fs::read_to_string(file)
        .await
        .map_err(|e| AgreementError::Read(file.display().to_string(), e))?;
    let content = content.trim();
    if content.is_empty() {
        return Err(AgreementError::Empty);
    }

    let pool = connect().await?;
    let agreement = AgreementRepository::new(&pool)
        .publish(version, content, effective_from)
        .await?;

    tracing::info!(
        id = %agreement.id,
        version = agreement.version,
        effective_from = %agreement.effective_from,
        "Agreement published"
    );
    Ok(())
}
