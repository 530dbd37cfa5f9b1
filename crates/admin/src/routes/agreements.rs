//! Usage agreement handlers.
//!
//! Both routes only require membership: a member has to be able to read
//! and accept the agreement before anything else is unlocked.

use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_sessions::Session;
use tracing::info;

use crate::db::AgreementRepository;
use crate::error::AppError;
use crate::models::{Agreement, AgreementStatus, ApiResponse};
use crate::services::auth::agreement_status;
use crate::services::{AuthenticatedActor, Requirement};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AgreementResponse {
    pub agreement: Option<Agreement>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub is_satisfied: bool,
}

impl From<AgreementStatus> for AgreementResponse {
    fn from(status: AgreementStatus) -> Self {
        Self {
            is_satisfied: status.is_satisfied(),
            agreement: status.agreement,
            accepted_at: status.accepted_at,
        }
    }
}

/// The signed-in member.
///
/// `GET /api/me`
pub async fn me(
    State(state): State<AppState>,
    session: Session,
) -> Result<ApiResponse<AuthenticatedActor>, AppError> {
    let actor = state
        .gatekeeper()
        .authorize(&session, Requirement::Membership)
        .await?;
    Ok(ApiResponse::ok(actor))
}

/// `GET /api/agreement`
pub async fn show(
    State(state): State<AppState>,
    session: Session,
) -> Result<ApiResponse<AgreementResponse>, AppError> {
    let actor = state
        .gatekeeper()
        .authorize(&session, Requirement::Membership)
        .await?;

    let status = agreement_status(&state, actor.github_id, Utc::now()).await?;
    Ok(ApiResponse::ok(status.into()))
}

/// Accept the current agreement.
///
/// `POST /api/agreement/accept`
pub async fn accept(
    State(state): State<AppState>,
    session: Session,
) -> Result<ApiResponse<AgreementResponse>, AppError> {
    let actor = state
        .gatekeeper()
        .authorize(&session, Requirement::Membership)
        .await?;

    let now = Utc::now();
    let Some(agreement) = AgreementRepository::new(state.pool()).current(now).await? else {
        return Err(AppError::NotFound("Agreement"));
    };
    let accepted_at = AgreementRepository::new(state.pool())
        .accept(actor.github_id, agreement.id, now)
        .await?;
    info!(login = %actor.login, version = agreement.version, "Agreement accepted");

    Ok(ApiResponse::ok(
        AgreementStatus {
            agreement: Some(agreement),
            accepted_at: Some(accepted_at),
        }
        .into(),
    ))
}
