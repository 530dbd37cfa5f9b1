//! SMS provider handlers.

use axum::extract::{Query, State};
use chrono::Utc;
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::AppError;
use crate::models::ApiResponse;
use crate::services::sms_queue::DEFAULT_DISPATCH_LIMIT;
use crate::services::{DispatchReport, Requirement, SmsQueueService};
use crate::sms::SmsBalance;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DispatchRequest {
    pub limit: Option<i64>,
}

fn queue(state: &AppState) -> SmsQueueService {
    SmsQueueService::new(state.pool().clone(), state.sms().cloned())
}

/// `GET /api/sms/balance`
pub async fn balance(
    State(state): State<AppState>,
    session: Session,
) -> Result<ApiResponse<SmsBalance>, AppError> {
    state
        .gatekeeper()
        .authorize(&session, Requirement::Agreement)
        .await?;

    Ok(ApiResponse::ok(queue(&state).balance().await?))
}

/// Run one dispatch pass now.
///
/// `POST /api/sms/dispatch?limit=N`
pub async fn dispatch(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<DispatchRequest>,
) -> Result<ApiResponse<DispatchReport>, AppError> {
    state
        .gatekeeper()
        .authorize(&session, Requirement::Agreement)
        .await?;

    let limit = query
        .limit
        .unwrap_or(DEFAULT_DISPATCH_LIMIT)
        .clamp(1, 500);
    let report = queue(&state).dispatch_due(Utc::now(), limit).await?;
    Ok(ApiResponse::ok(report))
}
