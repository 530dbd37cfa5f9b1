//! Household API handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use foodbank_core::{CommentId, HouseholdId, ParcelId, RemovalOutcome};

use crate::db::{HouseholdRepository, SmsRepository};
use crate::error::AppError;
use crate::middleware::auth::github_token;
use crate::models::{
    ApiResponse, Comment, CommentInput, FoodParcel, Household, HouseholdDetail, HouseholdInput,
    HouseholdSummary, ScheduleParcelInput, SmsRecord,
};
use crate::services::{
    HouseholdService, ParcelService, RemovalInput, RemovalRequest, Requirement, SmsQueueService,
    remove_household,
};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub include_anonymized: bool,
}

#[derive(Debug, Serialize)]
pub struct RemovalResponse {
    pub outcome: RemovalOutcome,
}

/// `GET /api/households`
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ListQuery>,
) -> Result<ApiResponse<Arc<Vec<HouseholdSummary>>>, AppError> {
    state
        .gatekeeper()
        .authorize(&session, Requirement::Agreement)
        .await?;

    let list = HouseholdService::new(&state)
        .list(query.include_anonymized, &Local::now())
        .await?;
    Ok(ApiResponse::ok(list))
}

/// `GET /api/households/{id}`
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<HouseholdId>,
) -> Result<ApiResponse<Arc<HouseholdDetail>>, AppError> {
    state
        .gatekeeper()
        .authorize(&session, Requirement::Agreement)
        .await?;

    let token = github_token(&session).await;
    let detail = HouseholdService::new(&state)
        .detail(id, token.as_ref(), &Local::now())
        .await?;
    Ok(ApiResponse::ok(detail))
}

/// `POST /api/households`
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    Json(input): Json<HouseholdInput>,
) -> Result<(StatusCode, ApiResponse<Household>), AppError> {
    let actor = state
        .gatekeeper()
        .authorize(&session, Requirement::Agreement)
        .await?;

    let household = HouseholdService::new(&state)
        .enroll(&input, &actor, &Local::now())
        .await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(household)))
}

/// `PUT /api/households/{id}`
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<HouseholdId>,
    Json(input): Json<HouseholdInput>,
) -> Result<ApiResponse<Household>, AppError> {
    let actor = state
        .gatekeeper()
        .authorize(&session, Requirement::Agreement)
        .await?;

    let household = HouseholdService::new(&state)
        .update(id, &input, &actor)
        .await?;
    Ok(ApiResponse::ok(household))
}

/// Delete or anonymize a household after the last name has been typed.
///
/// `POST /api/households/{id}/remove`
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<HouseholdId>,
    Json(body): Json<RemovalRequest>,
) -> Result<ApiResponse<RemovalResponse>, AppError> {
    let actor = state
        .gatekeeper()
        .authorize(&session, Requirement::Agreement)
        .await?;

    let input = RemovalInput {
        household_id: id,
        last_name_confirmation: body.last_name_confirmation,
    };
    let outcome = remove_household(
        &HouseholdRepository::new(state.pool()),
        state.views(),
        &input,
        &actor,
        &Local::now(),
    )
    .await?;
    Ok(ApiResponse::ok(RemovalResponse { outcome }))
}

/// `POST /api/households/{id}/comments`
pub async fn add_comment(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<HouseholdId>,
    Json(input): Json<CommentInput>,
) -> Result<(StatusCode, ApiResponse<Comment>), AppError> {
    let actor = state
        .gatekeeper()
        .authorize(&session, Requirement::Agreement)
        .await?;

    let comment = HouseholdService::new(&state)
        .add_comment(id, &input.text, &actor)
        .await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(comment)))
}

/// `DELETE /api/comments/{id}`
pub async fn delete_comment(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<CommentId>,
) -> Result<StatusCode, AppError> {
    let actor = state
        .gatekeeper()
        .authorize(&session, Requirement::Agreement)
        .await?;

    HouseholdService::new(&state)
        .delete_comment(id, &actor)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/households/{id}/parcels`
pub async fn schedule_parcel(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<HouseholdId>,
    Json(input): Json<ScheduleParcelInput>,
) -> Result<(StatusCode, ApiResponse<FoodParcel>), AppError> {
    let actor = state
        .gatekeeper()
        .authorize(&session, Requirement::Agreement)
        .await?;

    let parcel = ParcelService::new(&state)
        .schedule(id, &input, &actor, &Local::now())
        .await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(parcel)))
}

/// SMS history of a household.
///
/// `GET /api/households/{id}/sms`
pub async fn sms_history(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<HouseholdId>,
) -> Result<ApiResponse<Vec<SmsRecord>>, AppError> {
    state
        .gatekeeper()
        .authorize(&session, Requirement::Agreement)
        .await?;

    let records = SmsRepository::new(state.pool()).list_for_household(id).await?;
    Ok(ApiResponse::ok(records))
}

/// `POST /api/households/{id}/sms/{parcel_id}/resend`
pub async fn resend_sms(
    State(state): State<AppState>,
    session: Session,
    Path((id, parcel_id)): Path<(HouseholdId, ParcelId)>,
) -> Result<ApiResponse<SmsRecord>, AppError> {
    state
        .gatekeeper()
        .authorize(&session, Requirement::Agreement)
        .await?;

    let record = SmsQueueService::new(state.pool().clone(), state.sms().cloned())
        .resend(id, parcel_id, &Local::now())
        .await?;
    state.views().invalidate_household(id).await;
    Ok(ApiResponse::ok(record))
}
