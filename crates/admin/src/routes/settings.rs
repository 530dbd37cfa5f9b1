//! Verification question settings.
//!
//! Questions staff must confirm with a household before enrolling it.
//! Deleting a question deactivates it so past enrollments keep their
//! meaning.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::info;

use foodbank_core::VerificationQuestionId;

use crate::db::VerificationQuestionRepository;
use crate::error::AppError;
use crate::models::{ApiResponse, VerificationQuestion, VerificationQuestionInput};
use crate::services::Requirement;
use crate::services::validation::validate_question;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QuestionsQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

/// Body of the reorder request: every active question ID, in display order.
#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub ids: Vec<VerificationQuestionId>,
}

/// `GET /api/settings/verification-questions`
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<QuestionsQuery>,
) -> Result<ApiResponse<Vec<VerificationQuestion>>, AppError> {
    state
        .gatekeeper()
        .authorize(&session, Requirement::Agreement)
        .await?;

    let questions = VerificationQuestionRepository::new(state.pool())
        .list(query.include_inactive)
        .await?;
    Ok(ApiResponse::ok(questions))
}

/// `POST /api/settings/verification-questions`
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    Json(input): Json<VerificationQuestionInput>,
) -> Result<(StatusCode, ApiResponse<VerificationQuestion>), AppError> {
    let actor = state
        .gatekeeper()
        .authorize(&session, Requirement::Agreement)
        .await?;

    let input = validate_question(&input)?;
    let question = VerificationQuestionRepository::new(state.pool())
        .create(&input)
        .await?;
    info!(question_id = %question.id, actor = %actor.login, "Verification question created");
    Ok((StatusCode::CREATED, ApiResponse::ok(question)))
}

/// `PUT /api/settings/verification-questions/{id}`
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<VerificationQuestionId>,
    Json(input): Json<VerificationQuestionInput>,
) -> Result<ApiResponse<VerificationQuestion>, AppError> {
    state
        .gatekeeper()
        .authorize(&session, Requirement::Agreement)
        .await?;

    let input = validate_question(&input)?;
    let question = VerificationQuestionRepository::new(state.pool())
        .update(id, &input)
        .await?;
    Ok(ApiResponse::ok(question))
}

/// `DELETE /api/settings/verification-questions/{id}`
pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<VerificationQuestionId>,
) -> Result<StatusCode, AppError> {
    let actor = state
        .gatekeeper()
        .authorize(&session, Requirement::Agreement)
        .await?;

    VerificationQuestionRepository::new(state.pool())
        .deactivate(id)
        .await?;
    info!(question_id = %id, actor = %actor.login, "Verification question deactivated");
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/settings/verification-questions/reorder`
pub async fn reorder(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<ReorderRequest>,
) -> Result<StatusCode, AppError> {
    state
        .gatekeeper()
        .authorize(&session, Requirement::Agreement)
        .await?;

    VerificationQuestionRepository::new(state.pool())
        .reorder(&body.ids)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
