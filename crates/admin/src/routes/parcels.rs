//! Parcel outcome and pickup location handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{Local, Utc};
use tower_sessions::Session;

use foodbank_core::{ParcelId, PickupLocationId};

use crate::db::LocationRepository;
use crate::error::AppError;
use crate::models::{ApiResponse, FoodParcel, LocationInput, PickupLocation};
use crate::services::validation::validate_location;
use crate::services::{ParcelService, Requirement};
use crate::state::AppState;

/// `POST /api/parcels/{id}/cancel`
pub async fn cancel(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ParcelId>,
) -> Result<ApiResponse<FoodParcel>, AppError> {
    let actor = state
        .gatekeeper()
        .authorize(&session, Requirement::Agreement)
        .await?;

    let parcel = ParcelService::new(&state)
        .cancel(id, &actor, &Local::now())
        .await?;
    Ok(ApiResponse::ok(parcel))
}

/// `POST /api/parcels/{id}/pickup`
pub async fn pickup(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ParcelId>,
) -> Result<ApiResponse<FoodParcel>, AppError> {
    let actor = state
        .gatekeeper()
        .authorize(&session, Requirement::Agreement)
        .await?;

    let parcel = ParcelService::new(&state).mark_picked_up(id, &actor).await?;
    Ok(ApiResponse::ok(parcel))
}

/// `POST /api/parcels/{id}/no-show`
pub async fn no_show(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ParcelId>,
) -> Result<ApiResponse<FoodParcel>, AppError> {
    let actor = state
        .gatekeeper()
        .authorize(&session, Requirement::Agreement)
        .await?;

    let parcel = ParcelService::new(&state)
        .mark_no_show(id, &actor, &Local::now())
        .await?;
    Ok(ApiResponse::ok(parcel))
}

/// `GET /api/locations`
pub async fn locations(
    State(state): State<AppState>,
    session: Session,
) -> Result<ApiResponse<Vec<PickupLocation>>, AppError> {
    state
        .gatekeeper()
        .authorize(&session, Requirement::Agreement)
        .await?;

    let locations = LocationRepository::new(state.pool()).list().await?;
    Ok(ApiResponse::ok(locations))
}

/// `POST /api/locations`
pub async fn create_location(
    State(state): State<AppState>,
    session: Session,
    Json(input): Json<LocationInput>,
) -> Result<(StatusCode, ApiResponse<PickupLocation>), AppError> {
    state
        .gatekeeper()
        .authorize(&session, Requirement::Agreement)
        .await?;

    let location = validate_location(PickupLocationId::generate(), &input, Utc::now())?;
    let location = LocationRepository::new(state.pool()).create(&location).await?;
    tracing::info!(location_id = %location.id, "Pickup location created");
    Ok((StatusCode::CREATED, ApiResponse::ok(location)))
}

/// `PUT /api/locations/{id}`
pub async fn update_location(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<PickupLocationId>,
    Json(input): Json<LocationInput>,
) -> Result<ApiResponse<PickupLocation>, AppError> {
    state
        .gatekeeper()
        .authorize(&session, Requirement::Agreement)
        .await?;

    let repo = LocationRepository::new(state.pool());
    let existing = repo
        .get(id)
        .await?
        .ok_or(AppError::NotFound("Pickup location"))?;
    let location = validate_location(id, &input, existing.created_at)?;
    let location = repo.update(&location).await?;
    Ok(ApiResponse::ok(location))
}
