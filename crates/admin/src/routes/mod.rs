//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! # Auth (GitHub OAuth)
//! GET  /auth/github/login                          - Start OAuth
//! GET  /auth/github/callback                       - OAuth callback
//! POST /auth/logout                                - Sign out
//! GET  /auth/error                                 - Sign-in failure
//!
//! # Members
//! GET  /api/me                                     - Signed-in member
//! GET  /api/agreement                              - Current agreement + acceptance
//! POST /api/agreement/accept                       - Accept current agreement
//!
//! # Households
//! GET  /api/households                             - List (?include_anonymized=true)
//! POST /api/households                             - Enroll
//! GET  /api/households/{id}                        - Detail
//! PUT  /api/households/{id}                        - Edit
//! POST /api/households/{id}/remove                 - Delete or anonymize
//! POST /api/households/{id}/comments               - Add comment
//! POST /api/households/{id}/parcels                - Schedule parcel
//! GET  /api/households/{id}/sms                    - SMS history
//! POST /api/households/{id}/sms/{parcel_id}/resend - Resend pickup reminder
//! DELETE /api/comments/{id}                        - Delete own comment
//!
//! # Parcels and locations
//! POST /api/parcels/{id}/cancel
//! POST /api/parcels/{id}/pickup
//! POST /api/parcels/{id}/no-show
//! GET  /api/locations, POST /api/locations, PUT /api/locations/{id}
//!
//! # SMS
//! GET  /api/sms/balance
//! POST /api/sms/dispatch
//!
//! # Settings
//! GET|POST        /api/settings/verification-questions
//! PUT|DELETE      /api/settings/verification-questions/{id}
//! POST            /api/settings/verification-questions/reorder
//! ```

pub mod agreements;
pub mod auth;
pub mod households;
pub mod parcels;
pub mod settings;
pub mod sms;

use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/github/login", get(auth::login))
        .route("/github/callback", get(auth::callback))
        .route("/logout", post(auth::logout))
        .route("/error", get(auth::error))
}

/// Create the household routes router.
pub fn household_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(households::index).post(households::create))
        .route("/{id}", get(households::show).put(households::update))
        .route("/{id}/remove", post(households::remove))
        .route("/{id}/comments", post(households::add_comment))
        .route("/{id}/parcels", post(households::schedule_parcel))
        .route("/{id}/sms", get(households::sms_history))
        .route("/{id}/sms/{parcel_id}/resend", post(households::resend_sms))
}

/// Create the parcel and location routes router.
pub fn parcel_routes() -> Router<AppState> {
    Router::new()
        .route("/parcels/{id}/cancel", post(parcels::cancel))
        .route("/parcels/{id}/pickup", post(parcels::pickup))
        .route("/parcels/{id}/no-show", post(parcels::no_show))
        .route(
            "/locations",
            get(parcels::locations).post(parcels::create_location),
        )
        .route("/locations/{id}", put(parcels::update_location))
}

/// Create the settings routes router.
pub fn settings_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/verification-questions",
            get(settings::index).post(settings::create),
        )
        .route(
            "/verification-questions/reorder",
            post(settings::reorder),
        )
        .route(
            "/verification-questions/{id}",
            put(settings::update).delete(settings::delete),
        )
}

/// Create the JSON API router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(agreements::me))
        .route("/agreement", get(agreements::show))
        .route("/agreement/accept", post(agreements::accept))
        .nest("/households", household_routes())
        .route("/comments/{id}", delete(households::delete_comment))
        .merge(parcel_routes())
        .route("/sms/balance", get(sms::balance))
        .route("/sms/dispatch", post(sms::dispatch))
        .nest("/settings", settings_routes())
}

/// Create all routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes())
        .nest("/api", api_routes())
}
