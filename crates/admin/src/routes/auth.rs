//! GitHub OAuth route handlers.
//!
//! - Login: stores a CSRF state and redirects to GitHub
//! - Callback: exchanges the code, checks organization membership and
//!   signs the user in
//! - Logout: clears the session

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use rand::Rng;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use crate::error::{AppError, clear_sentry_user};
use crate::middleware::auth::{sign_in, sign_out};
use crate::models::{ApiFailure, MembershipCheck, SessionUser, session_keys};
use crate::services::AuthError;
use crate::state::AppState;

/// Query parameters from the GitHub OAuth callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set when the user declined the authorization.
    pub error: Option<String>,
}

/// Query parameters of the login error page.
#[derive(Debug, Deserialize)]
pub struct ErrorQuery {
    pub reason: Option<String>,
}

/// Random alphanumeric string for the OAuth `state` parameter.
fn generate_state(length: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..length)
        .filter_map(|_| CHARSET.get(rng.random_range(0..CHARSET.len())))
        .map(|b| char::from(*b))
        .collect()
}

fn error_redirect(reason: &str) -> Response {
    Redirect::to(&format!("/auth/error?reason={reason}")).into_response()
}

/// Start the GitHub OAuth flow.
///
/// # Route
///
/// `GET /auth/github/login`
pub async fn login(State(state): State<AppState>, session: Session) -> Result<Response, AppError> {
    let oauth_state = generate_state(32);
    session.insert(session_keys::OAUTH_STATE, &oauth_state).await?;

    let url = state
        .github()
        .authorize_url(&oauth_state, &state.config().oauth_callback_url())?;
    Ok(Redirect::to(&url).into_response())
}

/// Handle the GitHub OAuth callback.
///
/// A state mismatch is a 400. Users who are not active members of the
/// organization are sent to the error page without being signed in.
///
/// # Route
///
/// `GET /auth/github/callback`
#[instrument(skip_all)]
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, AppError> {
    if let Some(error) = query.error {
        warn!(error = %error, "GitHub authorization declined");
        return Ok(error_redirect("denied"));
    }

    let stored_state: Option<String> = session.remove(session_keys::OAUTH_STATE).await?;
    match (&stored_state, &query.state) {
        (Some(stored), Some(returned)) if stored == returned => {}
        _ => {
            warn!("GitHub OAuth state mismatch");
            return Err(AppError::BadRequest("OAuth state mismatch".to_string()));
        }
    }

    let Some(code) = query.code else {
        return Ok(error_redirect("missing-code"));
    };

    let org = state
        .config()
        .github
        .organization
        .clone()
        .filter(|org| !org.trim().is_empty())
        .ok_or(AuthError::ConfigurationError)?;

    let github = state.github();
    let token = match github
        .exchange_code(&code, &state.config().oauth_callback_url())
        .await
    {
        Ok(token) => token,
        Err(e) => {
            warn!(error = %e, "GitHub code exchange failed");
            return Ok(error_redirect("token-exchange"));
        }
    };

    let profile = match github.current_user(&token).await {
        Ok(profile) => profile,
        Err(e) => {
            warn!(error = %e, "GitHub user lookup failed");
            return Ok(error_redirect("github"));
        }
    };

    match github.is_org_member(&token, &org).await {
        Ok(true) => {}
        Ok(false) => {
            info!(login = %profile.login, "Sign-in refused, not an organization member");
            sign_out(&session).await?;
            return Ok(error_redirect("not-member"));
        }
        Err(e) => {
            warn!(error = %e, "GitHub membership lookup failed");
            return Ok(error_redirect("github"));
        }
    }

    let user = SessionUser {
        github_id: profile.id,
        login: profile.login,
        name: profile.name,
        avatar_url: profile.avatar_url,
    };
    let membership = MembershipCheck::new(true, Utc::now(), state.config().github.membership_recheck);
    sign_in(&session, &user, &token, membership).await?;

    info!(login = %user.login, "Signed in");
    Ok(Redirect::to("/").into_response())
}

/// Sign out.
///
/// # Route
///
/// `POST /auth/logout`
pub async fn logout(session: Session) -> Result<Response, AppError> {
    sign_out(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Explain why sign-in failed.
///
/// # Route
///
/// `GET /auth/error`
pub async fn error(Query(query): Query<ErrorQuery>) -> Response {
    let (status, code, message) = sign_in_failure(query.reason.as_deref());
    (status, Json(ApiFailure::new(code, message))).into_response()
}

fn sign_in_failure(reason: Option<&str>) -> (StatusCode, &'static str, &'static str) {
    match reason {
        Some("not-member") => (
            StatusCode::FORBIDDEN,
            "FORBIDDEN",
            "Your GitHub account is not a member of the organization",
        ),
        Some("denied") => (
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "GitHub authorization was declined",
        ),
        _ => (
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "Sign-in with GitHub failed",
        ),
    }
}
