//! Unified error handling for the admin API.
//!
//! Every error leaves the server as the JSON failure envelope with a
//! machine-readable code. Server-side failures are reported to Sentry.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::github::GithubError;
use crate::models::ApiFailure;
use crate::services::auth::AuthError;
use crate::services::removal::RemovalError;
use crate::services::validation::ValidationError;
use crate::sms::SmsError;

/// Application-level error type for the admin API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authorization gate refused the request.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Household removal failed.
    #[error(transparent)]
    Removal(#[from] RemovalError),

    /// Request body failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// SMS provider failed or is not configured.
    #[error("SMS error: {0}")]
    Sms(#[from] SmsError),

    /// GitHub API failed.
    #[error("GitHub error: {0}")]
    Github(#[from] GithubError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Authenticated, but not allowed to touch this resource.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The resource is in a state that does not allow the operation.
    #[error("{message}")]
    Conflict { code: &'static str, message: String },

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Mutation attempted on an anonymized household.
    #[must_use]
    pub fn already_anonymized() -> Self {
        Self::Conflict {
            code: "ALREADY_ANONYMIZED",
            message: "Household has been anonymized and can no longer be changed".to_string(),
        }
    }

    #[must_use]
    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::Conflict {
            code,
            message: message.into(),
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Auth(e) => match e {
                AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
                AuthError::Forbidden | AuthError::AgreementRequired => StatusCode::FORBIDDEN,
                AuthError::ConfigurationError | AuthError::AgreementCheckFailed(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Removal(e) => match e {
                RemovalError::NotFound => StatusCode::NOT_FOUND,
                RemovalError::AlreadyAnonymized | RemovalError::HasUpcomingParcels { .. } => {
                    StatusCode::CONFLICT
                }
                RemovalError::ConfirmationMismatch => StatusCode::BAD_REQUEST,
                RemovalError::Failed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Sms(SmsError::NotConfigured) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Sms(_) | Self::Github(_) => StatusCode::BAD_GATEWAY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict { .. } => StatusCode::CONFLICT,
        }
    }

    /// Machine-readable code for the envelope.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Database(RepositoryError::NotFound) => "NOT_FOUND",
            Self::Database(RepositoryError::Conflict(_)) => "CONFLICT",
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => "INTERNAL_ERROR",
            Self::Auth(e) => e.code(),
            Self::Removal(e) => e.code().as_str(),
            Self::Validation(e) => e.code(),
            Self::Sms(SmsError::NotConfigured) => "SMS_NOT_CONFIGURED",
            Self::Sms(_) => "SMS_PROVIDER_ERROR",
            Self::Github(_) => "GITHUB_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Conflict { code, .. } => *code,
            Self::BadRequest(_) => "BAD_REQUEST",
        }
    }

    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Database(
                RepositoryError::Database(_) | RepositoryError::DataCorruption(_)
            ) | Self::Session(_)
                | Self::Internal(_)
                | Self::Github(_)
                | Self::Removal(RemovalError::Failed(_))
                | Self::Auth(AuthError::ConfigurationError | AuthError::AgreementCheckFailed(_))
        ) || matches!(self, Self::Sms(e) if !matches!(e, SmsError::NotConfigured))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(RepositoryError::Conflict(message)) => message.clone(),
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            Self::Github(_) => "GitHub request failed".to_string(),
            _ => self.to_string(),
        };

        (self.status(), Json(ApiFailure::new(self.code(), message))).into_response()
    }
}

/// Set the Sentry user context from the GitHub identity.
pub fn set_sentry_user(github_id: i64, login: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(github_id.to_string()),
            username: Some(login.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_and_code(err: AppError) -> (StatusCode, &'static str) {
        (err.status(), err.code())
    }

    #[test]
    fn test_app_error_display() {
        assert_eq!(AppError::NotFound("Household").to_string(), "Household not found");
        assert_eq!(
            AppError::BadRequest("invalid input".to_string()).to_string(),
            "Bad request: invalid input"
        );
    }

    #[test]
    fn test_auth_error_mapping() {
        assert_eq!(
            status_and_code(AuthError::Unauthorized.into()),
            (StatusCode::UNAUTHORIZED, "UNAUTHORIZED")
        );
        assert_eq!(
            status_and_code(AuthError::Forbidden.into()),
            (StatusCode::FORBIDDEN, "FORBIDDEN")
        );
        assert_eq!(
            status_and_code(AuthError::AgreementRequired.into()),
            (StatusCode::FORBIDDEN, "AGREEMENT_REQUIRED")
        );
        assert_eq!(
            status_and_code(AuthError::ConfigurationError.into()),
            (StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION_ERROR")
        );
    }

    #[test]
    fn test_removal_error_mapping() {
        assert_eq!(
            status_and_code(RemovalError::NotFound.into()),
            (StatusCode::NOT_FOUND, "NOT_FOUND")
        );
        assert_eq!(
            status_and_code(RemovalError::HasUpcomingParcels { count: 1 }.into()),
            (StatusCode::CONFLICT, "HAS_UPCOMING_PARCELS")
        );
        assert_eq!(
            status_and_code(RemovalError::ConfirmationMismatch.into()),
            (StatusCode::BAD_REQUEST, "CONFIRMATION_MISMATCH")
        );
        assert_eq!(
            status_and_code(RemovalError::Failed("boom".to_string()).into()),
            (StatusCode::INTERNAL_SERVER_ERROR, "REMOVAL_FAILED")
        );
    }

    #[test]
    fn test_conflict_uses_its_own_code() {
        assert_eq!(
            status_and_code(AppError::already_anonymized()),
            (StatusCode::CONFLICT, "ALREADY_ANONYMIZED")
        );
    }

    #[test]
    fn test_repository_errors_mapping() {
        assert_eq!(
            status_and_code(RepositoryError::NotFound.into()),
            (StatusCode::NOT_FOUND, "NOT_FOUND")
        );
        assert_eq!(
            status_and_code(RepositoryError::Conflict("duplicate version".to_string()).into()),
            (StatusCode::CONFLICT, "CONFLICT")
        );
        assert_eq!(
            status_and_code(RepositoryError::DataCorruption("bad".to_string()).into()),
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
        );
    }

    #[test]
    fn test_response_status() {
        let response = AppError::NotFound("Parcel").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = AppError::Sms(SmsError::NotConfigured).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
