//! Uniform JSON envelope for API responses.
//!
//! ```json
//! { "success": true, "data": { ... } }
//! { "success": false, "error": { "code": "NOT_FOUND", "message": "..." } }
//! ```

use axum::Json;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

/// Successful response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    #[must_use]
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Error body carried inside a failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

/// Failed response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiFailure {
    pub success: bool,
    pub error: ApiError,
}

impl ApiFailure {
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ApiError {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_success_shape() {
        let json = serde_json::to_value(ApiResponse::ok(serde_json::json!({"n": 1}))).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "data": {"n": 1}}));
    }

    #[test]
    fn test_failure_shape() {
        let json = serde_json::to_value(ApiFailure::new("NOT_FOUND", "Household not found")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": false,
                "error": {"code": "NOT_FOUND", "message": "Household not found"}
            })
        );
    }
}
