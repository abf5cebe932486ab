//! Error types for resonate-web
//!
//! Three kinds of failure reach the client:
//! - missing rows become a 404 JSON body
//! - acting on something the user does not own, or a thread they are not
//!   part of, becomes a quiet 303 redirect to a safe page
//! - bad form input becomes a 400 with per-field messages

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;

/// Field name → messages, in the order the checks ran
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Key used for errors that belong to the form as a whole
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Form validation failed (400)
    #[error("Validation failed: {0:?}")]
    Validation(FieldErrors),

    /// Not permitted; send the user somewhere safe (303)
    #[error("Redirecting to {0}")]
    Redirect(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// Validation failure for a single field
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        ApiError::Validation(errors)
    }
}

impl From<resonate_common::Error> for ApiError {
    fn from(err: resonate_common::Error) -> Self {
        use resonate_common::Error;

        match err {
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::Database(e) => ApiError::Database(e),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, fields) = match self {
            ApiError::Redirect(location) => return Redirect::to(&location).into_response(),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
            ApiError::Validation(fields) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "Please correct the errors below.".to_string(),
                Some(fields),
            ),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg, None)
            }
            ApiError::Database(ref err) => {
                tracing::error!("Database error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Database error".to_string(),
                    None,
                )
            }
            ApiError::Other(ref err) => {
                tracing::error!("Unhandled error: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    err.to_string(),
                    None,
                )
            }
        };

        let mut error = json!({
            "code": error_code,
            "message": message,
        });
        if let Some(fields) = fields {
            error["fields"] = json!(fields);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_is_see_other() {
        let response = ApiError::Redirect("/chats/".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "/chats/");
    }

    #[test]
    fn test_common_not_found_maps_to_404() {
        let err: ApiError = resonate_common::Error::NotFound("post 7".to_string()).into();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_common_invalid_input_maps_to_400() {
        let err: ApiError = resonate_common::Error::InvalidInput("nope".to_string()).into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_validation_is_bad_request() {
        let response = ApiError::field("content", "This field is required.").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
