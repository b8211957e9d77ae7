//! API error taxonomy and its HTTP mapping
//!
//! Handlers return `Result<_, ApiError>`. Storage errors convert through
//! `From<StoreError>`, the one place store failures are classified.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

use crate::storage::sqlite::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or malformed input, names the offending field
    #[error("{0}")]
    Validation(String),
    #[error("User already exists.")]
    Conflict,
    /// Same response whether the user is unknown or the password is wrong
    #[error("Invalid credentials.")]
    AuthenticationFailed,
    #[error("Not found: {0}")]
    NotFound(String),
    /// Detail is logged, never sent to the client
    #[error("Database error occurred")]
    Database(String),
}

/// Body of every error response
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::AuthenticationFailed => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => ApiError::Conflict,
            StoreError::InvalidCredentials => ApiError::AuthenticationFailed,
            StoreError::NotFound(what) => ApiError::NotFound(what),
            StoreError::Constraint(msg) => ApiError::Validation(msg),
            other => ApiError::Database(other.to_string()),
        }
    }
}

/// An absent or non-JSON body is "No data provided"; a body that does not
/// fit the request type names the offending field.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(err) => {
                ApiError::Validation(format!("Invalid data: {}", rejection_detail(&err.body_text())))
            }
            JsonRejection::JsonSyntaxError(err) => {
                ApiError::Validation(format!("Malformed JSON: {}", rejection_detail(&err.body_text())))
            }
            _ => ApiError::Validation("No data provided".to_string()),
        }
    }
}

/// Drop axum's generic prefix, keeping `field: reason at line L column C`
fn rejection_detail(body_text: &str) -> &str {
    body_text
        .split_once(": ")
        .map(|(_, detail)| detail)
        .unwrap_or(body_text)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Database(detail) = &self {
            error!("Store failure: {}", detail);
        }

        let body = ErrorBody {
            success: false,
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
