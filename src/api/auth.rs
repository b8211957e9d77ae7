//! Account endpoints
//!
//! Endpoints:
//! - POST /register
//! - POST /login

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

use super::{ApiState, MessageResponse};
use crate::error::{ApiError, ErrorBody};
use crate::metrics::ServerMetrics;
use crate::storage::repository::NewUser;
use crate::storage::sqlite::{StoreError, UserProfile};

pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "jdoe")]
    pub initials: Option<String>,
    #[schema(example = "password123")]
    pub password: Option<String>,
    #[schema(example = "male")]
    pub gender: Option<String>,
    /// Stored as the user's role; defaults to `student`
    #[serde(rename = "userType")]
    #[schema(example = "student")]
    pub user_type: Option<String>,
    #[schema(example = "list1")]
    pub list: Option<String>,
    #[schema(example = "A")]
    pub group: Option<String>,
}

impl RegisterRequest {
    /// Apply required-field checks and defaults
    pub fn into_new_user(self) -> Result<NewUser, ApiError> {
        Ok(NewUser {
            initials: required(self.initials, "initials")?,
            password: required(self.password, "password")?,
            gender: required(self.gender, "gender")?,
            role: self
                .user_type
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| "student".to_string()),
            list: self.list.unwrap_or_default(),
            group: self.group.unwrap_or_default(),
        })
    }
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "jdoe")]
    pub initials: Option<String>,
    #[schema(example = "password123")]
    pub password: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub user: UserProfile,
}

fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::Validation(format!("Missing data for {}", field)))
}

// ============================================================================
// Handlers
// ============================================================================

#[utoipa::path(
    post,
    path = "/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = MessageResponse,
            example = json!({"success": true, "message": "Registration successful."})),
        (status = 400, description = "Missing data or invalid request", body = ErrorBody,
            example = json!({"success": false, "message": "Missing data for gender"})),
        (status = 409, description = "User already exists", body = ErrorBody,
            example = json!({"success": false, "message": "User already exists."})),
        (status = 500, description = "Store failure", body = ErrorBody),
    )
)]
pub async fn register(
    State(state): State<ApiState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let Json(req) = payload?;
    let new_user = req.into_new_user()?;

    match state.storage.registration.register(&new_user).await {
        Ok(()) => {
            ServerMetrics::incr(&state.metrics.registrations);
            Ok((
                StatusCode::CREATED,
                Json(MessageResponse::ok("Registration successful.")),
            ))
        }
        Err(StoreError::Conflict(_)) => {
            ServerMetrics::incr(&state.metrics.registration_conflicts);
            Err(ApiError::Conflict)
        }
        Err(e) => Err(e.into()),
    }
}

#[utoipa::path(
    post,
    path = "/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse,
            example = json!({
                "success": true,
                "message": "Login successful.",
                "user": {"initials": "jdoe", "role": "student", "list": "list1", "group": "A", "gender": "male"}
            })),
        (status = 400, description = "Missing data", body = ErrorBody,
            example = json!({"success": false, "message": "Missing data."})),
        (status = 401, description = "Invalid credentials", body = ErrorBody,
            example = json!({"success": false, "message": "Invalid credentials."})),
    )
)]
pub async fn login(
    State(state): State<ApiState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(req) = payload?;

    let (Some(initials), Some(password)) = (
        req.initials.filter(|v| !v.is_empty()),
        req.password.filter(|v| !v.is_empty()),
    ) else {
        return Err(ApiError::Validation("Missing data.".to_string()));
    };

    match state.storage.identity.verify_credentials(&initials, &password).await {
        Ok(user) => Ok(Json(LoginResponse {
            success: true,
            message: "Login successful.".to_string(),
            user,
        })),
        Err(StoreError::InvalidCredentials) => {
            ServerMetrics::incr(&state.metrics.failed_logins);
            warn!(initials = %initials, "Login rejected");
            Err(ApiError::AuthenticationFailed)
        }
        Err(e) => Err(e.into()),
    }
}
