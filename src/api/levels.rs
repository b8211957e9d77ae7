//! Progress endpoints: levels, per-level progress and the attempt log
//!
//! Endpoints:
//! - GET /levels
//! - GET /user_levels/{initials}
//! - PUT /user_levels/{initials}
//! - POST /attempts

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ApiState;
use crate::error::{ApiError, ErrorBody};
use crate::metrics::ServerMetrics;
use crate::storage::repository::UserLevelUpdate;
use crate::storage::sqlite::{LevelRow, UserLevelRow};

pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/levels", get(list_levels))
        .route(
            "/user_levels/{initials}",
            get(get_user_levels).put(update_user_level),
        )
        .route("/attempts", post(record_attempt))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize, ToSchema)]
pub struct UpdateUserLevelRequest {
    #[schema(example = 1)]
    pub level_id: Option<i64>,
    /// Fractional scores are rounded to the nearest whole point
    #[schema(example = 95.5)]
    pub score: Option<f64>,
    #[schema(example = 3)]
    pub tries: Option<i64>,
    #[schema(example = true)]
    pub completed: Option<bool>,
}

impl UpdateUserLevelRequest {
    pub fn into_update(self) -> Result<UserLevelUpdate, ApiError> {
        let level_id = self
            .level_id
            .ok_or_else(|| ApiError::Validation("Missing data for level_id".to_string()))?;

        Ok(UserLevelUpdate {
            level_id,
            score: self.score.unwrap_or(0.0).round() as i64,
            tries: self.tries.unwrap_or(0),
            completed: self.completed.unwrap_or(false),
        })
    }
}

#[derive(Serialize, ToSchema)]
pub struct UpdateUserLevelResponse {
    pub message: String,
}

#[derive(Deserialize, ToSchema)]
pub struct RecordAttemptRequest {
    #[schema(example = "jdoe")]
    pub initials: Option<String>,
    #[schema(example = 87.5)]
    pub score: Option<f64>,
    #[schema(example = 2)]
    pub tries: Option<i64>,
}

#[derive(Serialize, ToSchema)]
pub struct RecordAttemptResponse {
    pub success: bool,
    pub id: i64,
}

// ============================================================================
// Handlers
// ============================================================================

#[utoipa::path(
    get,
    path = "/levels",
    tag = "levels",
    responses((status = 200, description = "All levels, ordered by id", body = [LevelRow]))
)]
pub async fn list_levels(State(state): State<ApiState>) -> Result<Json<Vec<LevelRow>>, ApiError> {
    Ok(Json(state.storage.progress.get_levels().await?))
}

#[utoipa::path(
    get,
    path = "/user_levels/{initials}",
    tag = "levels",
    params(("initials" = String, Path, description = "User identity")),
    responses(
        (status = 200, description = "Per-level progress, ordered by level id", body = [UserLevelRow]),
        (status = 404, description = "Unknown user", body = ErrorBody),
    )
)]
pub async fn get_user_levels(
    State(state): State<ApiState>,
    Path(initials): Path<String>,
) -> Result<Json<Vec<UserLevelRow>>, ApiError> {
    if !state.storage.identity.exists(&initials).await? {
        return Err(ApiError::NotFound(format!("user '{}'", initials)));
    }
    Ok(Json(state.storage.progress.get_user_levels(&initials).await?))
}

#[utoipa::path(
    put,
    path = "/user_levels/{initials}",
    tag = "levels",
    params(("initials" = String, Path, description = "User identity")),
    request_body = UpdateUserLevelRequest,
    responses(
        (status = 200, description = "Progress updated", body = UpdateUserLevelResponse,
            example = json!({"message": "User level updated successfully"})),
        (status = 400, description = "Missing level_id or malformed body", body = ErrorBody),
        (status = 404, description = "No such (user, level) pair", body = ErrorBody),
    )
)]
pub async fn update_user_level(
    State(state): State<ApiState>,
    Path(initials): Path<String>,
    payload: Result<Json<UpdateUserLevelRequest>, JsonRejection>,
) -> Result<Json<UpdateUserLevelResponse>, ApiError> {
    let Json(req) = payload?;
    let update = req.into_update()?;
    state.storage.progress.update_user_level(&initials, &update).await?;

    Ok(Json(UpdateUserLevelResponse {
        message: "User level updated successfully".to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/attempts",
    tag = "levels",
    request_body = RecordAttemptRequest,
    responses(
        (status = 201, description = "Attempt recorded", body = RecordAttemptResponse,
            example = json!({"success": true, "id": 42})),
        (status = 400, description = "Missing or out-of-range field", body = ErrorBody),
        (status = 404, description = "Unknown user", body = ErrorBody),
    )
)]
pub async fn record_attempt(
    State(state): State<ApiState>,
    payload: Result<Json<RecordAttemptRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RecordAttemptResponse>), ApiError> {
    let Json(req) = payload?;
    let initials = req
        .initials
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("Missing data for initials".to_string()))?;
    let score = req
        .score
        .ok_or_else(|| ApiError::Validation("Missing data for score".to_string()))?;
    let tries = req
        .tries
        .ok_or_else(|| ApiError::Validation("Missing data for tries".to_string()))?;

    let id = state.storage.progress.record_attempt(&initials, score, tries).await?;
    ServerMetrics::incr(&state.metrics.attempts_recorded);

    Ok((
        StatusCode::CREATED,
        Json(RecordAttemptResponse { success: true, id }),
    ))
}
