//! Reporting endpoints for the professor dashboard
//!
//! Endpoints:
//! - GET /data/points?group=A&lists=list1&lists=list2
//! - GET /data/time (same filters)
//! - GET /data/groups
//! - GET /data/lists?group=A
//! - GET /data/leaderboard
//! - GET /data/group-comparison

use axum::{
    extract::{RawQuery, State},
    routing::get,
    Json, Router,
};

use super::ApiState;
use crate::error::{ApiError, ErrorBody};
use crate::storage::reports::ReportFilter;
use crate::storage::sqlite::{GroupRow, GroupScores, LeaderboardRow, ListRow, PointsRow, TimeRow};

pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/data/points", get(points))
        .route("/data/time", get(time))
        .route("/data/groups", get(groups))
        .route("/data/lists", get(lists))
        .route("/data/leaderboard", get(leaderboard))
        .route("/data/group-comparison", get(group_comparison))
}

/// Read `group` and repeated `lists` (or `lists[]`) from a raw query string
pub fn parse_filter(raw: Option<&str>) -> Result<ReportFilter, ApiError> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(raw.unwrap_or(""))
        .map_err(|e| ApiError::Validation(format!("Malformed query string: {}", e)))?;

    let mut group = None;
    let mut lists = Vec::new();
    for (key, value) in pairs {
        match key.as_str() {
            "group" => group = Some(value),
            "lists" | "lists[]" => lists.push(value),
            _ => {}
        }
    }

    Ok(ReportFilter::new(group, lists))
}

#[utoipa::path(
    get,
    path = "/data/points",
    tag = "reports",
    params(
        ("group" = Option<String>, Query, description = "Exact group match; empty means all groups"),
        ("lists" = Option<Vec<String>>, Query, description = "Repeatable list filter, also accepted as `lists[]`"),
    ),
    responses(
        (status = 200, description = "Total score per user with at least one attempt", body = [PointsRow],
            example = json!([{"usuario_nombre": "jdoe", "grupo_nombre": "A", "list": "list1", "role": "student", "total_puntuacion": 175.0}])),
        (status = 400, description = "Malformed query string", body = ErrorBody),
    )
)]
pub async fn points(
    State(state): State<ApiState>,
    RawQuery(raw): RawQuery,
) -> Result<Json<Vec<PointsRow>>, ApiError> {
    let filter = parse_filter(raw.as_deref())?;
    Ok(Json(state.storage.reports.points_report(&filter).await?))
}

#[utoipa::path(
    get,
    path = "/data/time",
    tag = "reports",
    params(
        ("group" = Option<String>, Query, description = "Exact group match; empty means all groups"),
        ("lists" = Option<Vec<String>>, Query, description = "Repeatable list filter, also accepted as `lists[]`"),
    ),
    responses(
        (status = 200, description = "Modelled play time per user, 60 seconds per try", body = [TimeRow],
            example = json!([{"usuario_nombre": "jdoe", "grupo_nombre": "A", "list": "list1", "role": "student", "total_tiempo": 240}])),
        (status = 400, description = "Malformed query string", body = ErrorBody),
    )
)]
pub async fn time(
    State(state): State<ApiState>,
    RawQuery(raw): RawQuery,
) -> Result<Json<Vec<TimeRow>>, ApiError> {
    let filter = parse_filter(raw.as_deref())?;
    Ok(Json(state.storage.reports.time_report(&filter).await?))
}

#[utoipa::path(
    get,
    path = "/data/groups",
    tag = "reports",
    responses((status = 200, description = "Distinct non-null groups", body = [GroupRow],
        example = json!([{"group_name": "A"}, {"group_name": "B"}])))
)]
pub async fn groups(State(state): State<ApiState>) -> Result<Json<Vec<GroupRow>>, ApiError> {
    Ok(Json(state.storage.reports.groups().await?))
}

#[utoipa::path(
    get,
    path = "/data/lists",
    tag = "reports",
    params(("group" = Option<String>, Query, description = "Only lists used within this group")),
    responses((status = 200, description = "Distinct lists", body = [ListRow],
        example = json!([{"list": "list1"}, {"list": "list2"}])))
)]
pub async fn lists(
    State(state): State<ApiState>,
    RawQuery(raw): RawQuery,
) -> Result<Json<Vec<ListRow>>, ApiError> {
    let filter = parse_filter(raw.as_deref())?;
    Ok(Json(state.storage.reports.lists(filter.group.as_deref()).await?))
}

#[utoipa::path(
    get,
    path = "/data/leaderboard",
    tag = "reports",
    responses((status = 200, description = "Best score per user, highest first", body = [LeaderboardRow],
        example = json!([{"usuario_nombre": "jdoe", "highest_score": 95.0, "role": "student"}])))
)]
pub async fn leaderboard(State(state): State<ApiState>) -> Result<Json<Vec<LeaderboardRow>>, ApiError> {
    Ok(Json(state.storage.reports.leaderboard().await?))
}

#[utoipa::path(
    get,
    path = "/data/group-comparison",
    tag = "reports",
    responses((status = 200, description = "Raw attempt scores for groups A to D", body = [GroupScores],
        example = json!([{"group": "A", "scores": [95.0, 80.0, 75.0]}, {"group": "B", "scores": [85.0]}])))
)]
pub async fn group_comparison(
    State(state): State<ApiState>,
) -> Result<Json<Vec<GroupScores>>, ApiError> {
    Ok(Json(state.storage.reports.group_comparison().await?))
}
