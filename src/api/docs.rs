//! OpenAPI description of the HTTP surface
//!
//! Generated from the `#[utoipa::path]` annotations on each handler and
//! served as JSON at `GET /apidocs/openapi.json`.

use axum::Json;
use utoipa::OpenApi;

use super::{auth, levels, reports};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Scoreboard API",
        description = "Registration, login, level progress and reporting for the educational game"
    ),
    paths(
        super::health_check,
        auth::register,
        auth::login,
        reports::points,
        reports::time,
        reports::groups,
        reports::lists,
        reports::leaderboard,
        reports::group_comparison,
        levels::list_levels,
        levels::get_user_levels,
        levels::update_user_level,
        levels::record_attempt,
    ),
    tags(
        (name = "auth", description = "Account registration and login"),
        (name = "reports", description = "Professor dashboard aggregates"),
        (name = "levels", description = "Levels, per-level progress and the attempt log"),
        (name = "ops", description = "Readiness"),
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
