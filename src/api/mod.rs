//! HTTP/JSON API Layer
//!
//! Thin axum layer over the storage repositories. Handlers decode the
//! request, call one repository, and serialize the result; every failure
//! goes out through [`ApiError`](crate::error::ApiError).
//!
//! ## Architecture
//! ```text
//! Game client / reporting dashboard
//!       ↓ HTTP, JSON body
//! Axum Router (CORS, tracing, metrics)
//!       ↓
//! Handlers (auth, reports, levels)
//!       ↓
//! StorageManager (SQLite)
//! ```

pub mod auth;
pub mod docs;
pub mod levels;
pub mod reports;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::config::ServerConfig;
use crate::metrics::ServerMetrics;
use crate::storage::repository::StorageManager;

/// Shared state available to all API handlers
#[derive(Clone)]
pub struct ApiState {
    pub storage: Arc<StorageManager>,
    /// Server-wide metrics (lock-free atomics)
    pub metrics: Arc<ServerMetrics>,
}

impl ApiState {
    pub fn new(storage: StorageManager) -> Self {
        Self {
            storage: Arc::new(storage),
            metrics: ServerMetrics::new(),
        }
    }
}

/// `{success, message}` body shared by the write endpoints
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    status: String,
    schema_ready: bool,
    version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "ops",
    responses((status = 200, description = "Readiness and build version", body = HealthResponse))
)]
pub async fn health_check(State(state): State<ApiState>) -> Json<HealthResponse> {
    let schema_ready = state.storage.schema_ready();
    Json(HealthResponse {
        status: if schema_ready { "ok" } else { "starting" }.to_string(),
        schema_ready,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Build the full API router with all service endpoints
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(crate::metrics::prometheus_handler))
        .route("/metrics/json", get(crate::metrics::json_metrics_handler))
        .route("/apidocs/openapi.json", get(docs::openapi_json))
        .merge(auth::routes())
        .merge(reports::routes())
        .merge(levels::routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::metrics::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS policy for the dashboard origin
///
/// An origin that is not a valid header value disables cross-origin access.
pub fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    match HeaderValue::from_str(origin) {
        Ok(value) => layer.allow_origin(value),
        Err(_) => {
            warn!("Invalid CORS origin {:?}; cross-origin requests disabled", origin);
            layer
        }
    }
}

/// Start the HTTP API server
///
/// `storage` has already passed the schema gate, so requests are only
/// accepted against a fully initialized store.
pub async fn start_api_server(
    storage: StorageManager,
    config: &ServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let state = ApiState::new(storage);
    let app = build_router(state).layer(cors_layer(&config.cors_origin));

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received");
        })
        .await?;
    Ok(())
}
