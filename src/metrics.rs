//! Server Metrics: request and scoreboard counters with Prometheus + JSON export
//!
//! Uses lock-free atomics for all counters.
//!
//! ## Endpoints
//! - `GET /metrics`: Prometheus text format
//! - `GET /metrics/json`: JSON format

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::api::ApiState;

/// Shared metrics state (all lock-free atomics)
#[derive(Debug)]
pub struct ServerMetrics {
    /// Total HTTP requests served
    pub total_requests: AtomicU64,
    /// Total request errors (4xx + 5xx)
    pub total_errors: AtomicU64,
    /// Cumulative request duration in microseconds (for computing average)
    pub total_duration_us: AtomicU64,
    pub registrations: AtomicU64,
    pub registration_conflicts: AtomicU64,
    pub failed_logins: AtomicU64,
    pub attempts_recorded: AtomicU64,
    pub start_time: Instant,
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            total_duration_us: AtomicU64::new(0),
            registrations: AtomicU64::new(0),
            registration_conflicts: AtomicU64::new(0),
            failed_logins: AtomicU64::new(0),
            attempts_recorded: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }
}

impl ServerMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_request(&self, duration_us: u64, is_error: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_duration_us.fetch_add(duration_us, Ordering::Relaxed);
        if is_error {
            self.total_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    pub fn avg_duration_ms(&self) -> f64 {
        let total = self.total_requests.load(Ordering::Relaxed);
        let dur_us = self.total_duration_us.load(Ordering::Relaxed);
        if total > 0 {
            (dur_us as f64 / total as f64) / 1000.0
        } else {
            0.0
        }
    }

    pub fn snapshot(&self) -> JsonMetrics {
        JsonMetrics {
            uptime_secs: self.uptime_secs(),
            total_requests: self.total_requests.load(Ordering::Relaxed),
            total_errors: self.total_errors.load(Ordering::Relaxed),
            avg_request_duration_ms: self.avg_duration_ms(),
            registrations: self.registrations.load(Ordering::Relaxed),
            registration_conflicts: self.registration_conflicts.load(Ordering::Relaxed),
            failed_logins: self.failed_logins.load(Ordering::Relaxed),
            attempts_recorded: self.attempts_recorded.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// Axum Middleware: Automatic request tracking
// ============================================================================

/// Middleware that records request count and duration for every HTTP request.
pub async fn metrics_middleware(
    State(state): State<ApiState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let resp = next.run(req).await;
    let duration_us = start.elapsed().as_micros() as u64;
    let is_error = resp.status().is_client_error() || resp.status().is_server_error();

    state.metrics.record_request(duration_us, is_error);
    resp
}

// ============================================================================
// GET /metrics: Prometheus text exposition format
// ============================================================================

pub async fn prometheus_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let m = state.metrics.snapshot();
    let avg_req_duration_s = m.avg_request_duration_ms / 1000.0;

    let body = format!(
        "# HELP scoreboard_requests_total Total HTTP requests served\n\
         # TYPE scoreboard_requests_total counter\n\
         scoreboard_requests_total {}\n\
         \n\
         # HELP scoreboard_request_errors_total Total HTTP request errors (4xx/5xx)\n\
         # TYPE scoreboard_request_errors_total counter\n\
         scoreboard_request_errors_total {}\n\
         \n\
         # HELP scoreboard_request_duration_seconds Average request duration\n\
         # TYPE scoreboard_request_duration_seconds gauge\n\
         scoreboard_request_duration_seconds {:.6}\n\
         \n\
         # HELP scoreboard_registrations_total Users registered\n\
         # TYPE scoreboard_registrations_total counter\n\
         scoreboard_registrations_total {}\n\
         \n\
         # HELP scoreboard_registration_conflicts_total Registrations rejected as duplicates\n\
         # TYPE scoreboard_registration_conflicts_total counter\n\
         scoreboard_registration_conflicts_total {}\n\
         \n\
         # HELP scoreboard_failed_logins_total Rejected credential checks\n\
         # TYPE scoreboard_failed_logins_total counter\n\
         scoreboard_failed_logins_total {}\n\
         \n\
         # HELP scoreboard_attempts_recorded_total Attempts appended to the log\n\
         # TYPE scoreboard_attempts_recorded_total counter\n\
         scoreboard_attempts_recorded_total {}\n\
         \n\
         # HELP scoreboard_uptime_seconds Server uptime\n\
         # TYPE scoreboard_uptime_seconds gauge\n\
         scoreboard_uptime_seconds {:.2}\n",
        m.total_requests,
        m.total_errors,
        avg_req_duration_s,
        m.registrations,
        m.registration_conflicts,
        m.failed_logins,
        m.attempts_recorded,
        m.uptime_secs,
    );

    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        body,
    )
}

// ============================================================================
// GET /metrics/json
// ============================================================================

#[derive(Debug, Serialize)]
pub struct JsonMetrics {
    pub uptime_secs: f64,
    pub total_requests: u64,
    pub total_errors: u64,
    pub avg_request_duration_ms: f64,
    pub registrations: u64,
    pub registration_conflicts: u64,
    pub failed_logins: u64,
    pub attempts_recorded: u64,
}

pub async fn json_metrics_handler(State(state): State<ApiState>) -> Json<JsonMetrics> {
    Json(state.metrics.snapshot())
}
