//! Scoreboard Server Library
//!
//! Scoring and reporting backend for the educational game:
//! - Registration that seeds a user's statistics, leaderboard and per-level rows atomically
//! - Credential checks against salted Argon2 hashes
//! - Attempt log and per-level progress tracking
//! - Filter-driven reports (points, time, leaderboard, group comparison)
//! - HTTP/JSON API over axum

pub mod api;  // HTTP/JSON endpoints
pub mod config;  // Environment-driven server settings
pub mod error;  // API error taxonomy -> HTTP status
pub mod metrics;  // Request + scoreboard counters (Prometheus + JSON export)
pub mod password;  // Argon2id hashing
pub mod storage;  // SQLite repositories

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::ApiError;
pub use storage::repository::StorageManager;
pub use storage::sqlite::{ScoreStore, StoreError};
