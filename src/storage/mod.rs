//! Storage Layer - relational data access for the scoreboard
//!
//! Implements the Repository pattern over a single SQLite database:
//! - **Identity**: users and credential checks
//! - **Registration**: atomic user + statistics + leaderboard + level fan-out
//! - **Progress**: attempt log and per-level progress
//! - **Reports**: filter-composable aggregation queries
//!
//! ## Architecture
//! ```text
//! [HTTP handlers]
//!       ↓
//! [Repository Traits]  (StorageManager)
//!       ↓
//! [ScoreStore]  sqlx pool, run-once schema gate
//!       ↓
//! [SQLite]  users, statistics, leaderboard, objects, levels, user_levels
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! let storage = init_storage("sqlite://data/scoreboard.db", 10, Duration::from_secs(5)).await?;
//! storage.registration.register(&new_user).await?;
//! let board = storage.reports.leaderboard().await?;
//! ```

pub mod identity;
pub mod migrations;
pub mod progress;
pub mod registration;
pub mod reports;
pub mod repository;
pub mod sqlite;

use std::time::Duration;
use tracing::info;

use self::repository::StorageManager;
use self::sqlite::{ScoreStore, StoreError};

/// Initialize the complete storage layer
///
/// Connects, runs the schema gate and wires every repository to the store.
pub async fn init_storage(
    database_url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<StorageManager, StoreError> {
    let store = ScoreStore::connect(database_url, max_connections, acquire_timeout).await?;
    let manager = StorageManager::new(store);

    info!("StorageManager initialized (schema_ready={})", manager.schema_ready());
    Ok(manager)
}
