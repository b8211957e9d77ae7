//! SQLite Storage - connection pool, schema gate and row types
//!
//! Every table lives in one SQLite database accessed through `sqlx`.
//! Foreign keys are switched on per connection so referential integrity
//! is enforced by the store itself, not by callers.
//!
//! ## Tables
//! - users, statistics, leaderboard
//! - objects (attempt log), levels, user_levels

use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use utoipa::ToSchema;

use super::migrations;
use crate::password::PasswordError;

/// How long a statement waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite connection pool wrapper
#[derive(Clone)]
pub struct ScoreStore {
    pool: SqlitePool,
    schema: Arc<OnceCell<()>>,
}

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    Conflict(String),
    #[error("Constraint violation: {0}")]
    Constraint(String),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Password error: {0}")]
    Password(#[from] PasswordError),
}

impl StoreError {
    /// Remap a primary-key/unique violation to `Conflict`
    pub(crate) fn unique_as_conflict(err: sqlx::Error, what: impl Into<String>) -> Self {
        if is_unique_violation(&err) {
            StoreError::Conflict(what.into())
        } else {
            StoreError::Sqlx(err)
        }
    }

    /// Remap a foreign-key violation to `NotFound`
    pub(crate) fn foreign_key_as_not_found(err: sqlx::Error, what: impl Into<String>) -> Self {
        if is_foreign_key_violation(&err) {
            StoreError::NotFound(what.into())
        } else {
            StoreError::Sqlx(err)
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            // Older SQLite builds report only the primary code; fall back to the message.
            db_err.is_unique_violation() || db_err.message().contains("UNIQUE constraint failed")
        }
        _ => false,
    }
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_foreign_key_violation()
                || db_err.message().contains("FOREIGN KEY constraint failed")
        }
        _ => false,
    }
}

impl ScoreStore {
    /// Open the database and make sure the schema exists
    ///
    /// The returned store is always schema-ready; the HTTP layer is never
    /// handed a store that has not passed the schema gate.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let in_memory = is_in_memory(database_url);
        if !in_memory {
            create_parent_dir(database_url)?;
        }

        let mut options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Each in-memory connection is its own database, so pin the pool to
        // one connection that is never recycled.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections)
        };

        let pool = pool_options
            .acquire_timeout(acquire_timeout)
            .connect_with(options)
            .await?;

        info!(
            "SQLite connected: {} (max_connections={})",
            database_url,
            if in_memory { 1 } else { max_connections }
        );

        let store = Self::from_pool(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Wrap an existing pool. The schema gate has not run yet.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            schema: Arc::new(OnceCell::new()),
        }
    }

    /// Get reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Whether `ensure_schema` has completed for this store
    pub fn is_schema_ready(&self) -> bool {
        self.schema.initialized()
    }

    /// Create all tables and default levels, once per process
    ///
    /// Concurrent callers wait on the first run. A failed run leaves the
    /// gate open so the next caller retries.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.schema.get_or_try_init(|| self.create_schema()).await?;
        Ok(())
    }

    async fn create_schema(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for (name, sql) in migrations::schema_statements() {
            sqlx::query(sql)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Migration(format!("{}: {}", name, e)))?;
            debug!("Schema object ensured: {}", name);
        }

        let level_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM levels")
            .fetch_one(&mut *tx)
            .await?;

        if level_count == 0 {
            for (name, max_score) in migrations::DEFAULT_LEVELS {
                sqlx::query("INSERT INTO levels (name, max_score) VALUES (?, ?)")
                    .bind(name)
                    .bind(max_score)
                    .execute(&mut *tx)
                    .await?;
            }
            info!("Seeded {} default levels", migrations::DEFAULT_LEVELS.len());
        }

        tx.commit().await?;
        info!("Schema ready");
        Ok(())
    }
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

/// `sqlite://data/scores.db?mode=rwc` -> make sure `data/` exists
fn create_parent_dir(database_url: &str) -> Result<(), StoreError> {
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);
    let path = path.split('?').next().unwrap_or(path);

    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Migration(format!("create {}: {}", parent.display(), e)))?;
        }
    }
    Ok(())
}

// ============================================================================
// Row types (for sqlx query_as mapping)
// ============================================================================

#[derive(Clone, FromRow)]
pub struct UserRow {
    pub initials: String,
    #[sqlx(rename = "password")]
    pub password_hash: String,
    pub role: String,
    pub list: Option<String>,
    pub group: Option<String>,
    pub gender: Option<String>,
}

impl std::fmt::Debug for UserRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRow")
            .field("initials", &self.initials)
            .field("password_hash", &"<redacted>")
            .field("role", &self.role)
            .field("list", &self.list)
            .field("group", &self.group)
            .field("gender", &self.gender)
            .finish()
    }
}

/// User projection safe to return to clients (no credential)
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct UserProfile {
    pub initials: String,
    pub role: String,
    pub list: Option<String>,
    pub group: Option<String>,
    pub gender: Option<String>,
}

impl From<UserRow> for UserProfile {
    fn from(row: UserRow) -> Self {
        Self {
            initials: row.initials,
            role: row.role,
            list: row.list,
            group: row.group,
            gender: row.gender,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StatisticsRow {
    pub initials: String,
    pub games_played: i64,
    pub average_score: f64,
    pub highest_score: f64,
}

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct LevelRow {
    pub id: i64,
    pub name: String,
    pub max_score: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct UserLevelRow {
    pub user_initials: String,
    pub level_id: i64,
    pub completed: bool,
    pub score: i64,
    pub tries: i64,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, ToSchema)]
pub struct PointsRow {
    pub usuario_nombre: String,
    pub grupo_nombre: Option<String>,
    pub list: Option<String>,
    pub role: String,
    pub total_puntuacion: f64,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, ToSchema)]
pub struct TimeRow {
    pub usuario_nombre: String,
    pub grupo_nombre: Option<String>,
    pub list: Option<String>,
    pub role: String,
    pub total_tiempo: i64,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, ToSchema)]
pub struct GroupRow {
    pub group_name: String,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, ToSchema)]
pub struct ListRow {
    pub list: Option<String>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, ToSchema)]
pub struct LeaderboardRow {
    pub usuario_nombre: String,
    pub highest_score: f64,
    pub role: String,
}

/// Raw attempt scores of one comparison group, in attempt order
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct GroupScores {
    pub group: String,
    pub scores: Vec<f64>,
}
