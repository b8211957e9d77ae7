//! Repository traits - abstraction layer for data access
//!
//! The HTTP layer only talks to these traits; `ScoreStore` implements
//! all of them over SQLite.

use async_trait::async_trait;

use super::reports::ReportFilter;
use super::sqlite::*;

/// Generic result type for repository operations
pub type RepoResult<T> = Result<T, StoreError>;

/// Registration input. `password` is plaintext and is hashed before it
/// reaches the store.
#[derive(Clone)]
pub struct NewUser {
    pub initials: String,
    pub password: String,
    pub role: String,
    pub list: String,
    pub group: String,
    pub gender: String,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("initials", &self.initials)
            .field("role", &self.role)
            .field("list", &self.list)
            .field("group", &self.group)
            .field("gender", &self.gender)
            .finish_non_exhaustive()
    }
}

/// New state for one (user, level) pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserLevelUpdate {
    pub level_id: i64,
    pub score: i64,
    pub tries: i64,
    pub completed: bool,
}

// ============================================================================
// Repositories
// ============================================================================

/// Users and credential checks
#[async_trait]
pub trait IdentityRepo: Send + Sync {
    async fn find_user(&self, initials: &str) -> RepoResult<Option<UserRow>>;
    async fn exists(&self, initials: &str) -> RepoResult<bool>;
    /// `Err(StoreError::InvalidCredentials)` for an unknown user or a wrong password alike
    async fn verify_credentials(&self, initials: &str, password: &str) -> RepoResult<UserProfile>;
}

/// The multi-table registration write
#[async_trait]
pub trait RegistrationRepo: Send + Sync {
    /// Creates the user, its statistics and leaderboard rows and one
    /// user_levels row per existing level, atomically.
    async fn register(&self, user: &NewUser) -> RepoResult<()>;
}

/// Attempts and per-level progress
#[async_trait]
pub trait ProgressRepo: Send + Sync {
    async fn record_attempt(&self, initials: &str, score: f64, tries: i64) -> RepoResult<i64>;
    async fn update_user_level(&self, initials: &str, update: &UserLevelUpdate) -> RepoResult<()>;
    async fn get_user_levels(&self, initials: &str) -> RepoResult<Vec<UserLevelRow>>;
    async fn get_levels(&self) -> RepoResult<Vec<LevelRow>>;
    async fn get_statistics(&self, initials: &str) -> RepoResult<Option<StatisticsRow>>;
}

/// Read-only reporting queries
#[async_trait]
pub trait ReportRepo: Send + Sync {
    async fn points_report(&self, filter: &ReportFilter) -> RepoResult<Vec<PointsRow>>;
    async fn time_report(&self, filter: &ReportFilter) -> RepoResult<Vec<TimeRow>>;
    async fn groups(&self) -> RepoResult<Vec<GroupRow>>;
    async fn lists(&self, group: Option<&str>) -> RepoResult<Vec<ListRow>>;
    async fn leaderboard(&self) -> RepoResult<Vec<LeaderboardRow>>;
    async fn group_comparison(&self) -> RepoResult<Vec<GroupScores>>;
}

// ============================================================================
// Unified Storage Manager
// ============================================================================

/// Central storage manager that holds all repositories
pub struct StorageManager {
    store: ScoreStore,
    pub identity: Box<dyn IdentityRepo>,
    pub registration: Box<dyn RegistrationRepo>,
    pub progress: Box<dyn ProgressRepo>,
    pub reports: Box<dyn ReportRepo>,
}

impl StorageManager {
    pub fn new(store: ScoreStore) -> Self {
        Self {
            identity: Box::new(store.clone()),
            registration: Box::new(store.clone()),
            progress: Box::new(store.clone()),
            reports: Box::new(store.clone()),
            store,
        }
    }

    pub fn schema_ready(&self) -> bool {
        self.store.is_schema_ready()
    }

    pub fn store(&self) -> &ScoreStore {
        &self.store
    }
}
