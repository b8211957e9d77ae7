//! Progress Store - attempt log, per-level progress and derived statistics

use async_trait::async_trait;
use tracing::debug;

use super::repository::{ProgressRepo, RepoResult, UserLevelUpdate};
use super::sqlite::{LevelRow, ScoreStore, StatisticsRow, StoreError, UserLevelRow};

/// Upper bound on `tries` for one attempt; keeps `SUM(tries) * 60` in range
pub const MAX_TRIES: i64 = i32::MAX as i64;

#[async_trait]
impl ProgressRepo for ScoreStore {
    /// Append an attempt and refresh the user's statistics and leaderboard
    /// rows from the full attempt log, in one transaction.
    async fn record_attempt(&self, initials: &str, score: f64, tries: i64) -> RepoResult<i64> {
        if !(0..=MAX_TRIES).contains(&tries) {
            return Err(StoreError::Constraint(format!(
                "tries must be between 0 and {}, got {}",
                MAX_TRIES, tries
            )));
        }
        if !score.is_finite() {
            return Err(StoreError::Constraint("score must be a finite number".to_string()));
        }

        let mut tx = self.pool().begin().await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO objects (score, tries, user_initials) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(score)
        .bind(tries)
        .bind(initials)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| StoreError::foreign_key_as_not_found(e, format!("user '{}'", initials)))?;

        let (games_played, average_score, highest_score): (i64, Option<f64>, Option<f64>) =
            sqlx::query_as(
                "SELECT COUNT(*), AVG(score), MAX(score) FROM objects WHERE user_initials = ?",
            )
            .bind(initials)
            .fetch_one(&mut *tx)
            .await?;
        let average_score = average_score.unwrap_or(0.0);
        let highest_score = highest_score.unwrap_or(0.0);

        sqlx::query(
            "UPDATE statistics SET games_played = ?, average_score = ?, highest_score = ?
             WHERE initials = ?",
        )
        .bind(games_played)
        .bind(average_score)
        .bind(highest_score)
        .bind(initials)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE leaderboard SET highest_score = ? WHERE student_id = ?")
            .bind(highest_score)
            .bind(initials)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(initials, attempt_id = id, score, tries, "Recorded attempt");
        Ok(id)
    }

    /// Plain UPDATE; a missing (user, level) pair is reported, never inserted.
    async fn update_user_level(&self, initials: &str, update: &UserLevelUpdate) -> RepoResult<()> {
        let result = sqlx::query(
            "UPDATE user_levels SET score = ?, tries = ?, completed = ?
             WHERE user_initials = ? AND level_id = ?",
        )
        .bind(update.score)
        .bind(update.tries)
        .bind(update.completed)
        .bind(initials)
        .bind(update.level_id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!(
                "level {} for user '{}'",
                update.level_id, initials
            )));
        }

        Ok(())
    }

    async fn get_user_levels(&self, initials: &str) -> RepoResult<Vec<UserLevelRow>> {
        let rows = sqlx::query_as::<_, UserLevelRow>(
            "SELECT user_initials, level_id, completed, score, tries
             FROM user_levels WHERE user_initials = ?
             ORDER BY level_id",
        )
        .bind(initials)
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    async fn get_levels(&self) -> RepoResult<Vec<LevelRow>> {
        let rows = sqlx::query_as::<_, LevelRow>("SELECT id, name, max_score FROM levels ORDER BY id")
            .fetch_all(self.pool())
            .await?;

        Ok(rows)
    }

    async fn get_statistics(&self, initials: &str) -> RepoResult<Option<StatisticsRow>> {
        let row = sqlx::query_as::<_, StatisticsRow>(
            "SELECT initials, games_played, average_score, highest_score
             FROM statistics WHERE initials = ?",
        )
        .bind(initials)
        .fetch_optional(self.pool())
        .await?;

        Ok(row)
    }
}
