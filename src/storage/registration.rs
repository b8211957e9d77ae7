//! Registration Transactor - the one multi-table write path
//!
//! A user is only ever visible together with its statistics row, its
//! leaderboard row and one user_levels row per level that existed when it
//! registered. Levels created later are not fanned out to existing users.

use async_trait::async_trait;
use tracing::{info, warn};

use super::repository::{IdentityRepo, NewUser, RegistrationRepo, RepoResult};
use super::sqlite::{ScoreStore, StoreError};
use crate::password::{self, PasswordError};

#[async_trait]
impl RegistrationRepo for ScoreStore {
    async fn register(&self, user: &NewUser) -> RepoResult<()> {
        // Fast path only; the primary key below is the real authority.
        if self.exists(&user.initials).await? {
            warn!(initials = %user.initials, "Registration rejected: user exists");
            return Err(StoreError::Conflict(user.initials.clone()));
        }

        let plaintext = user.password.clone();
        let password_hash =
            tokio::task::spawn_blocking(move || password::hash_password(&plaintext))
                .await
                .map_err(|e| PasswordError::Hash(e.to_string()))??;

        // Dropping `tx` on any early return rolls everything back.
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            r#"INSERT INTO users (initials, password, role, list, "group", gender)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&user.initials)
        .bind(&password_hash)
        .bind(&user.role)
        .bind(&user.list)
        .bind(&user.group)
        .bind(&user.gender)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::unique_as_conflict(e, user.initials.clone()))?;

        sqlx::query(
            "INSERT INTO statistics (initials, games_played, average_score, highest_score)
             VALUES (?, 0, 0, 0)",
        )
        .bind(&user.initials)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO leaderboard (student_id, highest_score) VALUES (?, 0)")
            .bind(&user.initials)
            .execute(&mut *tx)
            .await?;

        let fanned_out = sqlx::query(
            "INSERT INTO user_levels (user_initials, level_id, completed, score, tries)
             SELECT ?, id, 0, 0, 0 FROM levels",
        )
        .bind(&user.initials)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        info!(
            initials = %user.initials,
            role = %user.role,
            levels = fanned_out,
            "Registered user"
        );
        Ok(())
    }
}
