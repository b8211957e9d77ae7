//! Identity Store - user lookup and credential verification

use async_trait::async_trait;
use tracing::{debug, warn};

use super::repository::{IdentityRepo, RepoResult};
use super::sqlite::{ScoreStore, StoreError, UserProfile, UserRow};
use crate::password::{self, PasswordError};

#[async_trait]
impl IdentityRepo for ScoreStore {
    async fn find_user(&self, initials: &str) -> RepoResult<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"SELECT initials, password, role, list, "group", gender
               FROM users WHERE initials = ?"#,
        )
        .bind(initials)
        .fetch_optional(self.pool())
        .await?;

        Ok(row)
    }

    async fn exists(&self, initials: &str) -> RepoResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE initials = ?)")
                .bind(initials)
                .fetch_one(self.pool())
                .await?;

        Ok(exists)
    }

    async fn verify_credentials(&self, initials: &str, password: &str) -> RepoResult<UserProfile> {
        let Some(user) = self.find_user(initials).await? else {
            debug!("Credential check for unknown user");
            return Err(StoreError::InvalidCredentials);
        };

        let candidate = password.to_string();
        let stored = user.password_hash.clone();
        let verified = tokio::task::spawn_blocking(move || {
            password::verify_password(&candidate, &stored)
        })
        .await
        .map_err(|e| PasswordError::Hash(e.to_string()))?;

        match verified {
            Ok(true) => Ok(UserProfile::from(user)),
            Ok(false) => Err(StoreError::InvalidCredentials),
            Err(e) => {
                warn!(initials = %user.initials, "Stored credential unusable: {}", e);
                Err(StoreError::InvalidCredentials)
            }
        }
    }
}
