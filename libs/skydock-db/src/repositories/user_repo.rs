use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::models::user::{AUTH_TYPE_PASSWORD, SshProfile, User};

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by id")
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        sqlx::query_as("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by username")
    }

    /// Fetch the panel row for a system account, creating it on first login.
    pub async fn get_or_create(&self, username: &str, email: Option<&str>) -> Result<User> {
        if let Some(user) = self.get_by_username(username).await? {
            return Ok(user);
        }

        sqlx::query("INSERT INTO users (username, email) VALUES (?, ?)")
            .bind(username)
            .bind(email)
            .execute(&self.pool)
            .await
            .context("Failed to create user")?;

        self.get_by_username(username)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User vanished after insert"))
    }
}

#[derive(Debug, Clone)]
pub struct SshProfileRepository {
    pool: SqlitePool,
}

impl SshProfileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_by_user(&self, user_id: i64) -> Result<Option<SshProfile>> {
        sqlx::query_as("SELECT * FROM ssh_profiles WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch SSH profile")
    }

    pub async fn get_or_create(&self, user_id: i64) -> Result<SshProfile> {
        if let Some(profile) = self.get_by_user(user_id).await? {
            return Ok(profile);
        }

        sqlx::query("INSERT INTO ssh_profiles (user_id, auth_type) VALUES (?, ?)")
            .bind(user_id)
            .bind(AUTH_TYPE_PASSWORD)
            .execute(&self.pool)
            .await
            .context("Failed to create SSH profile")?;

        self.get_by_user(user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("SSH profile vanished after insert"))
    }

    /// Update the profile. Secret fields are already-encrypted values;
    /// passing `None` leaves the stored secret untouched.
    pub async fn update(
        &self,
        user_id: i64,
        ssh_username: &str,
        auth_type: &str,
        encrypted_password: Option<&str>,
        encrypted_private_key: Option<&str>,
    ) -> Result<SshProfile> {
        self.get_or_create(user_id).await?;

        sqlx::query(
            "UPDATE ssh_profiles SET ssh_username = ?, auth_type = ?,
                ssh_password = COALESCE(?, ssh_password),
                ssh_private_key = COALESCE(?, ssh_private_key),
                updated_at = CURRENT_TIMESTAMP
             WHERE user_id = ?",
        )
        .bind(ssh_username)
        .bind(auth_type)
        .bind(encrypted_password)
        .bind(encrypted_private_key)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .context("Failed to update SSH profile")?;

        self.get_by_user(user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("SSH profile vanished after update"))
    }
}
