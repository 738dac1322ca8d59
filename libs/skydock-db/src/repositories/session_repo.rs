use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use sqlx::SqlitePool;

use crate::models::user::{Session, User};

#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user_id: i64, ttl_hours: i64) -> Result<Session> {
        let token = uuid::Uuid::new_v4().to_string();
        let expires_at = Utc::now() + Duration::hours(ttl_hours);

        sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES (?, ?, ?)")
            .bind(&token)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .context("Failed to create session")?;

        sqlx::query_as("SELECT * FROM sessions WHERE token = ?")
            .bind(&token)
            .fetch_one(&self.pool)
            .await
            .context("Session vanished after insert")
    }

    /// Resolve a session token to its user, rejecting expired tokens and
    /// tokens whose user row no longer exists (stale cookies after a wipe).
    /// Expiry is checked here, not in SQL: CURRENT_TIMESTAMP and the driver's
    /// datetime encoding use different text formats.
    pub async fn resolve_user(&self, token: &str) -> Result<Option<User>> {
        let session: Option<Session> = sqlx::query_as("SELECT * FROM sessions WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to resolve session")?;

        let Some(session) = session else { return Ok(None) };
        if session.is_expired(Utc::now()) {
            return Ok(None);
        }

        let user: Option<User> =
            sqlx::query_as("SELECT * FROM users WHERE id = ? AND is_active = 1")
                .bind(session.user_id)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to fetch session user")?;

        Ok(user)
    }

    pub async fn delete(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    pub async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .context("Failed to purge sessions")?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::user_repo::UserRepository;

    async fn test_pool() -> (SqlitePool, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("test.db").display());
        (crate::connect(&url).await.unwrap(), dir)
    }

    #[tokio::test]
    async fn session_round_trip() {
        let (pool, _dir) = test_pool().await;
        let user = UserRepository::new(pool.clone())
            .get_or_create("alice", Some("alice@localhost"))
            .await
            .unwrap();

        let repo = SessionRepository::new(pool);
        let session = repo.create(user.id, 24).await.unwrap();

        let resolved = repo.resolve_user(&session.token).await.unwrap().unwrap();
        assert_eq!(resolved.username, "alice");

        repo.delete(&session.token).await.unwrap();
        assert!(repo.resolve_user(&session.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_sessions_do_not_resolve() {
        let (pool, _dir) = test_pool().await;
        let user = UserRepository::new(pool.clone())
            .get_or_create("bob", None)
            .await
            .unwrap();

        let repo = SessionRepository::new(pool);
        // Negative TTL puts expiry in the past.
        let session = repo.create(user.id, -1).await.unwrap();

        assert!(repo.resolve_user(&session.token).await.unwrap().is_none());
        assert_eq!(repo.purge_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_tokens_resolve_to_none() {
        let (pool, _dir) = test_pool().await;
        let repo = SessionRepository::new(pool);
        assert!(repo.resolve_user("not-a-token").await.unwrap().is_none());
    }
}
