use chrono::{DateTime, Utc};
use serde::Serialize;

/// Panel identity for an OS account. Rows appear on first successful login;
/// the account itself is created and deleted out-of-band (`useradd`).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Remote-access credentials for a user. The `ssh_password` and
/// `ssh_private_key` columns hold AES-GCM ciphertext, never plaintext.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SshProfile {
    pub id: i64,
    pub user_id: i64,
    pub ssh_username: String,
    pub auth_type: String,
    pub ssh_password: Option<String>,
    pub ssh_private_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const AUTH_TYPE_PASSWORD: &str = "password";
pub const AUTH_TYPE_KEY: &str = "private_key";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub token: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
