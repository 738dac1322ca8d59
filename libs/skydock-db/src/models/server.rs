use chrono::{DateTime, Utc};
use serde::Serialize;

/// Stored snapshot of a host. Exactly one `is_local` row exists per
/// deployment; it is created lazily from live metrics.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Server {
    pub id: i64,
    pub hostname: String,
    pub ip_address: String,
    pub os_name: String,
    pub os_version: String,
    pub total_ram: i64,
    pub total_disk: i64,
    pub cpu_count: i64,
    pub is_local: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to insert a server row; the rest is defaulted by the schema.
#[derive(Debug, Clone)]
pub struct NewServer {
    pub hostname: String,
    pub ip_address: String,
    pub os_name: String,
    pub os_version: String,
    pub total_ram: i64,
    pub total_disk: i64,
    pub cpu_count: i64,
}
