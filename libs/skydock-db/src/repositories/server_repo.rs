use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::models::server::{NewServer, Server};

#[derive(Debug, Clone)]
pub struct ServerRepository {
    pool: SqlitePool,
}

impl ServerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_local(&self) -> Result<Option<Server>> {
        sqlx::query_as("SELECT * FROM servers WHERE is_local = 1 ORDER BY id LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch local server")
    }

    pub async fn insert_local(&self, server: &NewServer) -> Result<Server> {
        sqlx::query(
            "INSERT INTO servers (hostname, ip_address, os_name, os_version,
                total_ram, total_disk, cpu_count, is_local)
             VALUES (?, ?, ?, ?, ?, ?, ?, 1)",
        )
        .bind(&server.hostname)
        .bind(&server.ip_address)
        .bind(&server.os_name)
        .bind(&server.os_version)
        .bind(server.total_ram)
        .bind(server.total_disk)
        .bind(server.cpu_count)
        .execute(&self.pool)
        .await
        .context("Failed to insert server")?;

        self.get_local()
            .await?
            .ok_or_else(|| anyhow::anyhow!("Server row vanished after insert"))
    }
}
