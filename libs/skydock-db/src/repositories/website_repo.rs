use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::models::website::{DatabaseCredential, STATUS_ACTIVE, Website};

/// Fields captured at creation time; the provisioner fills in the rest.
#[derive(Debug, Clone)]
pub struct NewWebsite {
    pub user_id: i64,
    pub domain: String,
    pub root_path: String,
    pub site_type: String,
    pub web_server: String,
    pub php_version: String,
    pub wp_admin_user: Option<String>,
    pub wp_admin_email: Option<String>,
    pub wp_admin_password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WebsiteRepository {
    pool: SqlitePool,
}

impl WebsiteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Website>> {
        sqlx::query_as("SELECT * FROM websites WHERE user_id = ? ORDER BY created_at DESC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list websites")
    }

    /// Ownership check included: other users' sites are invisible, not forbidden.
    pub async fn get_for_user(&self, id: i64, user_id: i64) -> Result<Option<Website>> {
        sqlx::query_as("SELECT * FROM websites WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch website")
    }

    /// Domains are unique per deployment, not per user.
    pub async fn domain_exists(&self, domain: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM websites WHERE domain = ?)")
            .bind(domain)
            .fetch_one(&self.pool)
            .await
            .context("Failed to check domain uniqueness")?;
        Ok(exists)
    }

    pub async fn create(&self, site: &NewWebsite) -> Result<Website> {
        let result = sqlx::query(
            "INSERT INTO websites (user_id, domain, root_path, site_type, web_server,
                php_version, status, wp_admin_user, wp_admin_email, wp_admin_password)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(site.user_id)
        .bind(&site.domain)
        .bind(&site.root_path)
        .bind(&site.site_type)
        .bind(&site.web_server)
        .bind(&site.php_version)
        .bind(STATUS_ACTIVE)
        .bind(&site.wp_admin_user)
        .bind(&site.wp_admin_email)
        .bind(&site.wp_admin_password)
        .execute(&self.pool)
        .await
        .context("Failed to insert website")?;

        let id = result.last_insert_rowid();
        sqlx::query_as("SELECT * FROM websites WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .context("Website vanished after insert")
    }

    pub async fn set_status(&self, id: i64, status: &str) -> Result<()> {
        sqlx::query("UPDATE websites SET status = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update website status")?;
        Ok(())
    }

    pub async fn set_php_version(&self, id: i64, php_version: &str) -> Result<()> {
        sqlx::query("UPDATE websites SET php_version = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
            .bind(php_version)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update website")?;
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM websites WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete website")?;
        Ok(())
    }

    pub async fn create_credential(
        &self,
        website_id: i64,
        db_name: &str,
        db_user: &str,
        db_password: &str,
        db_host: &str,
    ) -> Result<DatabaseCredential> {
        sqlx::query(
            "INSERT INTO database_credentials (website_id, db_name, db_user, db_password, db_host)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(website_id)
        .bind(db_name)
        .bind(db_user)
        .bind(db_password)
        .bind(db_host)
        .execute(&self.pool)
        .await
        .context("Failed to insert database credential")?;

        sqlx::query_as("SELECT * FROM database_credentials WHERE website_id = ?")
            .bind(website_id)
            .fetch_one(&self.pool)
            .await
            .context("Credential vanished after insert")
    }

    pub async fn get_credential(&self, website_id: i64) -> Result<Option<DatabaseCredential>> {
        sqlx::query_as("SELECT * FROM database_credentials WHERE website_id = ?")
            .bind(website_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch database credential")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::user_repo::UserRepository;

    async fn seeded() -> (WebsiteRepository, i64, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("test.db").display());
        let pool = crate::connect(&url).await.unwrap();
        let user = UserRepository::new(pool.clone())
            .get_or_create("alice", None)
            .await
            .unwrap();
        (WebsiteRepository::new(pool), user.id, dir)
    }

    fn new_site(user_id: i64, domain: &str) -> NewWebsite {
        NewWebsite {
            user_id,
            domain: domain.to_string(),
            root_path: format!("/var/www/skydock/alice/{}", domain),
            site_type: "php".to_string(),
            web_server: "nginx".to_string(),
            php_version: "8.1".to_string(),
            wp_admin_user: None,
            wp_admin_email: None,
            wp_admin_password: None,
        }
    }

    #[tokio::test]
    async fn domain_uniqueness_is_deployment_wide() {
        let (repo, user_id, _dir) = seeded().await;
        assert!(!repo.domain_exists("example.com").await.unwrap());

        repo.create(&new_site(user_id, "example.com")).await.unwrap();
        assert!(repo.domain_exists("example.com").await.unwrap());

        // The UNIQUE constraint backs up the pre-check.
        assert!(repo.create(&new_site(user_id, "example.com")).await.is_err());
    }

    #[tokio::test]
    async fn credentials_follow_their_website() {
        let (repo, user_id, _dir) = seeded().await;
        let site = repo.create(&new_site(user_id, "wp.example.com")).await.unwrap();

        assert!(repo.get_credential(site.id).await.unwrap().is_none());
        repo.create_credential(site.id, "wp_wp_example_com", "wp_wp_example_co", "pw", "localhost")
            .await
            .unwrap();

        let cred = repo.get_credential(site.id).await.unwrap().unwrap();
        assert_eq!(cred.db_name, "wp_wp_example_com");

        // ON DELETE CASCADE cleans the credential up with the site.
        repo.delete(site.id).await.unwrap();
        assert!(repo.get_credential(site.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn status_updates_are_visible(){
        let (repo, user_id, _dir) = seeded().await;
        let site = repo.create(&new_site(user_id, "toggle.example.com")).await.unwrap();
        assert_eq!(site.status, STATUS_ACTIVE);

        repo.set_status(site.id, "disabled").await.unwrap();
        let site = repo.get_for_user(site.id, user_id).await.unwrap().unwrap();
        assert_eq!(site.status, "disabled");
    }

    #[tokio::test]
    async fn ownership_scopes_lookups() {
        let (repo, user_id, _dir) = seeded().await;
        let site = repo.create(&new_site(user_id, "mine.example.com")).await.unwrap();

        assert!(repo.get_for_user(site.id, user_id).await.unwrap().is_some());
        assert!(repo.get_for_user(site.id, user_id + 1).await.unwrap().is_none());
    }
}
