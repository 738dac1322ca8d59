//! Website provisioning: document roots, vhost files, site enablement and
//! the WordPress pipeline. Each step either succeeds or aborts the rest and
//! names itself; artifacts created before a failure are left behind on
//! purpose (no rollback protocol).

pub mod vhost;
pub mod wordpress;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use skydock_db::models::website::{SiteType, WebServer, Website};
use skydock_db::repositories::website_repo::WebsiteRepository;
use skydock_db::sqlx::SqlitePool;
use tracing::{info, warn};

use crate::config::Config;
use crate::crypto::generate_password;
use crate::exec::CommandRunner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    DocumentRoot,
    StarterIndex,
    MysqlDatabase,
    WordpressDownload,
    WpConfig,
    WordpressInstall,
    VhostConfig,
    EnableSite,
    DisableSite,
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProvisionStep::DocumentRoot => "document_root",
            ProvisionStep::StarterIndex => "starter_index",
            ProvisionStep::MysqlDatabase => "mysql_database",
            ProvisionStep::WordpressDownload => "wordpress_download",
            ProvisionStep::WpConfig => "wp_config",
            ProvisionStep::WordpressInstall => "wordpress_install",
            ProvisionStep::VhostConfig => "vhost_config",
            ProvisionStep::EnableSite => "enable_site",
            ProvisionStep::DisableSite => "disable_site",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("Invalid domain '{0}'")]
    InvalidDomain(String),
    #[error("A website with this domain already exists")]
    DuplicateDomain,
    #[error("step {step} failed: {message}")]
    Step { step: ProvisionStep, message: String },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ProvisionError {
    fn step(step: ProvisionStep, message: impl Into<String>) -> Self {
        Self::Step { step, message: message.into() }
    }
}

/// Domain syntax check: DNS label rules, at least one dot, lowercase input.
pub fn validate_domain(domain: &str) -> bool {
    if domain.len() < 3 || domain.len() > 253 || !domain.contains('.') {
        return false;
    }
    domain.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    })
}

pub struct Provisioner {
    config: Arc<Config>,
    runner: Arc<dyn CommandRunner>,
    websites: WebsiteRepository,
}

impl Provisioner {
    pub fn new(config: Arc<Config>, runner: Arc<dyn CommandRunner>, pool: SqlitePool) -> Self {
        Self { config, runner, websites: WebsiteRepository::new(pool) }
    }

    /// Step 1 of the pipeline: syntax plus deployment-wide uniqueness,
    /// before anything touches the filesystem.
    pub async fn validate_new_domain(&self, domain: &str) -> Result<(), ProvisionError> {
        if !validate_domain(domain) {
            return Err(ProvisionError::InvalidDomain(domain.to_string()));
        }
        if self.websites.domain_exists(domain).await.map_err(ProvisionError::Internal)? {
            return Err(ProvisionError::DuplicateDomain);
        }
        Ok(())
    }

    /// Run the full pipeline for a freshly inserted website row.
    pub async fn create_site(&self, site: &Website) -> Result<(), ProvisionError> {
        self.ensure_docroot(site).await?;

        match site.site_type() {
            Some(SiteType::Wordpress) => self.provision_wordpress(site).await?,
            _ => self.write_starter_index(site).await?,
        }

        self.write_vhost(site).await?;
        self.enable_site(site).await?;

        info!("Provisioned {} site {}", site.site_type, site.domain);
        Ok(())
    }

    async fn ensure_docroot(&self, site: &Website) -> Result<(), ProvisionError> {
        tokio::fs::create_dir_all(&site.root_path)
            .await
            .map_err(|e| ProvisionError::step(ProvisionStep::DocumentRoot, e.to_string()))?;
        self.apply_web_ownership(&site.root_path).await;
        Ok(())
    }

    /// chown to www-data, falling back to the invoking user where www-data
    /// does not exist. Ownership problems are logged, not fatal.
    async fn apply_web_ownership(&self, path: &str) {
        let chown = self.runner.run("chown", &["-R", "www-data:www-data", path], true).await;
        let owned = matches!(chown, Ok(ref out) if out.success());
        if !owned {
            if let Ok(user) = std::env::var("USER") {
                let owner = format!("{}:{}", user, user);
                if let Err(e) = self.runner.run("chown", &["-R", &owner, path], true).await {
                    warn!("Fallback chown for {} failed: {}", path, e);
                }
            }
        }
        let _ = self.runner.run("chmod", &["-R", "755", path], true).await;
    }

    async fn write_starter_index(&self, site: &Website) -> Result<(), ProvisionError> {
        let index_path = PathBuf::from(&site.root_path).join("index.php");
        tokio::fs::write(&index_path, vhost::starter_index(&site.domain))
            .await
            .map_err(|e| ProvisionError::step(ProvisionStep::StarterIndex, e.to_string()))?;
        self.apply_web_ownership(&site.root_path).await;
        Ok(())
    }

    async fn provision_wordpress(&self, site: &Website) -> Result<(), ProvisionError> {
        let (db_name, db_user) = wordpress::db_identifiers(&site.domain);
        let db_password = generate_password(16);

        self.create_mysql_database(&db_name, &db_user, &db_password).await?;

        self.websites
            .create_credential(site.id, &db_name, &db_user, &db_password, "localhost")
            .await
            .map_err(ProvisionError::Internal)?;

        wordpress::download_and_extract(std::path::Path::new(&site.root_path))
            .await
            .map_err(|e| ProvisionError::step(ProvisionStep::WordpressDownload, e.to_string()))?;

        self.write_wp_config(site, &db_name, &db_user, &db_password).await?;
        self.apply_web_ownership(&site.root_path).await;

        // The CLI installer only runs when admin options were supplied; a
        // bare archive install finishes through the web setup instead.
        if let (Some(admin_user), Some(admin_email), Some(admin_password)) =
            (&site.wp_admin_user, &site.wp_admin_email, &site.wp_admin_password)
        {
            self.run_wp_installer(site, admin_user, admin_email, admin_password).await?;
        }

        Ok(())
    }

    async fn create_mysql_database(
        &self,
        db_name: &str,
        db_user: &str,
        db_password: &str,
    ) -> Result<(), ProvisionError> {
        let create_db = format!("CREATE DATABASE IF NOT EXISTS {} CHARACTER SET utf8mb4;", db_name);
        let output = self
            .runner
            .run("mysql", &["-e", &create_db], true)
            .await
            .map_err(ProvisionError::Internal)?;
        if !output.success() {
            return Err(ProvisionError::step(
                ProvisionStep::MysqlDatabase,
                format!("Failed to create database: {}", output.stderr.trim()),
            ));
        }

        // Generated passwords are alphanumeric, so plain quoting is safe here.
        let grant = format!(
            "CREATE USER IF NOT EXISTS '{user}'@'localhost' IDENTIFIED BY '{pass}'; \
             GRANT ALL PRIVILEGES ON {db}.* TO '{user}'@'localhost'; FLUSH PRIVILEGES;",
            user = db_user,
            pass = db_password,
            db = db_name,
        );
        let output = self
            .runner
            .run("mysql", &["-e", &grant], true)
            .await
            .map_err(ProvisionError::Internal)?;
        if !output.success() {
            return Err(ProvisionError::step(
                ProvisionStep::MysqlDatabase,
                format!("Failed to create database user: {}", output.stderr.trim()),
            ));
        }

        Ok(())
    }

    async fn write_wp_config(
        &self,
        site: &Website,
        db_name: &str,
        db_user: &str,
        db_password: &str,
    ) -> Result<(), ProvisionError> {
        let config_path = PathBuf::from(&site.root_path).join("wp-config.php");
        let body = wordpress::render_wp_config(&site.domain, db_name, db_user, db_password);
        tokio::fs::write(&config_path, body)
            .await
            .map_err(|e| ProvisionError::step(ProvisionStep::WpConfig, e.to_string()))?;

        let path = config_path.to_string_lossy().to_string();
        let _ = self.runner.run("chown", &["www-data:www-data", &path], true).await;
        let _ = self.runner.run("chmod", &["600", &path], true).await;
        Ok(())
    }

    async fn run_wp_installer(
        &self,
        site: &Website,
        admin_user: &str,
        admin_email: &str,
        admin_password: &str,
    ) -> Result<(), ProvisionError> {
        let url = format!("--url=http://{}", site.domain);
        let title = format!("--title={}", site.domain);
        let path = format!("--path={}", site.root_path);
        let user = format!("--admin_user={}", admin_user);
        let password = format!("--admin_password={}", admin_password);
        let email = format!("--admin_email={}", admin_email);

        let output = self
            .runner
            .run(
                "wp",
                &[
                    "core",
                    "install",
                    &path,
                    &url,
                    &title,
                    &user,
                    &password,
                    &email,
                    "--skip-email",
                    "--allow-root",
                ],
                false,
            )
            .await
            .map_err(ProvisionError::Internal)?;

        if !output.success() {
            return Err(ProvisionError::step(
                ProvisionStep::WordpressInstall,
                output.stderr.trim().to_string(),
            ));
        }
        Ok(())
    }

    fn nginx_available_path(&self, domain: &str) -> PathBuf {
        self.config.nginx_sites_available.join(domain)
    }

    fn nginx_enabled_path(&self, domain: &str) -> PathBuf {
        self.config.nginx_sites_enabled.join(domain)
    }

    fn apache_available_path(&self, domain: &str) -> PathBuf {
        self.config.apache_sites_available.join(format!("{}.conf", domain))
    }

    async fn write_vhost(&self, site: &Website) -> Result<(), ProvisionError> {
        let (path, body) = match site.web_server() {
            Some(WebServer::Apache) => (
                self.apache_available_path(&site.domain),
                vhost::apache_vhost(&site.domain, &site.root_path),
            ),
            _ => (
                self.nginx_available_path(&site.domain),
                vhost::nginx_vhost(&site.domain, &site.root_path, &site.php_version),
            ),
        };

        tokio::fs::write(&path, body)
            .await
            .map_err(|e| ProvisionError::step(ProvisionStep::VhostConfig, e.to_string()))?;
        Ok(())
    }

    /// Re-render the vhost after a mutation (php version change) and reload
    /// the web server when the site is live.
    pub async fn refresh_vhost(&self, site: &Website) -> Result<(), ProvisionError> {
        self.write_vhost(site).await?;
        if site.is_active() {
            let unit = match site.web_server() {
                Some(WebServer::Apache) => "apache2",
                _ => "nginx",
            };
            self.reload_web_server(unit, ProvisionStep::VhostConfig).await?;
        }
        Ok(())
    }

    /// Symlink + config test + reload for Nginx, a2ensite + reload for Apache.
    pub async fn enable_site(&self, site: &Website) -> Result<(), ProvisionError> {
        match site.web_server() {
            Some(WebServer::Apache) => {
                let conf = format!("{}.conf", site.domain);
                let output = self
                    .runner
                    .run("a2ensite", &[&conf], true)
                    .await
                    .map_err(ProvisionError::Internal)?;
                if !output.success() {
                    return Err(ProvisionError::step(
                        ProvisionStep::EnableSite,
                        format!("Failed to enable Apache site: {}", output.stderr.trim()),
                    ));
                }
                self.reload_web_server("apache2", ProvisionStep::EnableSite).await
            }
            _ => {
                let source = self.nginx_available_path(&site.domain);
                let target = self.nginx_enabled_path(&site.domain);

                if tokio::fs::symlink_metadata(&target).await.is_ok() {
                    let _ = tokio::fs::remove_file(&target).await;
                }
                tokio::fs::symlink(&source, &target)
                    .await
                    .map_err(|e| ProvisionError::step(ProvisionStep::EnableSite, e.to_string()))?;

                let test = self
                    .runner
                    .run("nginx", &["-t"], true)
                    .await
                    .map_err(ProvisionError::Internal)?;
                if !test.success() {
                    return Err(ProvisionError::step(
                        ProvisionStep::EnableSite,
                        format!("Nginx config test failed: {}", test.stderr.trim()),
                    ));
                }
                self.reload_web_server("nginx", ProvisionStep::EnableSite).await
            }
        }
    }

    /// Remove the symlink / a2dissite, then reload. Mirror image of
    /// `enable_site`; running both in sequence restores the original state.
    pub async fn disable_site(&self, site: &Website) -> Result<(), ProvisionError> {
        match site.web_server() {
            Some(WebServer::Apache) => {
                let conf = format!("{}.conf", site.domain);
                let output = self
                    .runner
                    .run("a2dissite", &[&conf], true)
                    .await
                    .map_err(ProvisionError::Internal)?;
                if !output.success() {
                    return Err(ProvisionError::step(
                        ProvisionStep::DisableSite,
                        format!("Failed to disable Apache site: {}", output.stderr.trim()),
                    ));
                }
                self.reload_web_server("apache2", ProvisionStep::DisableSite).await
            }
            _ => {
                let target = self.nginx_enabled_path(&site.domain);
                if tokio::fs::symlink_metadata(&target).await.is_ok() {
                    tokio::fs::remove_file(&target).await.map_err(|e| {
                        ProvisionError::step(ProvisionStep::DisableSite, e.to_string())
                    })?;
                }
                self.reload_web_server("nginx", ProvisionStep::DisableSite).await
            }
        }
    }

    async fn reload_web_server(
        &self,
        unit: &str,
        step: ProvisionStep,
    ) -> Result<(), ProvisionError> {
        let output = self
            .runner
            .run("systemctl", &["reload", unit], true)
            .await
            .map_err(ProvisionError::Internal)?;
        if !output.success() {
            return Err(ProvisionError::step(
                step,
                format!("Failed to reload {}: {}", unit, output.stderr.trim()),
            ));
        }
        Ok(())
    }

    /// Teardown on delete: best-effort disable, then remove the vhost file
    /// and the document root. Missing artifacts are fine; the goal is a
    /// clean tree, not strict accounting.
    pub async fn remove_site(&self, site: &Website) -> Result<()> {
        if let Err(e) = self.disable_site(site).await {
            warn!("Disable during removal of {} failed: {}", site.domain, e);
        }

        let vhost_path = match site.web_server() {
            Some(WebServer::Apache) => self.apache_available_path(&site.domain),
            _ => self.nginx_available_path(&site.domain),
        };
        if let Err(e) = tokio::fs::remove_file(&vhost_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove vhost {}: {}", vhost_path.display(), e);
            }
        }

        if let Err(e) = tokio::fs::remove_dir_all(&site.root_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove docroot {}: {}", site.root_path, e);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::testing::MockRunner;
    use skydock_db::repositories::user_repo::UserRepository;
    use skydock_db::repositories::website_repo::NewWebsite;

    struct Fixture {
        provisioner: Provisioner,
        pool: SqlitePool,
        // Held so the directories outlive the test body.
        _dir: tempfile::TempDir,
        config: Arc<Config>,
    }

    async fn fixture(runner: MockRunner) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        for sub in ["web", "nginx-available", "nginx-enabled", "apache-available"] {
            std::fs::create_dir_all(dir.path().join(sub)).unwrap();
        }

        let config = Arc::new(Config {
            debug: false,
            database_url: String::new(),
            panel_port: 8090,
            allowed_hosts: vec![],
            web_root: dir.path().join("web"),
            encryption_key: None,
            nginx_sites_available: dir.path().join("nginx-available"),
            nginx_sites_enabled: dir.path().join("nginx-enabled"),
            apache_sites_available: dir.path().join("apache-available"),
        });

        let db_path = dir.path().join("panel.db");
        let pool = skydock_db::connect(&format!("sqlite://{}", db_path.display()))
            .await
            .unwrap();

        let provisioner = Provisioner::new(config.clone(), Arc::new(runner), pool.clone());
        Fixture { provisioner, pool, _dir: dir, config }
    }

    async fn insert_site(fx: &Fixture, domain: &str, site_type: &str, web_server: &str) -> Website {
        let user = UserRepository::new(fx.pool.clone())
            .get_or_create("alice", None)
            .await
            .unwrap();
        let repo = WebsiteRepository::new(fx.pool.clone());
        repo.create(&NewWebsite {
            user_id: user.id,
            domain: domain.to_string(),
            root_path: fx.config.document_root("alice", domain).to_string_lossy().to_string(),
            site_type: site_type.to_string(),
            web_server: web_server.to_string(),
            php_version: "8.1".to_string(),
            wp_admin_user: None,
            wp_admin_email: None,
            wp_admin_password: None,
        })
        .await
        .unwrap()
    }

    #[test]
    fn domain_validation() {
        assert!(validate_domain("example.com"));
        assert!(validate_domain("sub.my-site.io"));
        assert!(validate_domain("a1.b2.c3"));

        assert!(!validate_domain("ab"));
        assert!(!validate_domain("nodots"));
        assert!(!validate_domain("-bad.com"));
        assert!(!validate_domain("bad-.com"));
        assert!(!validate_domain("spaces in.com"));
        assert!(!validate_domain("semi;colon.com"));
        assert!(!validate_domain(&format!("{}.com", "a".repeat(64))));
    }

    #[tokio::test]
    async fn php_site_writes_vhost_and_enables_symlink() {
        let fx = fixture(MockRunner::new()).await;
        let site = insert_site(&fx, "example.com", "php", "nginx").await;

        fx.provisioner.create_site(&site).await.unwrap();

        let vhost = std::fs::read_to_string(fx.config.nginx_sites_available.join("example.com"))
            .unwrap();
        assert!(vhost.contains(&site.root_path));
        assert!(vhost.contains("server_name example.com www.example.com;"));

        assert!(fx.config.nginx_sites_enabled.join("example.com").exists());
        assert!(PathBuf::from(&site.root_path).join("index.php").exists());
    }

    #[tokio::test]
    async fn toggle_twice_restores_symlink_state() {
        let fx = fixture(MockRunner::new()).await;
        let site = insert_site(&fx, "toggle.example.com", "php", "nginx").await;
        fx.provisioner.create_site(&site).await.unwrap();

        let link = fx.config.nginx_sites_enabled.join("toggle.example.com");
        assert!(link.exists());

        fx.provisioner.disable_site(&site).await.unwrap();
        assert!(!link.exists());

        fx.provisioner.enable_site(&site).await.unwrap();
        assert!(link.exists());
    }

    #[tokio::test]
    async fn mysql_failure_aborts_before_download_or_credentials() {
        let fx = fixture(MockRunner::failing("mysql", "Can't connect to local MySQL server")).await;
        let site = insert_site(&fx, "wp.example.com", "wordpress", "nginx").await;

        let err = fx.provisioner.create_site(&site).await.unwrap_err();
        match err {
            ProvisionError::Step { step, message } => {
                assert_eq!(step, ProvisionStep::MysqlDatabase);
                assert!(message.contains("Can't connect"));
            }
            other => panic!("unexpected error: {}", other),
        }

        // Nothing past the failing step happened.
        let repo = WebsiteRepository::new(fx.pool.clone());
        assert!(repo.get_credential(site.id).await.unwrap().is_none());
        assert!(!PathBuf::from(&site.root_path).join("wp-config.php").exists());
        assert!(!fx.config.nginx_sites_available.join("wp.example.com").exists());
    }

    #[tokio::test]
    async fn nginx_config_test_failure_names_enable_step() {
        let fx = fixture(MockRunner::failing("nginx", "nginx: [emerg] invalid parameter")).await;
        let site = insert_site(&fx, "broken.example.com", "php", "nginx").await;

        let err = fx.provisioner.create_site(&site).await.unwrap_err();
        match err {
            ProvisionError::Step { step, message } => {
                assert_eq!(step, ProvisionStep::EnableSite);
                assert!(message.contains("Nginx config test failed"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn duplicate_domain_is_rejected_before_any_work() {
        let fx = fixture(MockRunner::new()).await;
        insert_site(&fx, "taken.example.com", "php", "nginx").await;

        let err = fx.provisioner.validate_new_domain("taken.example.com").await.unwrap_err();
        assert!(matches!(err, ProvisionError::DuplicateDomain));

        let err = fx.provisioner.validate_new_domain("UPPER.example.com").await.unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidDomain(_)));
    }

    #[tokio::test]
    async fn remove_site_deletes_vhost_and_docroot() {
        let fx = fixture(MockRunner::new()).await;
        let site = insert_site(&fx, "gone.example.com", "php", "nginx").await;
        fx.provisioner.create_site(&site).await.unwrap();

        fx.provisioner.remove_site(&site).await.unwrap();

        assert!(!fx.config.nginx_sites_available.join("gone.example.com").exists());
        assert!(!fx.config.nginx_sites_enabled.join("gone.example.com").exists());
        assert!(!PathBuf::from(&site.root_path).exists());
    }
}
