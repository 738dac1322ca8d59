use std::env;
use std::path::PathBuf;

/// Process-wide configuration, read once at startup from the environment
/// (`.env` is loaded by main before this runs).
#[derive(Debug, Clone)]
pub struct Config {
    pub debug: bool,
    pub database_url: String,
    pub panel_port: u16,
    /// Hosts allowed in the `Host` header; empty means no filtering.
    pub allowed_hosts: Vec<String>,
    /// Base directory for document roots: `<web_root>/<user>/<domain>`.
    pub web_root: PathBuf,
    /// Base64-encoded 32-byte key for SSH credential encryption.
    pub encryption_key: Option<String>,
    pub nginx_sites_available: PathBuf,
    pub nginx_sites_enabled: PathBuf,
    pub apache_sites_available: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        let allowed_hosts = env::var("ALLOWED_HOSTS")
            .unwrap_or_default()
            .split(',')
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty() && h != "*")
            .collect();

        Self {
            debug: env::var("DEBUG").map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://skydock.db".to_string()),
            panel_port: env::var("SKYDOCK_PANEL_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8090),
            allowed_hosts,
            web_root: env::var("SKYDOCK_WEB_ROOT")
                .unwrap_or_else(|_| "/var/www/skydock".to_string())
                .into(),
            encryption_key: env::var("SKYDOCK_ENCRYPTION_KEY").ok(),
            nginx_sites_available: env::var("SKYDOCK_NGINX_SITES_AVAILABLE")
                .unwrap_or_else(|_| "/etc/nginx/sites-available".to_string())
                .into(),
            nginx_sites_enabled: env::var("SKYDOCK_NGINX_SITES_ENABLED")
                .unwrap_or_else(|_| "/etc/nginx/sites-enabled".to_string())
                .into(),
            apache_sites_available: env::var("SKYDOCK_APACHE_SITES_AVAILABLE")
                .unwrap_or_else(|_| "/etc/apache2/sites-available".to_string())
                .into(),
        }
    }

    /// Deterministic document root for a site: `<web_root>/<user>/<domain>`.
    pub fn document_root(&self, username: &str, domain: &str) -> PathBuf {
        self.web_root.join(username).join(domain)
    }

    pub fn host_allowed(&self, host: &str) -> bool {
        if self.allowed_hosts.is_empty() {
            return true;
        }
        // Host headers may carry a port.
        let bare = host.rsplit_once(':').map(|(h, _)| h).unwrap_or(host);
        self.allowed_hosts.iter().any(|h| h == host || h == bare)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            debug: false,
            database_url: "sqlite://test.db".to_string(),
            panel_port: 8090,
            allowed_hosts: vec!["panel.example.com".to_string()],
            web_root: "/var/www/skydock".into(),
            encryption_key: None,
            nginx_sites_available: "/etc/nginx/sites-available".into(),
            nginx_sites_enabled: "/etc/nginx/sites-enabled".into(),
            apache_sites_available: "/etc/apache2/sites-available".into(),
        }
    }

    #[test]
    fn document_root_is_deterministic() {
        let config = test_config();
        assert_eq!(
            config.document_root("alice", "example.com"),
            PathBuf::from("/var/www/skydock/alice/example.com")
        );
        // Same inputs, same path.
        assert_eq!(
            config.document_root("alice", "example.com"),
            config.document_root("alice", "example.com")
        );
    }

    #[test]
    fn host_filtering_handles_ports() {
        let config = test_config();
        assert!(config.host_allowed("panel.example.com"));
        assert!(config.host_allowed("panel.example.com:8090"));
        assert!(!config.host_allowed("evil.example.com"));

        let open = Config { allowed_hosts: vec![], ..test_config() };
        assert!(open.host_allowed("anything.example.com"));
    }
}
