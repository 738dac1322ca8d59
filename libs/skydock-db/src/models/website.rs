use chrono::{DateTime, Utc};
use serde::Serialize;

/// A hosted site. `domain` is unique across the whole deployment and
/// `root_path` is always `<web_root>/<owner username>/<domain>`.
///
/// `status` mirrors the vhost-enabled symlink state best-effort; the
/// filesystem, not this row, is authoritative.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Website {
    pub id: i64,
    pub user_id: i64,
    pub domain: String,
    pub root_path: String,
    pub site_type: String,
    pub web_server: String,
    pub php_version: String,
    pub status: String,
    pub wp_admin_user: Option<String>,
    pub wp_admin_email: Option<String>,
    pub wp_admin_password: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// MySQL credentials provisioned for a WordPress site. `db_password` must
/// never be serialized into API responses.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DatabaseCredential {
    pub id: i64,
    pub website_id: i64,
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,
    pub db_host: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteType {
    Php,
    Wordpress,
}

impl SiteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteType::Php => "php",
            SiteType::Wordpress => "wordpress",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "php" => Some(SiteType::Php),
            "wordpress" => Some(SiteType::Wordpress),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebServer {
    Nginx,
    Apache,
}

impl WebServer {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebServer::Nginx => "nginx",
            WebServer::Apache => "apache",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "nginx" => Some(WebServer::Nginx),
            "apache" => Some(WebServer::Apache),
            _ => None,
        }
    }
}

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_DISABLED: &str = "disabled";

impl Website {
    pub fn site_type(&self) -> Option<SiteType> {
        SiteType::parse(&self.site_type)
    }

    pub fn web_server(&self) -> Option<WebServer> {
        WebServer::parse(&self.web_server)
    }

    pub fn is_active(&self) -> bool {
        self.status == STATUS_ACTIVE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_type_round_trip() {
        assert_eq!(SiteType::parse("php"), Some(SiteType::Php));
        assert_eq!(SiteType::parse("wordpress"), Some(SiteType::Wordpress));
        assert_eq!(SiteType::parse("static"), None);
        assert_eq!(SiteType::Wordpress.as_str(), "wordpress");
    }

    #[test]
    fn web_server_rejects_unknown(){
        assert_eq!(WebServer::parse("nginx"), Some(WebServer::Nginx));
        assert_eq!(WebServer::parse("apache"), Some(WebServer::Apache));
        assert_eq!(WebServer::parse("caddy"), None);
    }
}
