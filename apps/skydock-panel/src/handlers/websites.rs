use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use skydock_db::models::website::{
    DatabaseCredential, STATUS_ACTIVE, STATUS_DISABLED, SiteType, WebServer, Website,
};
use skydock_db::repositories::website_repo::{NewWebsite, WebsiteRepository};
use tracing::{error, info};

use super::{api_error, require_user};
use crate::AppState;

#[derive(Serialize)]
pub struct DatabaseInfo {
    pub db_name: String,
    pub db_user: String,
    pub db_host: String,
}

impl From<DatabaseCredential> for DatabaseInfo {
    fn from(cred: DatabaseCredential) -> Self {
        // db_password deliberately absent.
        Self { db_name: cred.db_name, db_user: cred.db_user, db_host: cred.db_host }
    }
}

#[derive(Serialize)]
pub struct WebsiteResponse {
    pub id: i64,
    pub domain: String,
    pub root_path: String,
    #[serde(rename = "type")]
    pub site_type: String,
    pub web_server: String,
    pub php_version: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub database: Option<DatabaseInfo>,
}

impl WebsiteResponse {
    fn new(site: Website, database: Option<DatabaseCredential>) -> Self {
        Self {
            id: site.id,
            domain: site.domain,
            root_path: site.root_path,
            site_type: site.site_type,
            web_server: site.web_server,
            php_version: site.php_version,
            status: site.status,
            created_at: site.created_at,
            updated_at: site.updated_at,
            database: database.map(DatabaseInfo::from),
        }
    }
}

fn valid_php_version(version: &str) -> bool {
    let mut parts = version.split('.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(major), Some(minor), None) => {
            !major.is_empty()
                && !minor.is_empty()
                && major.chars().all(|c| c.is_ascii_digit())
                && minor.chars().all(|c| c.is_ascii_digit())
        }
        _ => false,
    }
}

/// GET /api/websites
pub async fn websites_list(State(state): State<AppState>, jar: CookieJar) -> Response {
    let user = match require_user(&state, &jar).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let repo = WebsiteRepository::new(state.pool.clone());
    let sites = match repo.list_for_user(user.id).await {
        Ok(sites) => sites,
        Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let mut out = Vec::with_capacity(sites.len());
    for site in sites {
        let database = repo.get_credential(site.id).await.unwrap_or(None);
        out.push(WebsiteResponse::new(site, database));
    }
    Json(out).into_response()
}

#[derive(Deserialize)]
pub struct CreateWebsiteRequest {
    pub domain: Option<String>,
    #[serde(rename = "type")]
    pub site_type: Option<String>,
    pub web_server: Option<String>,
    pub php_version: Option<String>,
    pub wp_admin_user: Option<String>,
    pub wp_admin_email: Option<String>,
    pub wp_admin_password: Option<String>,
}

/// POST /api/websites — validate, record, then run the provisioning
/// pipeline. A failed pipeline removes the record and reports the failing
/// step; artifacts already on disk stay (no rollback).
pub async fn create_website(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<CreateWebsiteRequest>,
) -> Response {
    let user = match require_user(&state, &jar).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let Some(domain) = body.domain.map(|d| d.trim().to_ascii_lowercase()).filter(|d| !d.is_empty())
    else {
        return api_error(StatusCode::BAD_REQUEST, "Domain is required");
    };

    let site_type = body.site_type.unwrap_or_else(|| "php".to_string());
    if SiteType::parse(&site_type).is_none() {
        return api_error(StatusCode::BAD_REQUEST, "Invalid website type");
    }
    let web_server = body.web_server.unwrap_or_else(|| "nginx".to_string());
    if WebServer::parse(&web_server).is_none() {
        return api_error(StatusCode::BAD_REQUEST, "Invalid web server");
    }
    let php_version = body.php_version.unwrap_or_else(|| "8.1".to_string());
    if !valid_php_version(&php_version) {
        return api_error(StatusCode::BAD_REQUEST, "Invalid PHP version");
    }

    if let Err(e) = state.provisioner.validate_new_domain(&domain).await {
        return api_error(StatusCode::BAD_REQUEST, e.to_string());
    }

    let root_path = state
        .config
        .document_root(&user.username, &domain)
        .to_string_lossy()
        .to_string();

    let repo = WebsiteRepository::new(state.pool.clone());
    let site = match repo
        .create(&NewWebsite {
            user_id: user.id,
            domain: domain.clone(),
            root_path,
            site_type,
            web_server,
            php_version,
            wp_admin_user: body.wp_admin_user,
            wp_admin_email: body.wp_admin_email,
            wp_admin_password: body.wp_admin_password,
        })
        .await
    {
        Ok(site) => site,
        Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    if let Err(e) = state.provisioner.create_site(&site).await {
        error!("Provisioning {} failed: {}", domain, e);
        let _ = repo.delete(site.id).await;
        return api_error(StatusCode::BAD_REQUEST, e.to_string());
    }

    info!("Website {} created for '{}'", domain, user.username);
    let database = repo.get_credential(site.id).await.unwrap_or(None);
    (StatusCode::CREATED, Json(WebsiteResponse::new(site, database))).into_response()
}

async fn load_owned_site(
    state: &AppState,
    jar: &CookieJar,
    website_id: i64,
) -> Result<(WebsiteRepository, Website), Response> {
    let user = require_user(state, jar).await?;
    let repo = WebsiteRepository::new(state.pool.clone());
    match repo.get_for_user(website_id, user.id).await {
        Ok(Some(site)) => Ok((repo, site)),
        Ok(None) => Err(api_error(
            StatusCode::NOT_FOUND,
            "Website not found or you do not have permission to access it",
        )),
        Err(e) => Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

/// GET /api/websites/{id}
pub async fn website_detail(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(website_id): Path<i64>,
) -> Response {
    let (repo, site) = match load_owned_site(&state, &jar, website_id).await {
        Ok(pair) => pair,
        Err(resp) => return resp,
    };
    let database = repo.get_credential(site.id).await.unwrap_or(None);
    Json(WebsiteResponse::new(site, database)).into_response()
}

#[derive(Deserialize)]
pub struct UpdateWebsiteRequest {
    pub php_version: Option<String>,
}

/// PUT /api/websites/{id} — php_version is the only mutable field.
pub async fn update_website(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(website_id): Path<i64>,
    Json(body): Json<UpdateWebsiteRequest>,
) -> Response {
    let (repo, mut site) = match load_owned_site(&state, &jar, website_id).await {
        Ok(pair) => pair,
        Err(resp) => return resp,
    };

    if let Some(php_version) = body.php_version {
        if !valid_php_version(&php_version) {
            return api_error(StatusCode::BAD_REQUEST, "Invalid PHP version");
        }
        if let Err(e) = repo.set_php_version(site.id, &php_version).await {
            return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
        site.php_version = php_version;
        if let Err(e) = state.provisioner.refresh_vhost(&site).await {
            return api_error(StatusCode::BAD_REQUEST, e.to_string());
        }
    }

    let database = repo.get_credential(site.id).await.unwrap_or(None);
    Json(WebsiteResponse::new(site, database)).into_response()
}

/// DELETE /api/websites/{id} — disable, remove artifacts, drop the record.
pub async fn delete_website(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(website_id): Path<i64>,
) -> Response {
    let (repo, site) = match load_owned_site(&state, &jar, website_id).await {
        Ok(pair) => pair,
        Err(resp) => return resp,
    };

    if let Err(e) = state.provisioner.remove_site(&site).await {
        return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }
    if let Err(e) = repo.delete(site.id).await {
        return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    info!("Website {} deleted", site.domain);
    Json(json!({ "message": "Website deleted successfully" })).into_response()
}

/// POST /api/websites/{id}/toggle-status
pub async fn toggle_website_status(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(website_id): Path<i64>,
) -> Response {
    let (repo, site) = match load_owned_site(&state, &jar, website_id).await {
        Ok(pair) => pair,
        Err(resp) => return resp,
    };

    if site.is_active() {
        match state.provisioner.disable_site(&site).await {
            Ok(()) => {
                if let Err(e) = repo.set_status(site.id, STATUS_DISABLED).await {
                    return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
                }
                Json(json!({ "message": "Website disabled successfully" })).into_response()
            }
            Err(e) => api_error(StatusCode::BAD_REQUEST, e.to_string()),
        }
    } else {
        match state.provisioner.enable_site(&site).await {
            Ok(()) => {
                if let Err(e) = repo.set_status(site.id, STATUS_ACTIVE).await {
                    return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
                }
                Json(json!({ "message": "Website enabled successfully" })).into_response()
            }
            Err(e) => api_error(StatusCode::BAD_REQUEST, e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn php_version_shape() {
        assert!(valid_php_version("8.1"));
        assert!(valid_php_version("7.4"));
        assert!(valid_php_version("10.0"));

        assert!(!valid_php_version("8"));
        assert!(!valid_php_version("8.1.2"));
        assert!(!valid_php_version("8.x"));
        assert!(!valid_php_version(""));
        assert!(!valid_php_version("latest"));
    }
}
