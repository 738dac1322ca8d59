use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use skydock_db::models::server::NewServer;
use skydock_db::repositories::server_repo::ServerRepository;

use super::{api_error, require_user};
use crate::AppState;
use crate::services::system_service::WATCHED_SERVICES;

/// Unit names we are willing to hand to systemctl.
fn valid_service_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'))
}

/// GET /api/servers/metrics — live values, nothing cached.
pub async fn server_metrics(State(state): State<AppState>, jar: axum_extra::extract::CookieJar) -> Response {
    if let Err(resp) = require_user(&state, &jar).await {
        return resp;
    }
    Json(state.system.metrics().await).into_response()
}

/// GET /api/servers/info — stored snapshot, created lazily from live metrics.
pub async fn server_info(State(state): State<AppState>, jar: axum_extra::extract::CookieJar) -> Response {
    if let Err(resp) = require_user(&state, &jar).await {
        return resp;
    }

    let repo = ServerRepository::new(state.pool.clone());
    let existing = match repo.get_local().await {
        Ok(server) => server,
        Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let server = match existing {
        Some(server) => server,
        None => {
            let metrics = state.system.metrics().await;
            let row = NewServer {
                hostname: metrics.hostname,
                ip_address: metrics.ip_address,
                os_name: metrics.os_name,
                os_version: metrics.os_version,
                total_ram: metrics.memory.total as i64,
                total_disk: metrics.disk.total as i64,
                cpu_count: metrics.cpu.count as i64,
            };
            match repo.insert_local(&row).await {
                Ok(server) => server,
                Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            }
        }
    };

    Json(server).into_response()
}

/// GET /api/servers/services — status of every watched service.
pub async fn services_list(State(state): State<AppState>, jar: axum_extra::extract::CookieJar) -> Response {
    if let Err(resp) = require_user(&state, &jar).await {
        return resp;
    }

    let mut result = serde_json::Map::new();
    for service in WATCHED_SERVICES {
        match state.system.service_status(service).await {
            Ok(status) => {
                result.insert(service.to_string(), serde_json::to_value(status).unwrap_or_default());
            }
            Err(e) => {
                result.insert(
                    service.to_string(),
                    json!({ "installed": false, "running": false, "status": "error", "error": e.to_string() }),
                );
            }
        }
    }

    Json(serde_json::Value::Object(result)).into_response()
}

#[derive(Deserialize)]
pub struct ControlRequest {
    pub service: Option<String>,
    pub action: Option<String>,
}

/// POST /api/servers/services/control
pub async fn service_control(
    State(state): State<AppState>,
    jar: axum_extra::extract::CookieJar,
    Json(body): Json<ControlRequest>,
) -> Response {
    if let Err(resp) = require_user(&state, &jar).await {
        return resp;
    }

    let (Some(service), Some(action)) = (body.service, body.action) else {
        return api_error(StatusCode::BAD_REQUEST, "Service name and action are required");
    };
    if !valid_service_name(&service) {
        return api_error(StatusCode::BAD_REQUEST, "Invalid service name");
    }

    match state.system.control(&service, &action).await {
        Ok(outcome) if outcome.success => Json(outcome).into_response(),
        Ok(outcome) => (StatusCode::BAD_REQUEST, Json(outcome)).into_response(),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[derive(Deserialize)]
pub struct LogsQuery {
    pub lines: Option<u32>,
}

/// GET /api/servers/services/{service_name}/logs
pub async fn service_logs(
    State(state): State<AppState>,
    jar: axum_extra::extract::CookieJar,
    Path(service_name): Path<String>,
    Query(query): Query<LogsQuery>,
) -> Response {
    if let Err(resp) = require_user(&state, &jar).await {
        return resp;
    }
    if !valid_service_name(&service_name) {
        return api_error(StatusCode::BAD_REQUEST, "Invalid service name");
    }

    let lines = query.lines.unwrap_or(50).min(1000);
    match state.system.service_logs(&service_name, lines).await {
        Ok(logs) => Json(json!({ "logs": logs })).into_response(),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to get logs: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_name_validation() {
        assert!(valid_service_name("nginx"));
        assert!(valid_service_name("redis-server"));
        assert!(valid_service_name("php8.1-fpm"));
        assert!(valid_service_name("getty@tty1"));

        assert!(!valid_service_name(""));
        assert!(!valid_service_name("nginx; rm -rf /"));
        assert!(!valid_service_name("unit name"));
        assert!(!valid_service_name(&"x".repeat(65)));
    }
}
