use axum::Json;
use axum::response::IntoResponse;
use serde_json::json;

/// GET /api/installer/health — unauthenticated, used by the installer and
/// monitoring probes.
pub async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "healthy", "service": "SkyDock Panel" }))
}

/// GET /api/installer/status
pub async fn install_status() -> impl IntoResponse {
    Json(json!({ "installed": true, "version": env!("CARGO_PKG_VERSION") }))
}
