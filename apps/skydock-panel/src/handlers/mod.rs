pub mod auth;
pub mod installer;
pub mod pages;
pub mod servers;
pub mod settings;
pub mod websites;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;
use skydock_db::models::user::User;

use crate::AppState;
use crate::services::auth_service::SESSION_COOKIE;

pub fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Resolve the session cookie to a user, or produce the 401 response the
/// caller can return directly. The auth middleware already gates these
/// routes; this recovers the identity for per-user queries.
pub async fn require_user(state: &AppState, jar: &CookieJar) -> Result<User, Response> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Ok(Some(user)) = state.auth.session_user(cookie.value()).await {
            return Ok(user);
        }
    }
    Err(api_error(StatusCode::UNAUTHORIZED, "Authentication required"))
}
