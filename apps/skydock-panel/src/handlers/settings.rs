use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;

use super::require_user;
use crate::AppState;

/// GET /api/settings/panel-port
pub async fn panel_port(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Err(resp) = require_user(&state, &jar).await {
        return resp;
    }
    Json(json!({ "port": state.config.panel_port })).into_response()
}
