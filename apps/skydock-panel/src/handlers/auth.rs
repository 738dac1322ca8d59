use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use skydock_db::models::user::AUTH_TYPE_PASSWORD;
use skydock_db::repositories::user_repo::SshProfileRepository;
use tracing::info;

use super::{api_error, require_user};
use crate::AppState;
use crate::services::auth_service::{AuthError, SESSION_COOKIE};

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

pub(crate) fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .build()
}

pub(crate) fn expired_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::from(SESSION_COOKIE);
    cookie.set_path("/");
    cookie.set_max_age(time::Duration::seconds(0));
    cookie
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Response {
    if body.username.is_empty() || body.password.is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "Username and password are required");
    }

    match state.auth.authenticate(&body.username, &body.password).await {
        Ok(Some(user)) => {
            let session = match state.auth.open_session(user.id).await {
                Ok(session) => session,
                Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            };
            info!("Session opened for '{}'", user.username);
            (
                jar.add(session_cookie(session.token)),
                Json(json!({ "message": "Login successful", "user": user })),
            )
                .into_response()
        }
        Ok(None) => api_error(StatusCode::UNAUTHORIZED, "Invalid username or password"),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// POST /api/auth/logout
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        let _ = state.auth.close_session(cookie.value()).await;
    }
    (jar.add(expired_cookie()), Json(json!({ "message": "Logout successful" }))).into_response()
}

/// GET /api/auth/me
pub async fn current_user(State(state): State<AppState>, jar: CookieJar) -> Response {
    match require_user(&state, &jar).await {
        Ok(user) => Json(json!({ "user": user })).into_response(),
        Err(resp) => resp,
    }
}

#[derive(Serialize)]
pub struct SshProfileResponse {
    pub id: i64,
    pub ssh_username: String,
    pub auth_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<skydock_db::models::user::SshProfile> for SshProfileResponse {
    fn from(profile: skydock_db::models::user::SshProfile) -> Self {
        // Secrets stay server-side; only the shape of the profile goes out.
        Self {
            id: profile.id,
            ssh_username: profile.ssh_username,
            auth_type: profile.auth_type,
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        }
    }
}

/// GET /api/auth/ssh-profile
pub async fn ssh_profile(State(state): State<AppState>, jar: CookieJar) -> Response {
    let user = match require_user(&state, &jar).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let repo = SshProfileRepository::new(state.pool.clone());
    match repo.get_or_create(user.id).await {
        Ok(profile) => Json(SshProfileResponse::from(profile)).into_response(),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[derive(Deserialize)]
pub struct SshProfileUpdate {
    pub ssh_username: Option<String>,
    pub ssh_password: Option<String>,
}

/// POST|PUT /api/auth/ssh-profile — password-auth profiles only via the API.
pub async fn update_ssh_profile(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<SshProfileUpdate>,
) -> Response {
    let user = match require_user(&state, &jar).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let repo = SshProfileRepository::new(state.pool.clone());
    let current = match repo.get_or_create(user.id).await {
        Ok(profile) => profile,
        Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let ssh_username = body
        .ssh_username
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .unwrap_or(current.ssh_username);

    // Empty/blank password means "keep the stored secret".
    let encrypted_password = match body.ssh_password.as_deref().map(str::trim) {
        Some(password) if !password.is_empty() => match state.crypto.encrypt(password) {
            Ok(encrypted) => Some(encrypted),
            Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        },
        _ => None,
    };

    match repo
        .update(user.id, &ssh_username, AUTH_TYPE_PASSWORD, encrypted_password.as_deref(), None)
        .await
    {
        Ok(profile) => Json(SshProfileResponse::from(profile)).into_response(),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

/// POST /api/auth/change-password — changes the OS account password.
pub async fn change_password(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<ChangePasswordRequest>,
) -> Response {
    let user = match require_user(&state, &jar).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    if body.current_password.is_empty() || body.new_password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "error": "Current password and new password are required"
            })),
        )
            .into_response();
    }

    match state
        .auth
        .change_password(&user.username, &body.current_password, &body.new_password)
        .await
    {
        Ok(()) => {
            Json(json!({ "success": true, "message": "Password updated successfully" }))
                .into_response()
        }
        Err(err @ (AuthError::WeakPassword | AuthError::InvalidCredentials)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": err.to_string() })),
        )
            .into_response(),
        Err(err @ AuthError::PasswordChange(_)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": err.to_string() })),
        )
            .into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": err.to_string() })),
        )
            .into_response(),
    }
}
