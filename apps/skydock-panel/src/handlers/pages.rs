use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Form, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use skydock_db::models::user::User;

use super::auth::{expired_cookie, session_cookie};
use crate::AppState;
use crate::services::auth_service::SESSION_COOKIE;

#[derive(Template, WebTemplate)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
}

#[derive(Template, WebTemplate)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub username: String,
    pub active_page: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "services.html")]
pub struct ServicesTemplate {
    pub username: String,
    pub active_page: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "websites.html")]
pub struct WebsitesTemplate {
    pub username: String,
    pub active_page: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "settings.html")]
pub struct SettingsTemplate {
    pub username: String,
    pub active_page: String,
    pub panel_port: u16,
}

async fn page_user(state: &AppState, jar: &CookieJar) -> Option<User> {
    let cookie = jar.get(SESSION_COOKIE)?;
    state.auth.session_user(cookie.value()).await.ok().flatten()
}

/// GET /login
pub async fn login_page(State(state): State<AppState>, jar: CookieJar) -> Response {
    if page_user(&state, &jar).await.is_some() {
        return Redirect::to("/dashboard").into_response();
    }
    LoginTemplate { error: None }.into_response()
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// POST /login
pub async fn login_submit(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    if form.username.is_empty() || form.password.is_empty() {
        return LoginTemplate { error: Some("Username and password are required.".to_string()) }
            .into_response();
    }

    match state.auth.authenticate(&form.username, &form.password).await {
        Ok(Some(user)) => match state.auth.open_session(user.id).await {
            Ok(session) => {
                (jar.add(session_cookie(session.token)), Redirect::to("/dashboard")).into_response()
            }
            Err(_) => LoginTemplate { error: Some("Login failed, try again.".to_string()) }
                .into_response(),
        },
        Ok(None) => LoginTemplate { error: Some("Invalid username or password.".to_string()) }
            .into_response(),
        Err(_) => {
            LoginTemplate { error: Some("Login failed, try again.".to_string()) }.into_response()
        }
    }
}

/// GET /logout
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        let _ = state.auth.close_session(cookie.value()).await;
    }
    (jar.add(expired_cookie()), Redirect::to("/login")).into_response()
}

macro_rules! authed_page {
    ($state:expr, $jar:expr, $template:expr) => {
        match page_user(&$state, &$jar).await {
            Some(user) => $template(user).into_response(),
            None => Redirect::to("/login").into_response(),
        }
    };
}

/// GET /dashboard
pub async fn dashboard(State(state): State<AppState>, jar: CookieJar) -> Response {
    authed_page!(state, jar, |user: User| DashboardTemplate {
        username: user.username,
        active_page: "dashboard".to_string(),
    })
}

/// GET /services
pub async fn services(State(state): State<AppState>, jar: CookieJar) -> Response {
    authed_page!(state, jar, |user: User| ServicesTemplate {
        username: user.username,
        active_page: "services".to_string(),
    })
}

/// GET /websites
pub async fn websites(State(state): State<AppState>, jar: CookieJar) -> Response {
    authed_page!(state, jar, |user: User| WebsitesTemplate {
        username: user.username,
        active_page: "websites".to_string(),
    })
}

/// GET /settings
pub async fn settings(State(state): State<AppState>, jar: CookieJar) -> Response {
    let panel_port = state.config.panel_port;
    authed_page!(state, jar, |user: User| SettingsTemplate {
        username: user.username,
        active_page: "settings".to_string(),
        panel_port,
    })
}
