mod cli;
mod config;
mod crypto;
mod exec;
mod handlers;
mod services;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum_extra::extract::cookie::CookieJar;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use crypto::SecretBox;
use exec::{CommandRunner, SystemRunner};
use services::auth_service::{AuthService, SESSION_COOKIE};
use services::provisioner::Provisioner;
use services::system_service::SystemService;

#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::SqlitePool,
    pub config: Arc<Config>,
    pub crypto: Arc<SecretBox>,
    pub auth: Arc<AuthService>,
    pub system: Arc<SystemService>,
    pub provisioner: Arc<Provisioner>,
}

#[derive(Parser)]
#[command(name = "skydock-panel")]
#[command(about = "SkyDock VPS Control Panel", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server
    Serve,
    /// Install the panel as a systemd service
    Install,
    /// Show panel connection information
    Info,
}

/// Reject requests whose Host header is not in ALLOWED_HOSTS (when set).
async fn host_guard(
    State(state): State<AppState>,
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let host = req
        .headers()
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !state.config.host_allowed(host) {
        return (StatusCode::BAD_REQUEST, "Invalid Host header").into_response();
    }
    next.run(req).await
}

/// Session gate for everything except login and the installer probes.
/// API callers get 401 JSON; page visitors get bounced to /login.
async fn auth_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let path = req.uri().path();

    let public = matches!(
        path,
        "/login" | "/logout" | "/api/auth/login" | "/api/installer/health" | "/api/installer/status"
    );
    if public {
        return next.run(req).await;
    }

    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Ok(Some(_)) = state.auth.session_user(cookie.value()).await {
            return next.run(req).await;
        }
    }

    if path.starts_with("/api") {
        handlers::api_error(StatusCode::UNAUTHORIZED, "Authentication required")
    } else {
        Redirect::to("/login").into_response()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        // A missing .env is normal in dev; everything has env fallbacks.
        eprintln!("Warning: failed to load .env file: {}", e);
    }

    let cli = Cli::parse();

    let file_appender = tracing_appender::rolling::never(".", "skydock-panel.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "skydock_panel=debug,axum=info,tower_http=info,sqlx=warn".into()
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stdout))
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    let config = Arc::new(Config::from_env());

    match cli.command {
        Commands::Serve => {
            let pool = skydock_db::connect(&config.database_url).await?;
            tracing::info!("Database initialized at {}", config.database_url);
            run_server(config, pool).await?;
        }
        Commands::Install => {
            cli::install_service()?;
        }
        Commands::Info => {
            cli::print_info(&config);
        }
    }

    Ok(())
}

async fn run_server(config: Arc<Config>, pool: sqlx::SqlitePool) -> Result<()> {
    // reqwest is built without a default TLS provider; register ring once.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let secrets = match &config.encryption_key {
        Some(key) => Arc::new(SecretBox::from_base64_key(key)?),
        None => {
            tracing::warn!(
                "SKYDOCK_ENCRYPTION_KEY not set; using an ephemeral key. \
                 Stored SSH secrets will not survive a restart."
            );
            Arc::new(SecretBox::from_base64_key(&SecretBox::generate_key())?)
        }
    };

    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);

    let mut sys = sysinfo::System::new_all();
    sys.refresh_all();
    let system_stats = Arc::new(tokio::sync::Mutex::new(sys));

    let auth = Arc::new(AuthService::new(pool.clone(), runner.clone()));
    let system = Arc::new(SystemService::new(runner.clone(), system_stats));
    let provisioner = Arc::new(Provisioner::new(config.clone(), runner.clone(), pool.clone()));

    let state = AppState {
        pool,
        config: config.clone(),
        crypto: secrets,
        auth,
        system,
        provisioner,
    };

    let app = axum::Router::new()
        // REST API
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/auth/me", get(handlers::auth::current_user))
        .route(
            "/api/auth/ssh-profile",
            get(handlers::auth::ssh_profile)
                .post(handlers::auth::update_ssh_profile)
                .put(handlers::auth::update_ssh_profile),
        )
        .route("/api/auth/change-password", post(handlers::auth::change_password))
        .route("/api/servers/metrics", get(handlers::servers::server_metrics))
        .route("/api/servers/info", get(handlers::servers::server_info))
        .route("/api/servers/services", get(handlers::servers::services_list))
        .route("/api/servers/services/control", post(handlers::servers::service_control))
        .route(
            "/api/servers/services/{service_name}/logs",
            get(handlers::servers::service_logs),
        )
        .route(
            "/api/websites",
            get(handlers::websites::websites_list).post(handlers::websites::create_website),
        )
        .route(
            "/api/websites/{website_id}",
            get(handlers::websites::website_detail)
                .put(handlers::websites::update_website)
                .delete(handlers::websites::delete_website),
        )
        .route(
            "/api/websites/{website_id}/toggle-status",
            post(handlers::websites::toggle_website_status),
        )
        .route("/api/installer/health", get(handlers::installer::health_check))
        .route("/api/installer/status", get(handlers::installer::install_status))
        .route("/api/settings/panel-port", get(handlers::settings::panel_port))
        // Frontend pages
        .route("/", get(|| async { Redirect::to("/dashboard") }))
        .route("/login", get(handlers::pages::login_page).post(handlers::pages::login_submit))
        .route("/logout", get(handlers::pages::logout))
        .route("/dashboard", get(handlers::pages::dashboard))
        .route("/services", get(handlers::pages::services))
        .route("/websites", get(handlers::pages::websites))
        .route("/settings", get(handlers::pages::settings))
        .layer(axum::middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(axum::middleware::from_fn_with_state(state.clone(), host_guard))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::limit::RequestBodyLimitLayer::new(2 * 1024 * 1024))
        .layer(tower_http::set_header::SetResponseHeaderLayer::overriding(
            axum::http::header::X_CONTENT_TYPE_OPTIONS,
            axum::http::HeaderValue::from_static("nosniff"),
        ))
        .layer(tower_http::set_header::SetResponseHeaderLayer::overriding(
            axum::http::header::X_FRAME_OPTIONS,
            axum::http::HeaderValue::from_static("DENY"),
        ));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.panel_port));
    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
