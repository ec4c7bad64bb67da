use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use academy::config::AppConfig;
use academy::db;
use academy::handlers;
use academy::services::identity;
use academy::services::notify::telegram::TelegramNotifier;
use academy::services::notify::{LogNotifier, Notifier};
use academy::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    if !config.admin_email.is_empty() && !config.admin_password.is_empty() {
        identity::ensure_admin(&conn, &config.admin_email, &config.admin_password)?;
        tracing::info!("admin account ready ({})", config.admin_email);
    }

    let notifier: Box<dyn Notifier> =
        if !config.telegram_bot_token.is_empty() && !config.telegram_chat_id.is_empty() {
            tracing::info!("using Telegram notifier (chat: {})", config.telegram_chat_id);
            Box::new(TelegramNotifier::new(
                config.telegram_bot_token.clone(),
                config.telegram_chat_id.clone(),
                Duration::from_secs(config.notify_timeout_secs),
            )?)
        } else {
            tracing::warn!("TELEGRAM_BOT_TOKEN/TELEGRAM_CHAT_ID not set, payment alerts go to the log");
            Box::new(LogNotifier)
        };

    let cors = match config.cors_origin.as_deref() {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin.parse::<HeaderValue>()?)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        None => CorsLayer::new(),
    };

    let port = config.port;
    let state = Arc::new(AppState::new(conn, config, notifier));

    let app = handlers::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
