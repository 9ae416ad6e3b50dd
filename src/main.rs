use std::sync::Arc;

use ai_locker::{app, config, database::open_stores, AppState};
use anyhow::Context;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ai_locker=info,tower_http=info")),
        )
        .init();

    let config = config::config().clone();
    tracing::info!("Starting AI Locker API in {:?} mode", config.environment);

    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set outside development");
    }
    match &config.security.seed_admin_email {
        Some(email) => tracing::info!("Seed admin is {}", email),
        None => tracing::warn!("SEED_ADMIN_EMAIL not set; nobody can manage roles or permissions"),
    }

    let stores = open_stores(&config.database)
        .await
        .context("failed to open user store")?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(Arc::new(config), stores);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("AI Locker API listening on http://{}", bind_addr);

    axum::serve(listener, app(state)).await.context("server error")?;
    Ok(())
}
