use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{Level, info};

use tasterank_server::build_router;
use tasterank_server::config::AppConfig;
use tasterank_server::database::{ensure_indexes, init_db};
use tasterank_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db = init_db(&config.database)
        .await
        .context("Failed to connect to the database")?;
    ensure_indexes(&db).await?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let sweep_interval = Duration::from_secs(config.cache.sweep_interval_secs);

    let state = AppState::new(db, config);
    let _sweeper = state.listings.spawn_sweeper(sweep_interval);
    let app = build_router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server running at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
