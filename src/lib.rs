use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod config;
pub mod context;
pub mod conversations;
pub mod db;
pub mod delivery;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod health;
pub mod message;
pub mod pagination;
pub mod registry;
pub mod store;

use config::Config;
use context::AppContext;

/// Builds the full application router: REST surface, live channel, health.
pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route(
            "/api/messages",
            post(handlers::messages::send_message).get(handlers::messages::get_messages),
        )
        .route(
            "/api/messages/conversations",
            get(handlers::messages::get_conversations),
        )
        .route("/ws", get(handlers::ws::ws_upgrade))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Connects storage, wires the context and serves until shutdown.
pub async fn run_server(config: Config) -> Result<()> {
    let db_pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    db::init_schema(&db_pool).await?;
    tracing::info!(database_url = %config.database_url, "Connected to database");

    let port = config.port;
    let ctx = AppContext::new(db_pool, Arc::new(config));
    let app = build_router(ctx);

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}
