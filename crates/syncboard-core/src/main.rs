// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Syncboard Core - Real-time task-board backend
//!
//! Startup orchestration: configuration, database connection and
//! migrations, shared registries, and the two listeners (WebSocket for
//! mutations, HTTP for reads).

use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{error, info};

use syncboard_core::broadcast::ConnectionRegistry;
use syncboard_core::config::Config;
use syncboard_core::migrations;
use syncboard_core::persistence::{Persistence, PostgresPersistence, SqlitePersistence};
use syncboard_core::presence::PresenceRegistry;
use syncboard_core::router::RouterState;
use syncboard_core::server;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (from crate directory or parent directories)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("syncboard_core=info".parse().unwrap()),
        )
        .init();

    info!("Starting Syncboard Core");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;

    info!(
        ws_addr = %config.ws_addr,
        http_addr = %config.http_addr,
        "Configuration loaded"
    );

    // Connect to the database and run migrations
    info!("Connecting to database...");
    let (store, pg_pool): (Arc<dyn Persistence>, Option<PgPool>) = if config.is_sqlite() {
        let persistence = SqlitePersistence::connect(&config.database_url).await?;
        info!("SQLite database ready (single-writer mode)");
        (Arc::new(persistence), None)
    } else {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_db_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .connect(&config.database_url)
            .await?;

        // Verify connection
        let row: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&pool).await?;
        info!(result = row.0, "Database health check passed");

        info!("Running database migrations...");
        migrations::run_postgres(&pool).await?;
        info!("Migrations completed");

        (Arc::new(PostgresPersistence::new(pool.clone())), Some(pool))
    };

    // Shared state for router, supervisor, and HTTP surface
    let state = Arc::new(RouterState::new(
        store,
        Arc::new(ConnectionRegistry::new()),
        Arc::new(PresenceRegistry::new()),
    ));

    info!("Syncboard Core initialized successfully");

    // Start WebSocket server (clients connect here for all mutations)
    let ws_addr = config.ws_addr;
    let ws_state = state.clone();
    let ws_server_handle = tokio::spawn(async move {
        if let Err(e) = server::run_ws_server(ws_addr, ws_state).await {
            error!("WebSocket server error: {}", e);
        }
    });

    // Start read-only HTTP server (health + task list)
    let http_addr = config.http_addr;
    let http_state = state.clone();
    let http_server_handle = tokio::spawn(async move {
        if let Err(e) = server::run_http_server(http_addr, http_state).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    // Cancel server tasks
    ws_server_handle.abort();
    http_server_handle.abort();

    if let Some(pool) = pg_pool {
        pool.close().await;
    }
    info!("Shutdown complete");

    Ok(())
}
