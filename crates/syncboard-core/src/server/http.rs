// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Read-only HTTP surface: health probe and task listing.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, instrument};

use syncboard_protocol::Task;

use crate::router::RouterState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    connections: usize,
    timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
struct TasksResponse {
    tasks: Vec<Task>,
}

/// Build the read-only API router.
pub fn api_router(state: Arc<RouterState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/tasks", get(list_tasks))
        .with_state(state)
}

/// Run the HTTP server until the process shuts down.
#[instrument(skip(state))]
pub async fn run_http_server(bind_addr: SocketAddr, state: Arc<RouterState>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, "HTTP server listening");
    axum::serve(listener, api_router(state)).await?;
    Ok(())
}

async fn health(State(state): State<Arc<RouterState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        connections: state.connections.connection_count().await,
        timestamp: Utc::now(),
    })
}

async fn list_tasks(
    State(state): State<Arc<RouterState>>,
) -> Result<Json<TasksResponse>, StatusCode> {
    match state.store.get_all_tasks().await {
        Ok(records) => Ok(Json(TasksResponse {
            tasks: records.into_iter().map(|r| r.into_wire()).collect(),
        })),
        Err(e) => {
            error!("task list query failed: {e}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
