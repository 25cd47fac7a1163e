// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

/// Syncboard configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL or SQLite connection URL
    pub database_url: String,
    /// WebSocket listener address
    pub ws_addr: SocketAddr,
    /// Read-only HTTP listener address
    pub http_addr: SocketAddr,
    /// Maximum database pool connections
    pub max_db_connections: u32,
    /// Pool connection-acquisition timeout
    pub acquire_timeout: Duration,
    /// Pool idle timeout
    pub idle_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `SYNCBOARD_DATABASE_URL`: PostgreSQL or SQLite connection string
    ///
    /// Optional (with defaults):
    /// - `SYNCBOARD_WS_PORT`: WebSocket port (default: 3001)
    /// - `SYNCBOARD_HTTP_PORT`: HTTP port (default: 3002)
    /// - `SYNCBOARD_MAX_DB_CONNECTIONS`: pool size (default: 10)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("SYNCBOARD_DATABASE_URL")
            .map_err(|_| ConfigError::Missing("SYNCBOARD_DATABASE_URL"))?;

        let ws_port: u16 = std::env::var("SYNCBOARD_WS_PORT")
            .unwrap_or_else(|_| "3001".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("SYNCBOARD_WS_PORT", "must be a valid port number"))?;

        let http_port: u16 = std::env::var("SYNCBOARD_HTTP_PORT")
            .unwrap_or_else(|_| "3002".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("SYNCBOARD_HTTP_PORT", "must be a valid port number")
            })?;

        let max_db_connections: u32 = std::env::var("SYNCBOARD_MAX_DB_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("SYNCBOARD_MAX_DB_CONNECTIONS", "must be a positive integer")
            })?;

        Ok(Self {
            database_url,
            ws_addr: SocketAddr::from(([0, 0, 0, 0], ws_port)),
            http_addr: SocketAddr::from(([0, 0, 0, 0], http_port)),
            max_db_connections,
            acquire_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(30),
        })
    }

    /// True when the configured database is SQLite (single-writer mode).
    pub fn is_sqlite(&self) -> bool {
        self.database_url.starts_with("sqlite")
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
