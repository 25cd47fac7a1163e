// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Network surfaces: the WebSocket duplex channel and the read-only HTTP
//! API. All mutations travel over the WebSocket; HTTP only observes.

pub mod http;
pub mod ws;

pub use http::run_http_server;
pub use ws::run_ws_server;
