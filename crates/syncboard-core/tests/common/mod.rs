// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for syncboard-core E2E tests.
//!
//! Provides TestContext for booting a WebSocket server against an
//! in-memory SQLite store, and a small WebSocket test client.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use syncboard_core::broadcast::ConnectionRegistry;
use syncboard_core::persistence::{Persistence, SqlitePersistence};
use syncboard_core::presence::PresenceRegistry;
use syncboard_core::router::RouterState;
use syncboard_core::server;

/// Test context that manages the store, a WebSocket server on an ephemeral
/// port, and client connections.
pub struct TestContext {
    pub state: Arc<RouterState>,
    pub ws_addr: SocketAddr,
}

impl TestContext {
    /// Boot a server over a fresh in-memory SQLite database.
    pub async fn new() -> Self {
        // 1. In-memory store, migrated.
        let store: Arc<dyn Persistence> = Arc::new(
            SqlitePersistence::connect("sqlite::memory:")
                .await
                .expect("in-memory SQLite store"),
        );

        // 2. Shared state.
        let state = Arc::new(RouterState::new(
            store,
            Arc::new(ConnectionRegistry::new()),
            Arc::new(PresenceRegistry::new()),
        ));

        // 3. Find an available port.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("ephemeral port");
        let ws_addr = listener.local_addr().expect("local addr");
        drop(listener);

        // 4. Start the server in the background.
        let server_state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = server::run_ws_server(ws_addr, server_state).await {
                eprintln!("Test WebSocket server error: {e}");
            }
        });

        // 5. Wait for the listener to come up.
        tokio::time::sleep(Duration::from_millis(100)).await;

        Self { state, ws_addr }
    }

    /// Connect a client with the given identity. The INITIAL_STATE frame is
    /// left in the stream for the test to consume.
    pub async fn client(&self, client_id: &str, username: &str) -> TestClient {
        let url = format!(
            "ws://{}/?clientId={}&username={}",
            self.ws_addr, client_id, username
        );
        let (ws, _) = connect_async(&url).await.expect("client connects");
        TestClient {
            client_id: client_id.to_string(),
            ws,
        }
    }
}

/// A WebSocket client driving the server like a real board client.
pub struct TestClient {
    pub client_id: String,
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    /// Send one frame.
    pub async fn send(&mut self, frame: serde_json::Value) {
        self.ws
            .send(Message::Text(frame.to_string().into()))
            .await
            .expect("send frame");
    }

    /// Send a raw, possibly malformed, text frame.
    pub async fn send_raw(&mut self, raw: &str) {
        self.ws
            .send(Message::Text(raw.to_string().into()))
            .await
            .expect("send raw frame");
    }

    /// Receive the next text frame, with a timeout.
    pub async fn recv(&mut self) -> serde_json::Value {
        let deadline = Duration::from_secs(2);
        loop {
            let msg = tokio::time::timeout(deadline, self.ws.next())
                .await
                .expect("timed out waiting for a frame")
                .expect("stream ended")
                .expect("websocket error");
            if let Message::Text(text) = msg {
                return serde_json::from_str(text.as_ref()).expect("valid JSON frame");
            }
        }
    }

    /// Receive frames until one matches `msg_type`, discarding others
    /// (typically presence noise).
    pub async fn recv_type(&mut self, msg_type: &str) -> serde_json::Value {
        for _ in 0..32 {
            let frame = self.recv().await;
            if frame["type"] == msg_type {
                return frame;
            }
        }
        panic!("no {msg_type} frame within 32 messages");
    }

    /// Assert that no frame arrives within a short window.
    pub async fn expect_silence(&mut self) {
        let result = tokio::time::timeout(Duration::from_millis(200), self.ws.next()).await;
        if let Ok(Some(Ok(Message::Text(text)))) = &result {
            panic!("expected silence, got frame: {text}");
        }
    }

    /// Close the session.
    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
        // Drain until the server acknowledges the close.
        while let Ok(Some(_)) =
            tokio::time::timeout(Duration::from_millis(200), self.ws.next()).await
        {}
    }
}
