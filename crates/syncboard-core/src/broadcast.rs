// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Connection registry and fan-out delivery.
//!
//! Each WebSocket session owns an unbounded outbound queue drained by its
//! writer task; the registry holds the sending half keyed by client id.
//! A broadcast serializes the message once and clones the text frame per
//! receiver. Sends to a closed queue are dropped silently, the session's
//! close path removes the entry.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::sync::RwLock;
use tokio_tungstenite::tungstenite::Message;
use tracing::trace;

use syncboard_protocol::{encode_server_message, ServerMessage};

use crate::error::{CoreError, Result};

/// Outbound queue handle for one session.
pub type ConnectionSender = mpsc::UnboundedSender<Message>;

/// Registry of open sessions keyed by client id.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, ConnectionSender>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session's outbound queue. A reconnect under the same
    /// client id replaces the previous handle.
    pub async fn register(&self, client_id: &str, sender: ConnectionSender) {
        self.connections
            .write()
            .await
            .insert(client_id.to_string(), sender);
    }

    /// Remove a session. Returns true when an entry existed.
    pub async fn unregister(&self, client_id: &str) -> bool {
        self.connections.write().await.remove(client_id).is_some()
    }

    /// Send one message to one session. A missing or closed session is a
    /// no-op.
    pub async fn send_to(&self, client_id: &str, msg: &ServerMessage) -> Result<()> {
        let encoded = encode(msg)?;
        let connections = self.connections.read().await;
        if let Some(sender) = connections.get(client_id) {
            if sender.send(Message::Text(encoded.into())).is_err() {
                trace!(client_id, "dropping send to closed session");
            }
        }
        Ok(())
    }

    /// Fan a message out to every session except `skip_client_id`.
    pub async fn broadcast(&self, msg: &ServerMessage, skip_client_id: Option<&str>) -> Result<()> {
        let encoded = encode(msg)?;
        let connections = self.connections.read().await;
        for (client_id, sender) in connections.iter() {
            if Some(client_id.as_str()) == skip_client_id {
                continue;
            }
            if sender
                .send(Message::Text(encoded.clone().into()))
                .is_err()
            {
                trace!(client_id, "dropping broadcast to closed session");
            }
        }
        Ok(())
    }

    /// Fan a message out to every session, sender included.
    pub async fn broadcast_all(&self, msg: &ServerMessage) -> Result<()> {
        self.broadcast(msg, None).await
    }

    /// Number of registered sessions.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

fn encode(msg: &ServerMessage) -> Result<String> {
    encode_server_message(msg).map_err(|e| CoreError::Internal {
        details: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncboard_protocol::ErrorPayload;

    fn error_msg(code: &str) -> ServerMessage {
        ServerMessage::Error(ErrorPayload {
            code: code.to_string(),
            message: "test".to_string(),
            task_id: None,
        })
    }

    async fn recv_text(rx: &mut mpsc::UnboundedReceiver<Message>) -> serde_json::Value {
        let Message::Text(text) = rx.recv().await.unwrap() else {
            panic!("expected text frame");
        };
        serde_json::from_str(text.as_ref()).unwrap()
    }

    #[tokio::test]
    async fn test_send_to_reaches_only_the_target() {
        let registry = ConnectionRegistry::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        registry.register("c1", tx1).await;
        registry.register("c2", tx2).await;

        registry.send_to("c1", &error_msg("NOT_FOUND")).await.unwrap();

        let frame = recv_text(&mut rx1).await;
        assert_eq!(frame["payload"]["code"], "NOT_FOUND");
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_skips_the_sender() {
        let registry = ConnectionRegistry::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        registry.register("c1", tx1).await;
        registry.register("c2", tx2).await;

        registry
            .broadcast(&error_msg("X"), Some("c1"))
            .await
            .unwrap();

        assert!(rx1.try_recv().is_err());
        assert_eq!(recv_text(&mut rx2).await["type"], "ERROR");
    }

    #[tokio::test]
    async fn test_broadcast_all_includes_everyone() {
        let registry = ConnectionRegistry::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        registry.register("c1", tx1).await;
        registry.register("c2", tx2).await;

        registry.broadcast_all(&error_msg("X")).await.unwrap();

        assert_eq!(recv_text(&mut rx1).await["type"], "ERROR");
        assert_eq!(recv_text(&mut rx2).await["type"], "ERROR");
    }

    #[tokio::test]
    async fn test_closed_sessions_are_dropped_silently() {
        let registry = ConnectionRegistry::new();
        let (tx1, rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        registry.register("c1", tx1).await;
        registry.register("c2", tx2).await;
        drop(rx1);

        // Neither the send_to nor the fan-out may fail because of c1.
        registry.send_to("c1", &error_msg("X")).await.unwrap();
        registry.broadcast_all(&error_msg("Y")).await.unwrap();
        assert_eq!(recv_text(&mut rx2).await["payload"]["code"], "Y");

        assert!(registry.unregister("c1").await);
        assert_eq!(registry.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_send_to_unknown_session_is_a_noop() {
        let registry = ConnectionRegistry::new();
        registry.send_to("ghost", &error_msg("X")).await.unwrap();
    }
}
