// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! WebSocket connection supervisor.
//!
//! Accepts duplex sessions, reads the client's identity from the upgrade
//! URL (`?clientId=...&username=...`), wires the session into the
//! connection and presence registries, and runs the per-session read loop.
//! Inbound frames are processed strictly in receive order: the loop awaits
//! each dispatch before pulling the next frame, which is what keeps
//! replayed offline queues in enqueue order.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, instrument, warn};

use syncboard_protocol::ServerMessage;

use crate::router::{self, RouterState};
use crate::snapshot;

/// Run the WebSocket server accept loop.
#[instrument(skip(state))]
pub async fn run_ws_server(bind_addr: SocketAddr, state: Arc<RouterState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, "WebSocket server listening");

    loop {
        let (stream, addr) = listener.accept().await?;
        debug!(%addr, "new TCP connection");

        let state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, addr, state).await {
                error!("Connection error from {addr}: {e}");
            }
        });
    }
}

/// Identity carried in the upgrade URL query string.
#[derive(Debug, Clone, PartialEq)]
struct SessionIdentity {
    client_id: String,
    username: String,
}

/// Handle one WebSocket session from accept to close.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<RouterState>,
) -> anyhow::Result<()> {
    let mut query: Option<String> = None;
    let ws_stream = accept_hdr_async(stream, |req: &Request, response: Response| {
        query = req.uri().query().map(str::to_string);
        Ok(response)
    })
    .await?;

    let identity = identity_from_query(query.as_deref());
    let client_id = identity.client_id;
    info!(%addr, client_id, username = %identity.username, "session established");

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // The writer task owns the sink half; everything outbound (snapshots,
    // broadcasts, pongs) funnels through this queue.
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    state.connections.register(&client_id, tx.clone()).await;
    state.presence.add_user(&client_id, &identity.username).await;

    // Snapshot to the new session, roster to everyone else.
    match snapshot::initial_state(state.store.as_ref(), &state.presence).await {
        Ok(msg) => {
            if let Err(e) = state.connections.send_to(&client_id, &msg).await {
                error!(client_id, "failed to send initial state: {e}");
            }
        }
        Err(e) => error!(client_id, "failed to assemble initial state: {e}"),
    }
    let roster = state.presence.all_users().await;
    let _ = state
        .connections
        .broadcast(&ServerMessage::PresenceUpdate(roster), Some(&client_id))
        .await;

    // One frame at a time; dispatch completes before the next frame is
    // read.
    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                router::handle_frame(&state, &client_id, text.as_ref()).await;
            }
            Ok(Message::Ping(data)) => {
                let _ = tx.send(Message::Pong(data));
            }
            Ok(Message::Close(_)) => {
                debug!(client_id, "close frame received");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(client_id, "WebSocket error from {addr}: {e}");
                break;
            }
        }
    }

    // Teardown: drop the session from both registries, then tell the rest.
    state.connections.unregister(&client_id).await;
    state.presence.remove_user(&client_id).await;
    let roster = state.presence.all_users().await;
    let _ = state
        .connections
        .broadcast_all(&ServerMessage::PresenceUpdate(roster))
        .await;

    drop(tx);
    let _ = writer.await;
    info!(client_id, "session closed");
    Ok(())
}

/// Extract `clientId`/`username` from the upgrade query, falling back to
/// `anon-<millis>` and `User-<last4(clientId)>`.
fn identity_from_query(query: Option<&str>) -> SessionIdentity {
    let params = parse_query(query.unwrap_or(""));
    let client_id = params
        .get("clientId")
        .filter(|v| !v.is_empty())
        .cloned()
        .unwrap_or_else(|| format!("anon-{}", Utc::now().timestamp_millis()));
    let username = params
        .get("username")
        .filter(|v| !v.is_empty())
        .cloned()
        .unwrap_or_else(|| format!("User-{}", last_chars(&client_id, 4)));
    SessionIdentity {
        client_id,
        username,
    }
}

fn last_chars(s: &str, n: usize) -> String {
    let count = s.chars().count();
    s.chars().skip(count.saturating_sub(n)).collect()
}

/// Minimal query-string parser for the handshake URL. Handles `+` and
/// percent escapes; malformed escapes are kept verbatim.
fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            Some((percent_decode(key), percent_decode(value)))
        })
        .collect()
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                match (hex_val(bytes.get(i + 1)), hex_val(bytes.get(i + 2))) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi * 16 + lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(b: Option<&u8>) -> Option<u8> {
    (*b? as char).to_digit(16).map(|d| d as u8)
}
