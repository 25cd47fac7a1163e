// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Syncboard Protocol - JSON message layer for the task-board duplex channel
//!
//! This crate defines the wire protocol spoken between board clients and
//! syncboard-core over a WebSocket session:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   syncboard-protocol                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Messages: tagged unions { "type": ..., "payload": ... }    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Serialization: JSON (serde_json), camelCase fields         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Transport: WebSocket text frames (owned by syncboard-core) │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Message Families
//!
//! ## Client → Server ([`ClientMessage`])
//!
//! Board mutations (`CREATE_TASK`, `UPDATE_TASK`, `MOVE_TASK`,
//! `DELETE_TASK`), the initial sync handshake (`SYNC_REQUEST`), presence
//! updates (`PRESENCE_UPDATE`), and offline queue replay (`REPLAY_QUEUE`).
//!
//! ## Server → Client ([`ServerMessage`])
//!
//! Authoritative state fan-out (`TASK_CREATED`, `TASK_UPDATED`,
//! `TASK_MOVED`, `TASK_DELETED`, `REBALANCED`), conflict outcomes
//! (`CONFLICT_RESOLVED`), snapshots (`INITIAL_STATE`), presence rosters
//! (`PRESENCE_UPDATE`), and per-session errors (`ERROR`).
//!
//! # Decoding
//!
//! [`codec::decode_client_message`] classifies failures so the server can
//! answer with the right error code: malformed frames are `INVALID_JSON`,
//! well-formed frames with an unrecognized discriminator are
//! `UNKNOWN_MESSAGE_TYPE`. Unknown tags are rejected at this boundary, not
//! deep in dispatch.

pub mod client;
pub mod codec;
pub mod server;
pub mod types;

pub use client::{
    ClientMessage, CreateTaskPayload, DeleteTaskPayload, MoveTaskPayload, PresenceUpdatePayload,
    QueuedOperation, ReplayQueuePayload, SyncRequestPayload, UpdateTaskPayload,
};
pub use codec::{decode_client_message, decode_queued_operation, encode_server_message};
pub use server::{
    ConflictResolvedPayload, ErrorPayload, InitialStatePayload, RebalancedPayload, Resolution,
    ServerMessage, TaskCreatedPayload, TaskDeletedPayload,
};
pub use types::{ColumnId, PresenceUser, ProtocolError, Task, UpdateChanges};
