// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Client → server messages.
//!
//! Every inbound frame is `{ "type": <tag>, "payload": <object> }`. The tag
//! set is closed; anything else is rejected by the codec before dispatch.

use serde::{Deserialize, Serialize};

use crate::types::{ColumnId, UpdateChanges};

/// A message sent by a board client over the duplex channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Request a fresh full snapshot (tasks + presence).
    SyncRequest(SyncRequestPayload),
    /// Create a task; `tempId` is echoed back so the client can promote
    /// its optimistic placeholder.
    CreateTask(CreateTaskPayload),
    /// Edit title and/or description against an observed `baseVersion`.
    UpdateTask(UpdateTaskPayload),
    /// Move a task to a column/position against an observed `baseVersion`.
    MoveTask(MoveTaskPayload),
    /// Delete a task. Always wins; `baseVersion` is accepted but not enforced.
    DeleteTask(DeleteTaskPayload),
    /// Update the sender's presence entry (username, viewing, editing).
    PresenceUpdate(PresenceUpdatePayload),
    /// Replay mutations queued while the client was offline, in order.
    ReplayQueue(ReplayQueuePayload),
}

/// Payload of `SYNC_REQUEST`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequestPayload {
    pub client_id: String,
}

/// Payload of `CREATE_TASK`.
///
/// `title` and `description` fall back to server defaults when omitted.
/// A missing or non-positive `position` means "append to the column".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskPayload {
    pub client_id: String,
    pub temp_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub column_id: ColumnId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<f64>,
}

/// Payload of `UPDATE_TASK`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskPayload {
    pub client_id: String,
    pub task_id: String,
    pub base_version: i64,
    pub changes: UpdateChanges,
}

/// Payload of `MOVE_TASK`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveTaskPayload {
    pub client_id: String,
    pub task_id: String,
    pub base_version: i64,
    pub column_id: ColumnId,
    pub position: f64,
}

/// Payload of `DELETE_TASK`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteTaskPayload {
    pub client_id: String,
    pub task_id: String,
    #[serde(default)]
    pub base_version: i64,
}

/// Payload of `PRESENCE_UPDATE`.
///
/// `viewingTask`/`editingTask` are the sender's full current activity:
/// omitting one clears it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUpdatePayload {
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewing_task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editing_task: Option<String>,
}

/// Payload of `REPLAY_QUEUE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayQueuePayload {
    pub client_id: String,
    pub operations: Vec<QueuedOperation>,
}

/// One mutation captured by an offline client.
///
/// The inner payload is kept as raw JSON; each operation re-enters the
/// normal decode path on replay so stale or malformed entries are answered
/// exactly like live frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedOperation {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enqueued_at: Option<serde_json::Value>,
}
