// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Server → client messages.

use serde::{Deserialize, Serialize};

use crate::types::{ColumnId, PresenceUser, Task};

/// A message fanned out (or addressed) by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    /// Full snapshot sent to a newly connected or re-syncing client.
    InitialState(InitialStatePayload),
    /// A task was created; `tempId` lets the creator promote its placeholder.
    TaskCreated(TaskCreatedPayload),
    /// Authoritative post-update state of a task.
    TaskUpdated(Task),
    /// Authoritative post-move state of a task.
    TaskMoved(Task),
    /// A task was deleted.
    TaskDeleted(TaskDeletedPayload),
    /// Outcome of a conflicting mutation, addressed to the loser.
    ConflictResolved(ConflictResolvedPayload),
    /// A column was atomically re-laid-out to evenly spaced positions.
    Rebalanced(RebalancedPayload),
    /// The full presence roster after any presence change.
    PresenceUpdate(Vec<PresenceUser>),
    /// A per-session error; never tears down the connection.
    Error(ErrorPayload),
}

/// Payload of `INITIAL_STATE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialStatePayload {
    pub tasks: Vec<Task>,
    pub presence: Vec<PresenceUser>,
}

/// Payload of `TASK_CREATED`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreatedPayload {
    pub task: Task,
    pub temp_id: String,
}

/// Payload of `TASK_DELETED`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDeletedPayload {
    pub task_id: String,
}

/// How a conflicting mutation was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Resolution {
    /// Some fields were applied, the rest kept the server value.
    Merged,
    /// Every proposed field lost; the row is unchanged.
    Rejected,
}

/// Payload of `CONFLICT_RESOLVED`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictResolvedPayload {
    pub task_id: String,
    pub resolution: Resolution,
    /// The authoritative row after resolution.
    pub task: Task,
    pub merged_fields: Vec<String>,
    pub rejected_fields: Vec<String>,
    pub reason: String,
}

/// Payload of `REBALANCED`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalancedPayload {
    pub column_id: ColumnId,
    /// All tasks of the column in their new order.
    pub tasks: Vec<Task>,
}

/// Payload of `ERROR`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_task() -> Task {
        Task {
            id: "t1".into(),
            title: "New Task".into(),
            description: String::new(),
            column_id: "inprogress".into(),
            position: 65536.0,
            version: 2,
            title_version: 1,
            description_version: 1,
            column_version: 2,
            position_version: 2,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_task_moved_payload_is_bare_task() {
        let msg = ServerMessage::TaskMoved(sample_task());
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "TASK_MOVED");
        assert_eq!(value["payload"]["columnId"], "inprogress");
    }

    #[test]
    fn test_presence_update_payload_is_array() {
        let msg = ServerMessage::PresenceUpdate(vec![]);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "PRESENCE_UPDATE");
        assert!(value["payload"].is_array());
    }

    #[test]
    fn test_conflict_resolution_tags_are_uppercase() {
        let payload = ConflictResolvedPayload {
            task_id: "t1".into(),
            resolution: Resolution::Rejected,
            task: sample_task(),
            merged_fields: vec![],
            rejected_fields: vec!["columnId".into(), "position".into()],
            reason: "Your change was rejected".into(),
        };
        let value = serde_json::to_value(ServerMessage::ConflictResolved(payload)).unwrap();
        assert_eq!(value["payload"]["resolution"], "REJECTED");
        assert_eq!(value["payload"]["rejectedFields"][0], "columnId");
    }

    #[test]
    fn test_error_payload_omits_absent_task_id() {
        let msg = ServerMessage::Error(ErrorPayload {
            code: "INVALID_JSON".into(),
            message: "bad frame".into(),
            task_id: None,
        });
        let value = serde_json::to_value(&msg).unwrap();
        assert!(value["payload"].get("taskId").is_none());
    }
}
