// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared wire types: tasks, columns, presence entries, protocol errors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while decoding inbound frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame was not valid JSON, or a payload failed to deserialize.
    #[error("invalid JSON frame: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The frame carried no `type` discriminator.
    #[error("frame has no \"type\" field")]
    MissingType,

    /// The `type` discriminator is not a known client message.
    #[error("unknown message type: {0}")]
    UnknownType(String),
}

impl ProtocolError {
    /// Wire error code sent back to the offending session.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) | Self::MissingType => "INVALID_JSON",
            Self::UnknownType(_) => "UNKNOWN_MESSAGE_TYPE",
        }
    }
}

/// The three board columns a task can live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnId {
    /// Backlog column.
    Todo,
    /// Work-in-progress column.
    Inprogress,
    /// Finished column.
    Done,
}

impl ColumnId {
    /// All columns in board order.
    pub const ALL: [ColumnId; 3] = [ColumnId::Todo, ColumnId::Inprogress, ColumnId::Done];

    /// The lowercase wire/database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnId::Todo => "todo",
            ColumnId::Inprogress => "inprogress",
            ColumnId::Done => "done",
        }
    }

    /// Parse the lowercase wire representation.
    pub fn parse(s: &str) -> Option<ColumnId> {
        match s {
            "todo" => Some(ColumnId::Todo),
            "inprogress" => Some(ColumnId::Inprogress),
            "done" => Some(ColumnId::Done),
            _ => None,
        }
    }
}

impl std::fmt::Display for ColumnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task as seen on the wire and in snapshots.
///
/// `version` is the global per-row counter; the four `*_version` stamps
/// record which global version last wrote each logical field. Clients echo
/// the `version` they observed as `baseVersion` on mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub column_id: String,
    pub position: f64,
    pub version: i64,
    pub title_version: i64,
    pub description_version: i64,
    pub column_version: i64,
    pub position_version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Ephemeral per-session presence entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUser {
    pub client_id: String,
    pub username: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewing_task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editing_task: Option<String>,
    pub connected_at: DateTime<Utc>,
}

/// The editable-field subset an `UPDATE_TASK` may carry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl UpdateChanges {
    /// True when the change set names no field at all.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none()
    }
}
