// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Persistence interfaces and backends for syncboard-core.
//!
//! The task service is the one place where conflict analysis, ordering
//! arithmetic, and atomic writes meet. Every mutating operation runs in a
//! single database transaction holding an exclusive lock on the target row
//! (`SELECT ... FOR UPDATE` on Postgres; the single-writer connection on
//! SQLite), so read-analyse-write is free of TOCTOU windows.

pub mod postgres;
pub mod sqlite;

pub use self::postgres::PostgresPersistence;
pub use self::sqlite::SqlitePersistence;

use chrono::{DateTime, Utc};
use syncboard_protocol::{ColumnId, Task, UpdateChanges};

use crate::conflict::ConflictAnalysis;
use crate::error::CoreError;

/// Maximum title length in characters.
pub const MAX_TITLE_LEN: usize = 200;

/// Maximum description length in characters.
pub const MAX_DESCRIPTION_LEN: usize = 2000;

/// Title given to tasks created without one.
pub const DEFAULT_TITLE: &str = "New Task";

/// Task row from the persistence layer.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct TaskRecord {
    /// Server-assigned identifier.
    pub id: String,
    /// Title, at most [`MAX_TITLE_LEN`] characters.
    pub title: String,
    /// Description, at most [`MAX_DESCRIPTION_LEN`] characters.
    pub description: String,
    /// Board column (`todo`, `inprogress`, `done`).
    pub column_id: String,
    /// Fractional position within the column, strictly positive.
    pub position: f64,
    /// Global per-row version counter.
    pub version: i64,
    /// Version that last wrote `title`.
    pub title_version: i64,
    /// Version that last wrote `description`.
    pub description_version: i64,
    /// Version that last wrote `column_id`.
    pub column_version: i64,
    /// Version that last wrote `position`.
    pub position_version: i64,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Advanced on every row write by the database.
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    /// Convert to the wire representation.
    pub fn into_wire(self) -> Task {
        Task {
            id: self.id,
            title: self.title,
            description: self.description,
            column_id: self.column_id,
            position: self.position,
            version: self.version,
            title_version: self.title_version,
            description_version: self.description_version,
            column_version: self.column_version,
            position_version: self.position_version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Input for task creation.
#[derive(Debug, Clone)]
pub struct NewTask {
    /// Title; `None` falls back to [`DEFAULT_TITLE`].
    pub title: Option<String>,
    /// Description; `None` falls back to empty.
    pub description: Option<String>,
    /// Target column.
    pub column_id: ColumnId,
    /// Requested position. `None` or a non-positive value means "append".
    pub position: Option<f64>,
}

/// Result of an update or move that went through conflict analysis.
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    /// The authoritative row after the operation (unchanged on rejection).
    pub task: TaskRecord,
    /// Present when any proposed field was rejected.
    pub conflict: Option<ConflictAnalysis>,
}

/// Result of a move, which may additionally require a column rebalance.
#[derive(Debug, Clone)]
pub struct MoveOutcome {
    /// The authoritative row after the operation (unchanged on rejection).
    pub task: TaskRecord,
    /// Present when any proposed field was rejected.
    pub conflict: Option<ConflictAnalysis>,
    /// True when a same-column neighbour sits within `MIN_GAP` of the new
    /// position. The rebalance itself runs in a later transaction.
    pub needs_rebalance: bool,
}

/// Transactional task store.
#[async_trait::async_trait]
pub trait Persistence: Send + Sync {
    /// Insert a new task. A missing or non-positive position is computed as
    /// end-of-column inside the transaction. All version stamps start at 1.
    async fn create_task(&self, new: NewTask) -> Result<TaskRecord, CoreError>;

    /// Apply a title/description edit against `base_version` under a row
    /// lock. A fully rejected edit writes nothing and returns the current
    /// row; a partial or clean merge bumps `version` by one and stamps the
    /// merged fields with it.
    async fn update_task(
        &self,
        task_id: &str,
        base_version: i64,
        changes: UpdateChanges,
    ) -> Result<WriteOutcome, CoreError>;

    /// Apply a column/position move against `base_version` under a row
    /// lock, reporting whether the column now needs a rebalance.
    async fn move_task(
        &self,
        task_id: &str,
        base_version: i64,
        column_id: ColumnId,
        position: f64,
    ) -> Result<MoveOutcome, CoreError>;

    /// Delete a task unconditionally. Returns false when no row existed.
    async fn delete_task(&self, task_id: &str) -> Result<bool, CoreError>;

    /// Fetch one task, if present.
    async fn get_task(&self, task_id: &str) -> Result<Option<TaskRecord>, CoreError>;

    /// All tasks ordered by `(column_id, position)`.
    async fn get_all_tasks(&self) -> Result<Vec<TaskRecord>, CoreError>;

    /// Atomically rewrite a column to evenly spaced positions, bumping each
    /// row's version and position stamp. Returns the rows in new order.
    async fn rebalance_column(&self, column_id: ColumnId) -> Result<Vec<TaskRecord>, CoreError>;

    /// Number of task rows.
    async fn task_count(&self) -> Result<i64, CoreError>;
}

/// Clamp a title to its length bound, defaulting when absent or blank.
pub(crate) fn normalize_title(title: Option<String>) -> String {
    match title {
        Some(t) if !t.trim().is_empty() => truncate_chars(t, MAX_TITLE_LEN),
        _ => DEFAULT_TITLE.to_string(),
    }
}

/// Clamp a description to its length bound, defaulting to empty.
pub(crate) fn normalize_description(description: Option<String>) -> String {
    truncate_chars(description.unwrap_or_default(), MAX_DESCRIPTION_LEN)
}

/// Clamp proposed update fields to their length bounds.
pub(crate) fn clamp_changes(changes: UpdateChanges) -> UpdateChanges {
    UpdateChanges {
        title: changes.title.map(|t| truncate_chars(t, MAX_TITLE_LEN)),
        description: changes
            .description
            .map(|d| truncate_chars(d, MAX_DESCRIPTION_LEN)),
    }
}

fn truncate_chars(s: String, max: usize) -> String {
    if s.chars().count() <= max {
        s
    } else {
        s.chars().take(max).collect()
    }
}
