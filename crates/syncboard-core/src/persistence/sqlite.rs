// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite-backed task store.
//!
//! Used for development and tests. The pool is capped at a single
//! connection, so transactions serialize and the Postgres `FOR UPDATE` has
//! no SQLite counterpart to need. `updated_at` is written explicitly in
//! each UPDATE because SQLite's RETURNING does not observe trigger writes.

use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use syncboard_protocol::{ColumnId, UpdateChanges};
use uuid::Uuid;

use crate::conflict::{self, ChangeSet};
use crate::error::CoreError;
use crate::migrations;
use crate::ordering;

use super::{
    clamp_changes, normalize_description, normalize_title, MoveOutcome, NewTask, Persistence,
    TaskRecord, WriteOutcome,
};

/// SQLite-backed persistence provider.
#[derive(Clone)]
pub struct SqlitePersistence {
    pool: SqlitePool,
}

impl SqlitePersistence {
    /// Create a new SQLite persistence provider from an existing pool.
    ///
    /// The pool should be capped at one connection; see [`Self::connect`].
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database and run migrations.
    ///
    /// The pool keeps exactly one connection alive: SQLite allows a single
    /// writer anyway, and an in-memory database would vanish with its
    /// connection if the pool were allowed to recycle it.
    pub async fn connect(url: &str) -> Result<Self, CoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(url)
            .await
            .map_err(|e| CoreError::DatabaseError {
                operation: "connect".to_string(),
                details: format!("Failed to connect to SQLite at '{}': {}", url, e),
            })?;

        migrations::run_sqlite(&pool)
            .await
            .map_err(|e| CoreError::DatabaseError {
                operation: "migrate".to_string(),
                details: e.to_string(),
            })?;

        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl Persistence for SqlitePersistence {
    async fn create_task(&self, new: NewTask) -> Result<TaskRecord, CoreError> {
        let mut tx = self.pool.begin().await?;

        let position = match new.position {
            Some(p) if p > 0.0 => p,
            _ => {
                let existing: Vec<f64> =
                    sqlx::query_scalar("SELECT position FROM tasks WHERE column_id = ?")
                        .bind(new.column_id.as_str())
                        .fetch_all(&mut *tx)
                        .await?;
                ordering::position_at_end(&existing)
            }
        };

        let now = Utc::now();
        let record = sqlx::query_as::<_, TaskRecord>(
            r#"
            INSERT INTO tasks (id, title, description, column_id, position, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id, title, description, column_id, position,
                      version, title_version, description_version,
                      column_version, position_version, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(normalize_title(new.title))
        .bind(normalize_description(new.description))
        .bind(new.column_id.as_str())
        .bind(position)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(record)
    }

    async fn update_task(
        &self,
        task_id: &str,
        base_version: i64,
        changes: UpdateChanges,
    ) -> Result<WriteOutcome, CoreError> {
        let changes = clamp_changes(changes);

        let mut tx = self.pool.begin().await?;
        let current = read_task(&mut tx, task_id).await?;

        if changes.is_empty() {
            tx.commit().await?;
            return Ok(WriteOutcome {
                task: current,
                conflict: None,
            });
        }

        let change_set = ChangeSet {
            title: changes.title,
            description: changes.description,
            ..ChangeSet::default()
        };
        let analysis = conflict::analyze(&current, base_version, &change_set);

        if analysis.fully_rejected() {
            tx.commit().await?;
            return Ok(WriteOutcome {
                task: current,
                conflict: Some(analysis),
            });
        }

        let new_version = current.version + 1;
        let updated = sqlx::query_as::<_, TaskRecord>(
            r#"
            UPDATE tasks SET
                title = COALESCE(?2, title),
                title_version = CASE WHEN ?2 IS NOT NULL THEN ?4 ELSE title_version END,
                description = COALESCE(?3, description),
                description_version = CASE WHEN ?3 IS NOT NULL THEN ?4 ELSE description_version END,
                version = ?4,
                updated_at = ?5
            WHERE id = ?1
            RETURNING id, title, description, column_id, position,
                      version, title_version, description_version,
                      column_version, position_version, created_at, updated_at
            "#,
        )
        .bind(task_id)
        .bind(&analysis.merged.title)
        .bind(&analysis.merged.description)
        .bind(new_version)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        let conflict = analysis.has_conflict().then_some(analysis);
        Ok(WriteOutcome {
            task: updated,
            conflict,
        })
    }

    async fn move_task(
        &self,
        task_id: &str,
        base_version: i64,
        column_id: ColumnId,
        position: f64,
    ) -> Result<MoveOutcome, CoreError> {
        let mut tx = self.pool.begin().await?;
        let current = read_task(&mut tx, task_id).await?;

        let change_set = ChangeSet {
            column_id: Some(column_id),
            position: Some(position),
            ..ChangeSet::default()
        };
        let analysis = conflict::analyze(&current, base_version, &change_set);

        if analysis.fully_rejected() {
            tx.commit().await?;
            return Ok(MoveOutcome {
                task: current,
                conflict: Some(analysis),
                needs_rebalance: false,
            });
        }

        let new_version = current.version + 1;
        let updated = sqlx::query_as::<_, TaskRecord>(
            r#"
            UPDATE tasks SET
                column_id = COALESCE(?2, column_id),
                column_version = CASE WHEN ?2 IS NOT NULL THEN ?4 ELSE column_version END,
                position = COALESCE(?3, position),
                position_version = CASE WHEN ?3 IS NOT NULL THEN ?4 ELSE position_version END,
                version = ?4,
                updated_at = ?5
            WHERE id = ?1
            RETURNING id, title, description, column_id, position,
                      version, title_version, description_version,
                      column_version, position_version, created_at, updated_at
            "#,
        )
        .bind(task_id)
        .bind(analysis.merged.column_id.map(|c| c.as_str()))
        .bind(analysis.merged.position)
        .bind(new_version)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        let neighbours: Vec<f64> = sqlx::query_scalar(
            r#"
            SELECT position FROM tasks
            WHERE column_id = ?1 AND id <> ?2
            ORDER BY ABS(position - ?3)
            LIMIT 2
            "#,
        )
        .bind(&updated.column_id)
        .bind(task_id)
        .bind(updated.position)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let needs_rebalance = neighbours
            .iter()
            .any(|p| (p - updated.position).abs() < ordering::MIN_GAP);
        let conflict = analysis.has_conflict().then_some(analysis);
        Ok(MoveOutcome {
            task: updated,
            conflict,
            needs_rebalance,
        })
    }

    async fn delete_task(&self, task_id: &str) -> Result<bool, CoreError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_task(&self, task_id: &str) -> Result<Option<TaskRecord>, CoreError> {
        let record = sqlx::query_as::<_, TaskRecord>(
            r#"
            SELECT id, title, description, column_id, position,
                   version, title_version, description_version,
                   column_version, position_version, created_at, updated_at
            FROM tasks
            WHERE id = ?
            "#,
        )
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn get_all_tasks(&self) -> Result<Vec<TaskRecord>, CoreError> {
        let records = sqlx::query_as::<_, TaskRecord>(
            r#"
            SELECT id, title, description, column_id, position,
                   version, title_version, description_version,
                   column_version, position_version, created_at, updated_at
            FROM tasks
            ORDER BY column_id, position
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn rebalance_column(&self, column_id: ColumnId) -> Result<Vec<TaskRecord>, CoreError> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query_as::<_, TaskRecord>(
            r#"
            SELECT id, title, description, column_id, position,
                   version, title_version, description_version,
                   column_version, position_version, created_at, updated_at
            FROM tasks
            WHERE column_id = ?
            ORDER BY position
            "#,
        )
        .bind(column_id.as_str())
        .fetch_all(&mut *tx)
        .await?;

        let mut rebalanced = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            let updated = sqlx::query_as::<_, TaskRecord>(
                r#"
                UPDATE tasks SET
                    position = ?2,
                    version = version + 1,
                    position_version = version + 1,
                    updated_at = ?3
                WHERE id = ?1
                RETURNING id, title, description, column_id, position,
                          version, title_version, description_version,
                          column_version, position_version, created_at, updated_at
                "#,
            )
            .bind(&row.id)
            .bind(ordering::rebalanced_position(index))
            .bind(Utc::now())
            .fetch_one(&mut *tx)
            .await?;
            rebalanced.push(updated);
        }

        tx.commit().await?;
        Ok(rebalanced)
    }

    async fn task_count(&self) -> Result<i64, CoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// Read one row inside the transaction, erroring when it does not exist.
async fn read_task(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    task_id: &str,
) -> Result<TaskRecord, CoreError> {
    sqlx::query_as::<_, TaskRecord>(
        r#"
        SELECT id, title, description, column_id, position,
               version, title_version, description_version,
               column_version, position_version, created_at, updated_at
        FROM tasks
        WHERE id = ?
        "#,
    )
    .bind(task_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| CoreError::TaskNotFound {
        task_id: task_id.to_string(),
    })
}
