// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL-backed task store.
//!
//! Every mutation takes an exclusive row lock (`SELECT ... FOR UPDATE`)
//! before conflict analysis, so concurrent writers to the same row always
//! see each other's committed state. `updated_at` is advanced by a
//! `BEFORE UPDATE` trigger installed by the migrations.

use sqlx::PgPool;
use syncboard_protocol::{ColumnId, UpdateChanges};
use uuid::Uuid;

use crate::conflict::{self, ChangeSet};
use crate::error::CoreError;
use crate::ordering;

use super::{
    clamp_changes, normalize_description, normalize_title, MoveOutcome, NewTask, Persistence,
    TaskRecord, WriteOutcome,
};

/// PostgreSQL-backed persistence implementation.
#[derive(Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Create a new Postgres-backed persistence implementation.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl Persistence for PostgresPersistence {
    async fn create_task(&self, new: NewTask) -> Result<TaskRecord, CoreError> {
        let mut tx = self.pool.begin().await?;

        let position = match new.position {
            Some(p) if p > 0.0 => p,
            _ => {
                let existing: Vec<f64> =
                    sqlx::query_scalar("SELECT position FROM tasks WHERE column_id = $1")
                        .bind(new.column_id.as_str())
                        .fetch_all(&mut *tx)
                        .await?;
                ordering::position_at_end(&existing)
            }
        };

        let record = sqlx::query_as::<_, TaskRecord>(
            r#"
            INSERT INTO tasks (id, title, description, column_id, position)
            VALUES ($1, $2, $3, $4, $5)
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
        let current = lock_task(&mut tx, task_id).await?;

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
                title = COALESCE($2, title),
                title_version = CASE WHEN $2 IS NOT NULL THEN $4 ELSE title_version END,
                description = COALESCE($3, description),
                description_version = CASE WHEN $3 IS NOT NULL THEN $4 ELSE description_version END,
                version = $4
            WHERE id = $1
            RETURNING id, title, description, column_id, position,
                      version, title_version, description_version,
                      column_version, position_version, created_at, updated_at
            "#,
        )
        .bind(task_id)
        .bind(&analysis.merged.title)
        .bind(&analysis.merged.description)
        .bind(new_version)
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
        let current = lock_task(&mut tx, task_id).await?;

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
                column_id = COALESCE($2, column_id),
                column_version = CASE WHEN $2 IS NOT NULL THEN $4 ELSE column_version END,
                position = COALESCE($3, position),
                position_version = CASE WHEN $3 IS NOT NULL THEN $4 ELSE position_version END,
                version = $4
            WHERE id = $1
            RETURNING id, title, description, column_id, position,
                      version, title_version, description_version,
                      column_version, position_version, created_at, updated_at
            "#,
        )
        .bind(task_id)
        .bind(analysis.merged.column_id.map(|c| c.as_str()))
        .bind(analysis.merged.position)
        .bind(new_version)
        .fetch_one(&mut *tx)
        .await?;

        // Up to two nearest same-column neighbours decide whether the gap
        // around the landing position is still usable.
        let neighbours: Vec<f64> = sqlx::query_scalar(
            r#"
            SELECT position FROM tasks
            WHERE column_id = $1 AND id <> $2
            ORDER BY ABS(position - $3)
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
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
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
            WHERE id = $1
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

        // Lock the whole column in position order; positions may collide
        // transiently while the loop below rewrites them.
        let rows = sqlx::query_as::<_, TaskRecord>(
            r#"
            SELECT id, title, description, column_id, position,
                   version, title_version, description_version,
                   column_version, position_version, created_at, updated_at
            FROM tasks
            WHERE column_id = $1
            ORDER BY position
            FOR UPDATE
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
                    position = $2,
                    version = version + 1,
                    position_version = version + 1
                WHERE id = $1
                RETURNING id, title, description, column_id, position,
                          version, title_version, description_version,
                          column_version, position_version, created_at, updated_at
                "#,
            )
            .bind(&row.id)
            .bind(ordering::rebalanced_position(index))
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

/// Lock and read one row, erroring when it does not exist.
async fn lock_task(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    task_id: &str,
) -> Result<TaskRecord, CoreError> {
    sqlx::query_as::<_, TaskRecord>(
        r#"
        SELECT id, title, description, column_id, position,
               version, title_version, description_version,
               column_version, position_version, created_at, updated_at
        FROM tasks
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(task_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| CoreError::TaskNotFound {
        task_id: task_id.to_string(),
    })
}
