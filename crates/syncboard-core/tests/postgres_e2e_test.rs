// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Postgres-backed tests for the row-lock path. These run only when
//! `TEST_DATABASE_URL` points at a PostgreSQL database; otherwise they
//! skip, mirroring local-dev runs without a server.

use std::sync::Arc;

use sqlx::PgPool;

use syncboard_core::migrations;
use syncboard_core::persistence::{NewTask, Persistence, PostgresPersistence};
use syncboard_protocol::{ColumnId, UpdateChanges};

async fn store() -> Option<PostgresPersistence> {
    let database_url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = PgPool::connect(&database_url).await.ok()?;
    migrations::run_postgres(&pool).await.ok()?;
    Some(PostgresPersistence::new(pool))
}

fn new_task(column_id: ColumnId, position: Option<f64>) -> NewTask {
    NewTask {
        title: Some("pg-task".to_string()),
        description: None,
        column_id,
        position,
    }
}

#[tokio::test]
async fn test_disjoint_writers_merge_on_postgres() {
    let Some(store) = store().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping Postgres E2E test");
        return;
    };

    let task = store
        .create_task(new_task(ColumnId::Todo, Some(65536.0)))
        .await
        .unwrap();

    let moved = store
        .move_task(&task.id, 1, ColumnId::Inprogress, 65536.0)
        .await
        .unwrap();
    assert!(moved.conflict.is_none());

    let edited = store
        .update_task(
            &task.id,
            1,
            UpdateChanges {
                title: Some("B".to_string()),
                description: None,
            },
        )
        .await
        .unwrap();
    assert!(edited.conflict.is_none());
    assert_eq!(edited.task.version, 3);
    assert_eq!(edited.task.title_version, 3);
    assert_eq!(edited.task.column_version, 2);
    assert_eq!(edited.task.column_id, "inprogress");

    // updated_at is advanced by the row trigger.
    assert!(edited.task.updated_at > edited.task.created_at);

    store.delete_task(&task.id).await.unwrap();
}

#[tokio::test]
async fn test_concurrent_same_field_writers_serialize_under_the_row_lock() {
    let Some(store) = store().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping Postgres E2E test");
        return;
    };
    let store = Arc::new(store);

    let task = store
        .create_task(new_task(ColumnId::Todo, None))
        .await
        .unwrap();

    // Two sessions race to retitle against the same base. FOR UPDATE makes
    // the loser observe the winner's committed stamp.
    let a = {
        let store = store.clone();
        let id = task.id.clone();
        tokio::spawn(async move {
            store
                .update_task(
                    &id,
                    1,
                    UpdateChanges {
                        title: Some("A".to_string()),
                        description: None,
                    },
                )
                .await
                .unwrap()
        })
    };
    let b = {
        let store = store.clone();
        let id = task.id.clone();
        tokio::spawn(async move {
            store
                .update_task(
                    &id,
                    1,
                    UpdateChanges {
                        title: Some("B".to_string()),
                        description: None,
                    },
                )
                .await
                .unwrap()
        })
    };

    let (a, b) = (a.await.unwrap(), b.await.unwrap());
    let rejections = [&a, &b]
        .iter()
        .filter(|o| {
            o.conflict
                .as_ref()
                .map(|c| c.fully_rejected())
                .unwrap_or(false)
        })
        .count();
    assert_eq!(rejections, 1, "exactly one writer loses");

    let current = store.get_task(&task.id).await.unwrap().unwrap();
    assert_eq!(current.version, 2, "only the winner wrote");
    assert_eq!(current.title_version, 2);

    store.delete_task(&task.id).await.unwrap();
}

#[tokio::test]
async fn test_rebalance_is_atomic_on_postgres() {
    let Some(store) = store().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping Postgres E2E test");
        return;
    };

    // Use the done column to stay clear of other tests' rows.
    let mut ids = Vec::new();
    for position in [2.0, 2.3, 2.6] {
        let task = store
            .create_task(new_task(ColumnId::Done, Some(position)))
            .await
            .unwrap();
        ids.push(task.id);
    }

    let rebalanced = store.rebalance_column(ColumnId::Done).await.unwrap();
    let ours: Vec<_> = rebalanced
        .iter()
        .filter(|t| ids.contains(&t.id))
        .collect();
    assert_eq!(ours.len(), 3);
    for task in &ours {
        assert_eq!(task.position % 65536.0, 0.0);
        assert_eq!(task.position_version, task.version);
    }

    for id in &ids {
        store.delete_task(id).await.unwrap();
    }
}
