// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Initial-state assembly for newly connected clients.

use syncboard_protocol::{InitialStatePayload, ServerMessage};

use crate::error::Result;
use crate::persistence::Persistence;
use crate::presence::PresenceRegistry;

/// Build the `INITIAL_STATE` snapshot: all tasks in board order plus the
/// current presence roster.
///
/// Deliberately not fenced against concurrent mutations: a `TASK_CREATED`
/// racing a new connection reaches the client either inside the snapshot or
/// as a follow-up broadcast (possibly both), and client stores upsert
/// idempotently.
pub async fn initial_state(
    store: &dyn Persistence,
    presence: &PresenceRegistry,
) -> Result<ServerMessage> {
    let tasks = store
        .get_all_tasks()
        .await?
        .into_iter()
        .map(|record| record.into_wire())
        .collect();
    let presence = presence.all_users().await;

    Ok(ServerMessage::InitialState(InitialStatePayload {
        tasks,
        presence,
    }))
}
