// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Message router: decodes frames, dispatches to services, and turns
//! service outcomes into targeted sends and fan-outs.
//!
//! Conflict routing policy:
//! - clean write: authoritative state to everyone;
//! - partial merge: `CONFLICT_RESOLVED` to the sender, then authoritative
//!   state to everyone (the sender's optimistic state is superseded);
//! - full rejection: `CONFLICT_RESOLVED` to the sender, authoritative state
//!   to everyone *except* the sender (who already holds it).
//!
//! Handler failures never tear down the session; they surface as `ERROR`
//! frames to the sender only.

use std::sync::Arc;

use tracing::{debug, error, instrument, warn};

use syncboard_protocol::{
    decode_client_message, decode_queued_operation, ClientMessage, ColumnId,
    ConflictResolvedPayload, CreateTaskPayload, DeleteTaskPayload, ErrorPayload, MoveTaskPayload,
    PresenceUpdatePayload, RebalancedPayload, ReplayQueuePayload, Resolution, ServerMessage, Task,
    TaskCreatedPayload, TaskDeletedPayload, UpdateTaskPayload,
};

use crate::broadcast::ConnectionRegistry;
use crate::conflict::ConflictAnalysis;
use crate::error::{CoreError, Result};
use crate::persistence::{NewTask, Persistence};
use crate::presence::{PresencePatch, PresenceRegistry};
use crate::snapshot;

/// Shared state handed to every handler.
///
/// Owned by the connection supervisor and injected here so the router can
/// be driven from tests without any live socket.
pub struct RouterState {
    /// Transactional task store.
    pub store: Arc<dyn Persistence>,
    /// Session registry used for sends and fan-outs.
    pub connections: Arc<ConnectionRegistry>,
    /// In-memory presence registry.
    pub presence: Arc<PresenceRegistry>,
}

impl RouterState {
    /// Bundle the three shared components.
    pub fn new(
        store: Arc<dyn Persistence>,
        connections: Arc<ConnectionRegistry>,
        presence: Arc<PresenceRegistry>,
    ) -> Self {
        Self {
            store,
            connections,
            presence,
        }
    }
}

/// Handle one raw inbound text frame from `client_id`.
///
/// Decode failures answer `INVALID_JSON` or `UNKNOWN_MESSAGE_TYPE`; any
/// error out of dispatch answers `NOT_FOUND` or `INTERNAL_ERROR`. All of
/// them go to the sender only and leave the session open.
#[instrument(skip(state, raw), fields(client_id = %client_id))]
pub async fn handle_frame(state: &RouterState, client_id: &str, raw: &str) {
    let msg = match decode_client_message(raw) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(code = e.code(), "rejected inbound frame: {e}");
            let payload = ErrorPayload {
                code: e.code().to_string(),
                message: e.to_string(),
                task_id: None,
            };
            send_error(state, client_id, payload).await;
            return;
        }
    };

    run_and_report(state, client_id, msg).await;
}

/// Dispatch an already-decoded message, reporting any failure to the sender
/// as an `ERROR` frame instead of propagating it.
async fn run_and_report(state: &RouterState, client_id: &str, msg: ClientMessage) {
    if let Err(e) = dispatch(state, client_id, msg).await {
        error!(client_id, code = e.error_code(), "handler failed: {e}");
        send_error(state, client_id, e.to_error_payload()).await;
    }
}

async fn send_error(state: &RouterState, client_id: &str, payload: ErrorPayload) {
    if let Err(e) = state
        .connections
        .send_to(client_id, &ServerMessage::Error(payload))
        .await
    {
        error!(client_id, "failed to send error frame: {e}");
    }
}

/// Route one client message to its handler.
pub async fn dispatch(state: &RouterState, client_id: &str, msg: ClientMessage) -> Result<()> {
    match msg {
        ClientMessage::SyncRequest(_) => {
            let snapshot = snapshot::initial_state(state.store.as_ref(), &state.presence).await?;
            state.connections.send_to(client_id, &snapshot).await
        }
        ClientMessage::CreateTask(payload) => handle_create(state, payload).await,
        ClientMessage::UpdateTask(payload) => handle_update(state, client_id, payload).await,
        ClientMessage::MoveTask(payload) => handle_move(state, client_id, payload).await,
        ClientMessage::DeleteTask(payload) => handle_delete(state, client_id, payload).await,
        ClientMessage::PresenceUpdate(payload) => handle_presence(state, client_id, payload).await,
        ClientMessage::ReplayQueue(payload) => handle_replay(state, client_id, payload).await,
    }
}

async fn handle_create(state: &RouterState, payload: CreateTaskPayload) -> Result<()> {
    let task = state
        .store
        .create_task(NewTask {
            title: payload.title,
            description: payload.description,
            column_id: payload.column_id,
            position: payload.position,
        })
        .await?;

    // Everyone gets the create, the sender included: the echoed tempId is
    // what lets the creator promote its optimistic placeholder.
    state
        .connections
        .broadcast_all(&ServerMessage::TaskCreated(TaskCreatedPayload {
            task: task.into_wire(),
            temp_id: payload.temp_id,
        }))
        .await
}

async fn handle_update(
    state: &RouterState,
    client_id: &str,
    payload: UpdateTaskPayload,
) -> Result<()> {
    let outcome = state
        .store
        .update_task(&payload.task_id, payload.base_version, payload.changes)
        .await?;
    route_write(
        state,
        client_id,
        MutationKind::Updated,
        outcome.task.into_wire(),
        outcome.conflict,
    )
    .await
}

async fn handle_move(state: &RouterState, client_id: &str, payload: MoveTaskPayload) -> Result<()> {
    let outcome = state
        .store
        .move_task(
            &payload.task_id,
            payload.base_version,
            payload.column_id,
            payload.position,
        )
        .await?;

    let needs_rebalance = outcome.needs_rebalance;
    let task = outcome.task.into_wire();
    let landed_column = ColumnId::parse(&task.column_id).ok_or_else(|| CoreError::InvalidColumn {
        value: task.column_id.clone(),
    })?;

    route_write(state, client_id, MutationKind::Moved, task, outcome.conflict).await?;

    if needs_rebalance {
        let tasks: Vec<Task> = state
            .store
            .rebalance_column(landed_column)
            .await?
            .into_iter()
            .map(|record| record.into_wire())
            .collect();
        debug!(column = %landed_column, count = tasks.len(), "column rebalanced");
        state
            .connections
            .broadcast_all(&ServerMessage::Rebalanced(RebalancedPayload {
                column_id: landed_column,
                tasks,
            }))
            .await?;
    }
    Ok(())
}

async fn handle_delete(
    state: &RouterState,
    client_id: &str,
    payload: DeleteTaskPayload,
) -> Result<()> {
    // Deletion always wins: baseVersion is accepted but not enforced, so a
    // delete never loops through conflict resolution.
    let deleted = state.store.delete_task(&payload.task_id).await?;
    if deleted {
        state
            .connections
            .broadcast_all(&ServerMessage::TaskDeleted(TaskDeletedPayload {
                task_id: payload.task_id,
            }))
            .await
    } else {
        let err = CoreError::TaskNotFound {
            task_id: payload.task_id,
        };
        state
            .connections
            .send_to(client_id, &ServerMessage::Error(err.to_error_payload()))
            .await
    }
}

async fn handle_presence(
    state: &RouterState,
    client_id: &str,
    payload: PresenceUpdatePayload,
) -> Result<()> {
    let patch = PresencePatch {
        username: payload.username,
        viewing_task: payload.viewing_task,
        editing_task: payload.editing_task,
    };
    if state.presence.update_user(client_id, patch).await.is_none() {
        debug!(client_id, "presence update for unknown client ignored");
        return Ok(());
    }
    let roster = state.presence.all_users().await;
    state
        .connections
        .broadcast_all(&ServerMessage::PresenceUpdate(roster))
        .await
}

async fn handle_replay(
    state: &RouterState,
    client_id: &str,
    payload: ReplayQueuePayload,
) -> Result<()> {
    debug!(
        client_id,
        count = payload.operations.len(),
        "replaying offline queue"
    );
    // Strictly sequential: each queued op completes (including its
    // broadcasts) before the next starts, preserving enqueue order. A bad
    // entry answers the sender and does not abort the rest of the queue.
    for op in payload.operations {
        match decode_queued_operation(&op) {
            Ok(msg) => Box::pin(run_and_report(state, client_id, msg)).await,
            Err(e) => {
                warn!(client_id, kind = %op.kind, "skipping bad queued operation: {e}");
                send_error(
                    state,
                    client_id,
                    ErrorPayload {
                        code: e.code().to_string(),
                        message: e.to_string(),
                        task_id: None,
                    },
                )
                .await;
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum MutationKind {
    Updated,
    Moved,
}

fn authoritative_message(kind: MutationKind, task: Task) -> ServerMessage {
    match kind {
        MutationKind::Updated => ServerMessage::TaskUpdated(task),
        MutationKind::Moved => ServerMessage::TaskMoved(task),
    }
}

fn conflict_resolved(
    resolution: Resolution,
    task: &Task,
    analysis: &ConflictAnalysis,
) -> ServerMessage {
    ServerMessage::ConflictResolved(ConflictResolvedPayload {
        task_id: task.id.clone(),
        resolution,
        task: task.clone(),
        merged_fields: analysis.merged_field_names(),
        rejected_fields: analysis.rejected_field_names(),
        reason: analysis.reason(),
    })
}

/// Apply the conflict routing policy for an update/move outcome.
async fn route_write(
    state: &RouterState,
    sender: &str,
    kind: MutationKind,
    task: Task,
    conflict: Option<ConflictAnalysis>,
) -> Result<()> {
    match conflict {
        None => {
            state
                .connections
                .broadcast_all(&authoritative_message(kind, task))
                .await
        }
        Some(analysis) if analysis.fully_rejected() => {
            state
                .connections
                .send_to(sender, &conflict_resolved(Resolution::Rejected, &task, &analysis))
                .await?;
            // Everyone else re-confirms the unchanged row; the sender was
            // just handed it inside CONFLICT_RESOLVED.
            state
                .connections
                .broadcast(&authoritative_message(kind, task), Some(sender))
                .await
        }
        Some(analysis) => {
            state
                .connections
                .send_to(sender, &conflict_resolved(Resolution::Merged, &task, &analysis))
                .await?;
            state
                .connections
                .broadcast_all(&authoritative_message(kind, task))
                .await
        }
    }
}
