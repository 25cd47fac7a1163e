// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory presence registry.
//!
//! Tracks who is connected and what they are viewing or editing. Entries
//! live exactly as long as the owning WebSocket session; nothing here is
//! persisted or replicated.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use syncboard_protocol::PresenceUser;

/// Cursor colors handed out round-robin at connection time. Two users
/// beyond the eighth share a color; no uniqueness is promised.
const PALETTE: [&str; 8] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#FFA07A", "#98D8C8", "#F7DC6F", "#BB8FCE", "#85C1E9",
];

/// A partial presence update from a client.
#[derive(Debug, Clone, Default)]
pub struct PresencePatch {
    /// New display name; `None` keeps the current one.
    pub username: Option<String>,
    /// Task the user is viewing; this is the full current state, so `None`
    /// clears it.
    pub viewing_task: Option<String>,
    /// Task the user is editing; `None` clears it.
    pub editing_task: Option<String>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<String, PresenceUser>,
    color_cursor: usize,
}

/// Registry of connected users, keyed by client id.
#[derive(Default)]
pub struct PresenceRegistry {
    inner: RwLock<Inner>,
}

impl PresenceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new user, assigning the next palette color.
    ///
    /// Re-registering an existing client id replaces the entry but still
    /// advances the color cursor.
    pub async fn add_user(&self, client_id: &str, username: &str) -> PresenceUser {
        let mut inner = self.inner.write().await;
        let color = PALETTE[inner.color_cursor % PALETTE.len()].to_string();
        inner.color_cursor += 1;

        let user = PresenceUser {
            client_id: client_id.to_string(),
            username: username.to_string(),
            color,
            viewing_task: None,
            editing_task: None,
            connected_at: Utc::now(),
        };
        inner.users.insert(client_id.to_string(), user.clone());
        user
    }

    /// Merge a patch into an existing entry.
    ///
    /// Returns the updated entry, or `None` for an unknown client id; an
    /// unknown id never creates an entry.
    pub async fn update_user(&self, client_id: &str, patch: PresencePatch) -> Option<PresenceUser> {
        let mut inner = self.inner.write().await;
        let user = inner.users.get_mut(client_id)?;
        if let Some(username) = patch.username {
            user.username = username;
        }
        user.viewing_task = patch.viewing_task;
        user.editing_task = patch.editing_task;
        Some(user.clone())
    }

    /// Remove an entry. Returns it when one existed.
    pub async fn remove_user(&self, client_id: &str) -> Option<PresenceUser> {
        self.inner.write().await.users.remove(client_id)
    }

    /// Stable snapshot of all users, ordered by connection time.
    pub async fn all_users(&self) -> Vec<PresenceUser> {
        let inner = self.inner.read().await;
        let mut users: Vec<PresenceUser> = inner.users.values().cloned().collect();
        users.sort_by(|a, b| {
            a.connected_at
                .cmp(&b.connected_at)
                .then_with(|| a.client_id.cmp(&b.client_id))
        });
        users
    }

    /// Number of connected users.
    pub async fn user_count(&self) -> usize {
        self.inner.read().await.users.len()
    }
}
