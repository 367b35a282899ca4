//! Presence derived from the connection registry.
//!
//! Nothing is stored here: a user is online exactly while the registry holds
//! at least one channel for them, and "connected since" is the registry's
//! first-connection timestamp.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::middleware::CurrentUser;
use crate::state::AppState;
use crate::ws::{ConnectionRegistry, UserId};

/// Presence of one user at the moment of the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceSnapshot {
    pub user_id: UserId,
    pub is_online: bool,
    /// RFC 3339, only present while online
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<String>,
}

pub struct PresenceTracker<'a> {
    registry: &'a ConnectionRegistry,
}

impl<'a> PresenceTracker<'a> {
    pub fn new(registry: &'a ConnectionRegistry) -> Self {
        Self { registry }
    }

    pub fn snapshot(&self, user_id: UserId) -> PresenceSnapshot {
        let connected_at = self.registry.connected_at(user_id);
        PresenceSnapshot {
            user_id,
            is_online: connected_at.is_some(),
            connected_at: connected_at.map(|ts| ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        }
    }

    pub fn online_ids(&self) -> Vec<UserId> {
        self.registry.online_user_ids()
    }
}

impl<'a> From<&'a Arc<ConnectionRegistry>> for PresenceTracker<'a> {
    fn from(registry: &'a Arc<ConnectionRegistry>) -> Self {
        Self::new(registry)
    }
}

// --- REST endpoint handlers ---

#[derive(Debug, Serialize, Deserialize)]
pub struct OnlineUsersResponse {
    pub users: Vec<UserId>,
}

/// GET /api/v1/presence: Currently online user ids. JWT auth required.
pub async fn get_presence(
    State(state): State<AppState>,
    _caller: CurrentUser,
) -> Json<OnlineUsersResponse> {
    let tracker = PresenceTracker::from(&state.connections);
    Json(OnlineUsersResponse {
        users: tracker.online_ids(),
    })
}

/// GET /api/v1/presence/{user_id}: Presence snapshot for one user. JWT auth required.
pub async fn get_user_presence(
    State(state): State<AppState>,
    _caller: CurrentUser,
    Path(user_id): Path<i64>,
) -> Json<PresenceSnapshot> {
    let tracker = PresenceTracker::from(&state.connections);
    Json(tracker.snapshot(UserId(user_id)))
}
