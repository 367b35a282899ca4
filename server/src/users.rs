//! Accounts known to this server.
//!
//! Users live in memory for the lifetime of the process. Guest login is the
//! way in: it creates a user with a generated display name and hands back an
//! access token. The credential resolver refuses tokens whose subject is not
//! in the directory.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

use crate::auth::jwt;
use crate::auth::middleware::CurrentUser;
use crate::state::AppState;
use crate::ws::UserId;

const ADJECTIVES: &[&str] = &[
    "Swift", "Lazy", "Happy", "Clever", "Brave", "Calm", "Bold", "Bright", "Cheerful", "Daring",
    "Eager", "Fancy", "Gentle", "Jolly", "Kind", "Lively", "Merry", "Noble", "Proud", "Quick",
    "Rapid", "Silent", "Sneaky", "Steady", "Strong", "Witty", "Wise", "Zealous", "Agile",
    "Bouncy", "Curious", "Dizzy",
];

const ANIMALS: &[&str] = &[
    "Alligator", "Penguin", "Dolphin", "Tiger", "Eagle", "Fox", "Bear", "Wolf", "Otter", "Panda",
    "Koala", "Leopard", "Cheetah", "Falcon", "Hawk", "Owl", "Rabbit", "Squirrel", "Badger",
    "Raccoon", "Beaver", "Moose", "Elk", "Deer", "Bison", "Buffalo", "Jaguar", "Lynx", "Cougar",
    "Panther", "Lion", "Zebra",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub is_guest: bool,
    pub created_at: DateTime<Utc>,
}

/// A display name like "Lazy Alligator".
pub fn generate_guest_name() -> String {
    let mut rng = rand::rng();
    let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("Anonymous");
    let animal = ANIMALS.choose(&mut rng).copied().unwrap_or("Guest");
    format!("{} {}", adjective, animal)
}

/// User records keyed by id. Ids start at 1 and are never reused.
#[derive(Debug)]
pub struct UserDirectory {
    users: DashMap<UserId, User>,
    next_id: AtomicI64,
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl UserDirectory {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn create_guest(&self) -> User {
        let id = UserId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let user = User {
            id,
            email: format!("guest_{}@guest.local", id),
            full_name: Some(generate_guest_name()),
            is_active: true,
            is_guest: true,
            created_at: Utc::now(),
        };
        self.users.insert(id, user.clone());
        user
    }

    pub fn get(&self, id: UserId) -> Option<User> {
        self.users.get(&id).map(|entry| entry.value().clone())
    }

    /// Whether `id` names an active account.
    pub fn is_active(&self, id: UserId) -> bool {
        self.users.get(&id).is_some_and(|entry| entry.is_active)
    }

    /// Active users, ascending by id.
    pub fn list_active(&self) -> Vec<User> {
        let mut users: Vec<User> = self
            .users
            .iter()
            .filter(|entry| entry.is_active)
            .map(|entry| entry.value().clone())
            .collect();
        users.sort_by_key(|user| user.id);
        users
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

// --- REST endpoint handlers ---

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// POST /api/v1/auth/guest: Create a guest account and return its access token.
pub async fn login_as_guest(
    State(state): State<AppState>,
) -> Result<Json<TokenResponse>, StatusCode> {
    let user = state.users.create_guest();
    let access_token = jwt::issue_access_token(&state.jwt_secret, user.id, state.token_ttl_minutes)
        .map_err(|e| {
            tracing::error!(user_id = %user.id, error = %e, "Failed to issue guest token");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    tracing::info!(
        user_id = %user.id,
        name = user.full_name.as_deref().unwrap_or_default(),
        "Guest user created"
    );
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

/// GET /api/v1/auth/me: The caller's own record. JWT auth required.
pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

/// GET /api/v1/auth/users: Every active user, for task assignment. JWT auth required.
pub async fn list_users(
    State(state): State<AppState>,
    _caller: CurrentUser,
) -> Json<Vec<User>> {
    Json(state.users.list_active())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guests_get_sequential_ids_and_unique_emails() {
        let users = UserDirectory::new();
        let first = users.create_guest();
        let second = users.create_guest();

        assert_eq!(first.id, UserId(1));
        assert_eq!(second.id, UserId(2));
        assert_ne!(first.email, second.email);
        assert!(first.is_guest && first.is_active);
        assert_eq!(users.len(), 2);
    }

    #[test]
    fn test_guest_name_is_adjective_and_animal() {
        let name = generate_guest_name();
        let (adjective, animal) = name.split_once(' ').unwrap();
        assert!(ADJECTIVES.contains(&adjective));
        assert!(ANIMALS.contains(&animal));
    }

    #[test]
    fn test_lookup_of_unknown_id() {
        let users = UserDirectory::new();
        let guest = users.create_guest();

        assert_eq!(users.get(guest.id), Some(guest.clone()));
        assert!(users.is_active(guest.id));
        assert!(users.get(UserId(99)).is_none());
        assert!(!users.is_active(UserId(99)));
    }

    #[test]
    fn test_list_active_is_sorted() {
        let users = UserDirectory::new();
        for _ in 0..5 {
            users.create_guest();
        }

        let ids: Vec<i64> = users.list_active().iter().map(|u| u.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }
}
