//! In-memory task records.
//!
//! Tasks are kept in a DashMap keyed by id, the same way the server keeps
//! other short-lived shared state. Every mutation goes through [`TaskStore`];
//! the HTTP handlers in [`crud`] publish the matching realtime event after a
//! mutation succeeds.

pub mod crud;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

use crate::ws::UserId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub owner_id: UserId,
    pub assigned_to_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Fields accepted when creating a task.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub assigned_to_id: Option<UserId>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

/// Partial update; absent fields are left untouched.
///
/// Nullable fields use `Option<Option<T>>`: `None` when the key is absent,
/// `Some(None)` when it was sent as `null` and should be cleared.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskChanges {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    #[serde(default, deserialize_with = "present")]
    pub assigned_to_id: Option<Option<UserId>>,
    #[serde(default, deserialize_with = "present")]
    pub due_date: Option<Option<DateTime<Utc>>>,
}

/// Only called for keys that are present, so `null` becomes `Some(None)`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub const MAX_TITLE_LEN: usize = 200;

/// Titles must be 1..=200 characters.
pub fn valid_title(title: &str) -> bool {
    let len = title.chars().count();
    (1..=MAX_TITLE_LEN).contains(&len)
}

/// Task records keyed by id. Ids start at 1 and are never reused.
#[derive(Debug)]
pub struct TaskStore {
    tasks: DashMap<i64, Task>,
    next_id: AtomicI64,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStore {
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn create(&self, owner: UserId, new: NewTask) -> Task {
        let now = Utc::now();
        let task = Task {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            title: new.title,
            description: new.description,
            status: new.status,
            priority: new.priority,
            owner_id: owner,
            assigned_to_id: new.assigned_to_id,
            created_at: now,
            updated_at: now,
            due_date: new.due_date,
        };
        self.tasks.insert(task.id, task.clone());
        task
    }

    /// Tasks owned by `owner`, ascending by id.
    pub fn list_for_owner(&self, owner: UserId) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .iter()
            .filter(|entry| entry.value().owner_id == owner)
            .map(|entry| entry.value().clone())
            .collect();
        tasks.sort_by_key(|task| task.id);
        tasks
    }

    /// A task visible to `owner`; tasks owned by someone else are reported as absent.
    pub fn get(&self, id: i64, owner: UserId) -> Option<Task> {
        self.tasks
            .get(&id)
            .filter(|entry| entry.value().owner_id == owner)
            .map(|entry| entry.value().clone())
    }

    pub fn update(&self, id: i64, owner: UserId, changes: TaskChanges) -> Option<Task> {
        let mut entry = self.tasks.get_mut(&id)?;
        if entry.owner_id != owner {
            return None;
        }

        let task = entry.value_mut();
        if let Some(title) = changes.title {
            task.title = title;
        }
        if let Some(description) = changes.description {
            task.description = description;
        }
        if let Some(status) = changes.status {
            task.status = status;
        }
        if let Some(priority) = changes.priority {
            task.priority = priority;
        }
        if let Some(assignee) = changes.assigned_to_id {
            task.assigned_to_id = assignee;
        }
        if let Some(due_date) = changes.due_date {
            task.due_date = due_date;
        }
        task.updated_at = Utc::now();
        Some(task.clone())
    }

    /// Returns `false` when the task does not exist or belongs to someone else.
    pub fn delete(&self, id: i64, owner: UserId) -> bool {
        self.tasks
            .remove_if(&id, |_, task| task.owner_id == owner)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
