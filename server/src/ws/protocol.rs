use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};

use crate::ws::UserId;

/// Events pushed to WebSocket clients, one JSON object per text frame.
///
/// The `type` field carries the discriminator:
/// `{"type":"presence_update","users":[1,2]}`,
/// `{"type":"task_created","task":{...}}`,
/// `{"type":"task_deleted","task_id":7}`.
///
/// Task payloads are taken as already-serialized JSON so the realtime layer
/// never depends on the task model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    PresenceUpdate { users: Vec<UserId> },
    TaskCreated { task: serde_json::Value },
    TaskUpdated { task: serde_json::Value },
    TaskDeleted { task_id: i64 },
}

impl Event {
    pub fn presence_update(users: Vec<UserId>) -> Self {
        Self::PresenceUpdate { users }
    }

    pub fn task_created<T: Serialize>(task: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::TaskCreated {
            task: serde_json::to_value(task)?,
        })
    }

    pub fn task_updated<T: Serialize>(task: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::TaskUpdated {
            task: serde_json::to_value(task)?,
        })
    }

    pub fn task_deleted(task_id: i64) -> Self {
        Self::TaskDeleted { task_id }
    }

    /// Wire name of the event, as it appears in the `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PresenceUpdate { .. } => "presence_update",
            Self::TaskCreated { .. } => "task_created",
            Self::TaskUpdated { .. } => "task_updated",
            Self::TaskDeleted { .. } => "task_deleted",
        }
    }

    /// Encode as a WebSocket text frame.
    pub fn to_message(&self) -> Result<Message, serde_json::Error> {
        let text = serde_json::to_string(self)?;
        Ok(Message::Text(text.into()))
    }
}
