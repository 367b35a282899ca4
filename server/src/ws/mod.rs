pub mod actor;
pub mod broadcast;
pub mod handler;
pub mod protocol;
pub mod registry;

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

pub use broadcast::{DeliveryReport, Dispatcher};
pub use protocol::Event;
pub use registry::ConnectionRegistry;

/// Type alias for the sender half of a WebSocket connection's channel.
/// Other parts of the system can clone this to push messages to a specific client.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;

/// Stable identifier of an authenticated user. Serialized as a bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one registered channel, so a single session can be removed
/// without touching the user's other sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
