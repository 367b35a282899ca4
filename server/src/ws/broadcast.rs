//! Best-effort fan-out of events to registered WebSocket channels.
//!
//! Channel handles are copied out of the registry under its lock and written
//! outside it. Presence snapshots are the exception: they are queued while the
//! lock is held, which is cheap because every queue is unbounded. A failed write on one channel is logged and counted; it never
//! stops delivery to the remaining channels and is never returned as an error.

use axum::extract::ws::Message;
use std::sync::Arc;

use super::registry::{ConnectionRegistry, Recipient};
use super::{ConnectionId, ConnectionSender, Event, UserId};

/// Per-dispatch delivery outcome, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

impl DeliveryReport {
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed
    }

    fn merge(&mut self, other: DeliveryReport) {
        self.delivered += other.delivered;
        self.failed += other.failed;
    }
}

/// Sends events to one user's channels or to every channel in the registry.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Send an event to all channels of one user. No-op when the user is offline.
    pub fn send_to_user(&self, user_id: UserId, event: &Event) -> DeliveryReport {
        let Some(msg) = encode(event) else {
            return DeliveryReport::default();
        };
        let report = deliver(&self.registry.recipients_for(user_id), &msg);
        tracing::debug!(
            user_id = %user_id,
            event = event.kind(),
            delivered = report.delivered,
            failed = report.failed,
            "Sent event to user"
        );
        report
    }

    /// Send an event to every registered channel.
    pub fn broadcast(&self, event: &Event) -> DeliveryReport {
        let Some(msg) = encode(event) else {
            return DeliveryReport::default();
        };
        let report = deliver(&self.registry.all_recipients(), &msg);
        tracing::debug!(
            event = event.kind(),
            delivered = report.delivered,
            failed = report.failed,
            "Broadcast event"
        );
        report
    }

    /// Broadcast the current set of online users.
    ///
    /// The snapshot is taken and queued on every channel under one registry
    /// lock, so concurrent joins and leaves can never leave a channel with a
    /// stale snapshot as its latest presence message.
    pub fn broadcast_presence_update(&self) -> DeliveryReport {
        let report = self
            .registry
            .with_presence(|online, recipients| presence_fan_out(online, recipients));
        tracing::debug!(
            delivered = report.delivered,
            failed = report.failed,
            "Broadcast presence"
        );
        report
    }

    /// Register a new channel and announce presence.
    ///
    /// The snapshot is queued on every channel, the new one included, before
    /// the registry lock is released, so it is always the first message the
    /// new channel sees.
    pub fn connect(&self, user_id: UserId, sender: ConnectionSender) -> ConnectionId {
        let mut report = DeliveryReport::default();
        let connection_id = self.registry.register_with(user_id, sender, |online, recipients| {
            report = presence_fan_out(online, recipients);
        });

        tracing::debug!(
            user_id = %user_id,
            connection_id = %connection_id,
            delivered = report.delivered,
            failed = report.failed,
            "Presence broadcast after connect"
        );
        connection_id
    }

    /// Remove one channel and re-announce presence to whoever is left.
    pub fn disconnect(&self, user_id: UserId, connection_id: ConnectionId) -> DeliveryReport {
        self.registry.unregister_connection(user_id, connection_id);
        self.broadcast_presence_update()
    }
}

fn encode(event: &Event) -> Option<Message> {
    match event.to_message() {
        Ok(msg) => Some(msg),
        Err(e) => {
            tracing::error!(event = event.kind(), error = %e, "Failed to encode event");
            None
        }
    }
}

fn presence_fan_out(online: &[UserId], recipients: &[Recipient]) -> DeliveryReport {
    match encode(&Event::presence_update(online.to_vec())) {
        Some(msg) => deliver(recipients, &msg),
        None => DeliveryReport::default(),
    }
}

fn deliver(recipients: &[Recipient], msg: &Message) -> DeliveryReport {
    let mut report = DeliveryReport::default();
    for recipient in recipients {
        report.merge(send_one(
            recipient.user_id,
            recipient.connection_id,
            &recipient.sender,
            msg.clone(),
        ));
    }
    report
}

fn send_one(
    user_id: UserId,
    connection_id: ConnectionId,
    sender: &ConnectionSender,
    msg: Message,
) -> DeliveryReport {
    match sender.send(msg) {
        Ok(()) => DeliveryReport {
            delivered: 1,
            failed: 0,
        },
        Err(_) => {
            // Receiver dropped: the connection's writer task is gone
            tracing::warn!(
                user_id = %user_id,
                connection_id = %connection_id,
                "Dropping event for closed connection"
            );
            DeliveryReport {
                delivered: 0,
                failed: 1,
            }
        }
    }
}
