use crate::event::Event;

use super::registry::SessionRegistry;

/// Distributes one logical event to the live sessions it concerns. Every
/// delivery is an independent enqueue onto the session's outbound channel;
/// the per-connection forward task drains it to the socket, so a slow or
/// dead connection never blocks the others. Failures are logged and
/// skipped, never retried.
#[derive(Clone)]
pub struct Fanout {
    registry: SessionRegistry,
}

impl Fanout {
    pub fn new(registry: SessionRegistry) -> Self {
        Self { registry }
    }

    /// Messages reach every session of every member, the sender's other
    /// devices included.
    pub fn message(&self, member_ids: &[i64], event: &Event) {
        for &user_id in member_ids {
            self.push_all(user_id, event);
        }
    }

    /// Transient signals reach the members' sessions minus the actor's own.
    pub fn signal(&self, member_ids: &[i64], actor_id: i64, event: &Event) {
        for &user_id in member_ids {
            if user_id != actor_id {
                self.push_all(user_id, event);
            }
        }
    }

    /// Presence changes reach every live session except the actor's own.
    pub fn presence(&self, actor_id: i64, event: &Event) {
        for (connection_id, tx) in self.registry.senders_except(actor_id) {
            if tx.send(event.clone()).is_err() {
                tracing::debug!(%connection_id, "dropping event for dead connection");
            }
        }
    }

    fn push_all(&self, user_id: i64, event: &Event) {
        for (connection_id, tx) in self.registry.senders_for(user_id) {
            if tx.send(event.clone()).is_err() {
                tracing::debug!(user_id, %connection_id, "dropping event for dead connection");
            }
        }
    }
}
