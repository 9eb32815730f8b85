use crate::event::Event;

use super::fanout::Fanout;

/// Turns session-registry edges into presence events. State is purely
/// derived from the registry, so a restart resets everyone to offline until
/// sessions reconnect. Delivery is best-effort; a missed event self-heals
/// on the next edge or on a conversation-list reload.
#[derive(Clone)]
pub struct PresenceTracker {
    fanout: Fanout,
}

impl PresenceTracker {
    pub fn new(fanout: Fanout) -> Self {
        Self { fanout }
    }

    pub fn session_opened(&self, user_id: i64, became_online: bool) {
        if became_online {
            tracing::info!(user_id, "user online");
            self.fanout.presence(
                user_id,
                &Event::Presence {
                    user_id,
                    is_online: true,
                },
            );
        }
    }

    pub fn session_closed(&self, user_id: i64, became_offline: bool) {
        if became_offline {
            tracing::info!(user_id, "user offline");
            self.fanout.presence(
                user_id,
                &Event::Presence {
                    user_id,
                    is_online: false,
                },
            );
        }
    }
}
