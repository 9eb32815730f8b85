use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::event::Event;

/// One live connection belonging to one user.
#[derive(Debug, Clone)]
pub struct Session {
    pub connection_id: Uuid,
    pub connected_at: DateTime<Utc>,
    tx: UnboundedSender<Event>,
}

/// In-memory index of live sessions, keyed by user id. Rebuilt from zero on
/// process start; a pure cache over the transport layer, never source of
/// truth.
///
/// Entry locks linearize transitions for one user's session set while
/// connects and disconnects for different users never contend.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    users: Arc<DashMap<i64, Vec<Session>>>,
    connections: Arc<DashMap<Uuid, i64>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection and returns its id plus the 0→1 online edge.
    pub fn connect(&self, user_id: i64, tx: UnboundedSender<Event>) -> (Uuid, bool) {
        let connection_id = Uuid::now_v7();

        let mut sessions = self.users.entry(user_id).or_default();
        sessions.push(Session {
            connection_id,
            connected_at: Utc::now(),
            tx,
        });
        let became_online = sessions.len() == 1;
        drop(sessions);

        self.connections.insert(connection_id, user_id);

        (connection_id, became_online)
    }

    /// Idempotent: an unknown connection id is a no-op, not an error, so
    /// duplicate or late disconnect notifications from the transport are
    /// harmless. Returns the owning user and the 1→0 offline edge.
    pub fn disconnect(&self, connection_id: Uuid) -> Option<(i64, bool)> {
        let (_, user_id) = self.connections.remove(&connection_id)?;

        let mut became_offline = false;
        if let Some(mut sessions) = self.users.get_mut(&user_id) {
            sessions.retain(|s| s.connection_id != connection_id);
            became_offline = sessions.is_empty();
        }
        if became_offline {
            // A concurrent connect may have raced the guard drop above.
            self.users.remove_if(&user_id, |_, sessions| sessions.is_empty());
        }

        Some((user_id, became_offline))
    }

    pub fn sessions_for(&self, user_id: i64) -> Vec<Uuid> {
        self.users
            .get(&user_id)
            .map(|sessions| sessions.iter().map(|s| s.connection_id).collect())
            .unwrap_or_default()
    }

    pub fn is_online(&self, user_id: i64) -> bool {
        self.users
            .get(&user_id)
            .is_some_and(|sessions| !sessions.is_empty())
    }

    /// Snapshot of a user's outbound channels for one fan-out pass.
    pub fn senders_for(&self, user_id: i64) -> Vec<(Uuid, UnboundedSender<Event>)> {
        self.users
            .get(&user_id)
            .map(|sessions| {
                sessions
                    .iter()
                    .map(|s| (s.connection_id, s.tx.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every live outbound channel except the given user's own sessions.
    pub fn senders_except(&self, user_id: i64) -> Vec<(Uuid, UnboundedSender<Event>)> {
        self.users
            .iter()
            .filter(|entry| *entry.key() != user_id)
            .flat_map(|entry| {
                entry
                    .value()
                    .iter()
                    .map(|s| (s.connection_id, s.tx.clone()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    #[test]
    fn first_connect_is_the_online_edge() {
        let registry = SessionRegistry::new();

        let (tx, _rx) = unbounded_channel();
        let (_, became_online) = registry.connect(7, tx);
        assert!(became_online);
        assert!(registry.is_online(7));

        let (tx, _rx) = unbounded_channel();
        let (_, became_online) = registry.connect(7, tx);
        assert!(!became_online, "second device is not an edge");
        assert_eq!(registry.sessions_for(7).len(), 2);
    }

    #[test]
    fn offline_only_after_last_session_drops() {
        let registry = SessionRegistry::new();

        let (tx, _rx) = unbounded_channel();
        let (first, _) = registry.connect(7, tx);
        let (tx, _rx) = unbounded_channel();
        let (second, _) = registry.connect(7, tx);

        let (user_id, became_offline) = registry.disconnect(first).unwrap();
        assert_eq!(user_id, 7);
        assert!(!became_offline);
        assert!(registry.is_online(7));

        let (_, became_offline) = registry.disconnect(second).unwrap();
        assert!(became_offline);
        assert!(!registry.is_online(7));
    }

    #[test]
    fn disconnect_is_idempotent() {
        let registry = SessionRegistry::new();

        let (tx, _rx) = unbounded_channel();
        let (connection_id, _) = registry.connect(7, tx);

        assert!(registry.disconnect(connection_id).is_some());
        assert!(registry.disconnect(connection_id).is_none());
        assert!(registry.disconnect(Uuid::now_v7()).is_none());
    }
}
