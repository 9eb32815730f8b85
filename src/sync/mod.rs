mod fanout;
mod log;
mod membership;
mod presence;
mod registry;
mod typing;
mod ws;

pub use fanout::Fanout;
pub use log::{MessageLog, MAX_PAGE_SIZE};
pub use membership::Membership;
pub use presence::PresenceTracker;
pub use registry::SessionRegistry;
pub use typing::TypingBroadcaster;

use axum::{routing::get, Router};
use sqlx::SqlitePool;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::db::{Conversation, Message};
use crate::error::{AppError, AppResult};
use crate::event::Event;
use crate::store;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws::chat_ws))
}

/// The real-time conversation synchronization engine: tracks live sessions,
/// orders and persists messages, relays typing and presence, and fans
/// events out to the sessions they concern.
#[derive(Clone)]
pub struct SyncEngine {
    pool: SqlitePool,
    pub registry: SessionRegistry,
    pub log: MessageLog,
    pub membership: Membership,
    pub typing: TypingBroadcaster,
    fanout: Fanout,
    presence: PresenceTracker,
}

impl SyncEngine {
    pub fn new(pool: SqlitePool) -> Self {
        let registry = SessionRegistry::new();
        let fanout = Fanout::new(registry.clone());
        let membership = Membership::new(pool.clone());

        Self {
            registry: registry.clone(),
            log: MessageLog::new(pool.clone()),
            typing: TypingBroadcaster::new(membership.clone(), fanout.clone()),
            presence: PresenceTracker::new(fanout.clone()),
            membership,
            fanout,
            pool,
        }
    }

    /// Registers a live connection and announces the online edge, if any.
    /// Returns the connection id the transport must hand back on disconnect.
    pub fn connect(&self, user_id: i64, tx: UnboundedSender<Event>) -> Uuid {
        let (connection_id, became_online) = self.registry.connect(user_id, tx);
        self.presence.session_opened(user_id, became_online);
        connection_id
    }

    /// Idempotent. Announces the offline edge when the last session drops.
    pub fn disconnect(&self, connection_id: Uuid) {
        if let Some((user_id, became_offline)) = self.registry.disconnect(connection_id) {
            self.presence.session_closed(user_id, became_offline);
        }
    }

    /// Validates, persists, and fans the message out to every member's live
    /// sessions (the sender's other devices included). Returns once the
    /// message is durably stored; delivery is enqueue-only and never awaited.
    pub async fn send_message(
        &self,
        sender_id: i64,
        conversation_id: i64,
        content: &str,
    ) -> AppResult<Message> {
        let member_ids = store::member_ids(&self.pool, conversation_id).await?;
        if !member_ids.contains(&sender_id) {
            return Err(AppError::NotAMember(conversation_id));
        }

        self.log
            .append(conversation_id, sender_id, content, |msg| {
                self.fanout.message(&member_ids, &Event::from(msg));
            })
            .await
    }

    pub async fn notify_typing(
        &self,
        user_id: i64,
        conversation_id: i64,
        is_typing: bool,
    ) -> AppResult<()> {
        self.typing.notify(user_id, conversation_id, is_typing).await
    }

    pub async fn create_conversation(
        &self,
        creator_id: i64,
        name: &str,
        candidate_member_ids: &[i64],
    ) -> AppResult<Conversation> {
        self.membership
            .create_conversation(creator_id, name, candidate_member_ids)
            .await
    }

    /// Membership-gated page of a conversation's history.
    pub async fn history(
        &self,
        user_id: i64,
        conversation_id: i64,
        skip: i64,
        take: i64,
    ) -> AppResult<Vec<Message>> {
        self.membership.ensure_member(user_id, conversation_id).await?;
        self.log.history(conversation_id, skip, take).await
    }
}
