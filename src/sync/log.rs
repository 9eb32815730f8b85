use std::sync::Arc;

use dashmap::DashMap;
use sqlx::SqlitePool;
use tokio::sync::Mutex;

use crate::db::{self, Message};
use crate::error::{AppError, AppResult};
use crate::store;

pub const MAX_PAGE_SIZE: i64 = 100;

/// Append-only, time-ordered message history. Appends to one conversation
/// are serialized by a per-conversation clock mutex; appends to different
/// conversations never contend.
#[derive(Clone)]
pub struct MessageLog {
    pool: SqlitePool,
    clocks: Arc<DashMap<i64, Arc<Mutex<i64>>>>,
}

impl MessageLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            clocks: Arc::new(DashMap::new()),
        }
    }

    fn clock(&self, conversation_id: i64) -> Arc<Mutex<i64>> {
        self.clocks.entry(conversation_id).or_default().clone()
    }

    /// Assigns `sent_at` from a monotonic per-conversation clock (ties are
    /// broken by the autoincrement id), persists, and invokes `notify` with
    /// the stored record before releasing the ordering lock, so whatever
    /// `notify` enqueues is enqueued in insertion order. The hook must not
    /// block; the fan-out path only pushes onto unbounded channels.
    pub async fn append(
        &self,
        conversation_id: i64,
        sender_id: i64,
        content: &str,
        notify: impl FnOnce(&Message),
    ) -> AppResult<Message> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::EmptyMessage);
        }

        let clock = self.clock(conversation_id);
        let mut last_sent_at = clock.lock().await;

        let sent_at = db::now_millis().max(*last_sent_at);
        let msg =
            store::append_message(&self.pool, conversation_id, sender_id, content, sent_at).await?;
        *last_sent_at = sent_at;

        tracing::debug!(conversation_id, sender_id, message_id = msg.id, "message stored");
        notify(&msg);

        Ok(msg)
    }

    /// Ascending by `(sent_at, id)`. `skip` and `take` are clamped to
    /// non-negative, `take` capped at [`MAX_PAGE_SIZE`].
    pub async fn history(
        &self,
        conversation_id: i64,
        skip: i64,
        take: i64,
    ) -> AppResult<Vec<Message>> {
        let skip = skip.max(0);
        let take = take.clamp(0, MAX_PAGE_SIZE);

        Ok(store::query_messages(&self.pool, conversation_id, skip, take).await?)
    }

    /// Most recent message by the same order, for conversation-list previews.
    pub async fn last_message(&self, conversation_id: i64) -> AppResult<Option<Message>> {
        Ok(store::last_message(&self.pool, conversation_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded_log() -> (SqlitePool, MessageLog) {
        let pool = db::connect_in_memory().await.unwrap();
        for name in ["ada", "bob"] {
            store::insert_user(&pool, name).await.unwrap();
        }
        store::insert_conversation_atomic(&pool, "", &[1, 2], 0)
            .await
            .unwrap();
        (pool.clone(), MessageLog::new(pool))
    }

    #[tokio::test]
    async fn sent_at_never_decreases_within_a_conversation() {
        let (_pool, log) = seeded_log().await;

        for i in 0..20 {
            log.append(1, 1, &format!("m{i}"), |_| {}).await.unwrap();
        }

        let msgs = log.history(1, 0, 100).await.unwrap();
        assert_eq!(msgs.len(), 20);
        for pair in msgs.windows(2) {
            assert!(pair[0].sent_at <= pair[1].sent_at);
            assert!(pair[0].id < pair[1].id);
        }
    }

    #[tokio::test]
    async fn empty_content_is_rejected_before_storage() {
        let (_pool, log) = seeded_log().await;

        let err = log.append(1, 1, "   ", |_| {}).await.unwrap_err();
        assert!(matches!(err, AppError::EmptyMessage));
        assert!(log.history(1, 0, 100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn history_paging_is_clamped() {
        let (_pool, log) = seeded_log().await;

        for i in 0..3 {
            log.append(1, 1, &format!("m{i}"), |_| {}).await.unwrap();
        }

        let page = log.history(1, -5, -1).await.unwrap();
        assert!(page.is_empty(), "negative take clamps to zero");

        let page = log.history(1, 1, 500).await.unwrap();
        assert_eq!(page.len(), 2, "negative skip clamps to zero, take capped");
        assert_eq!(page[0].content, "m1");
    }

    #[tokio::test]
    async fn last_message_tracks_the_newest_append() {
        let (_pool, log) = seeded_log().await;

        assert!(log.last_message(1).await.unwrap().is_none());

        log.append(1, 1, "first", |_| {}).await.unwrap();
        log.append(1, 2, "second", |_| {}).await.unwrap();

        let last = log.last_message(1).await.unwrap().unwrap();
        assert_eq!(last.content, "second");
        assert_eq!(last.sender_id, 2);
    }
}
