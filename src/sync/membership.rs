use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use sqlx::SqlitePool;
use tokio::sync::Mutex;

use crate::db::{self, Conversation};
use crate::error::{AppError, AppResult};
use crate::store;

/// Enforces membership invariants and one-on-one uniqueness. The dedup
/// check and the insert for a pair conversation run under a mutex keyed by
/// the sorted pair, so two concurrent creations for the same two users
/// cannot both pass the existence check.
#[derive(Clone)]
pub struct Membership {
    pool: SqlitePool,
    pair_locks: Arc<DashMap<(i64, i64), Arc<Mutex<()>>>>,
}

impl Membership {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            pair_locks: Arc::new(DashMap::new()),
        }
    }

    pub async fn create_conversation(
        &self,
        creator_id: i64,
        name: &str,
        candidate_member_ids: &[i64],
    ) -> AppResult<Conversation> {
        let mut member_set: BTreeSet<i64> = candidate_member_ids.iter().copied().collect();
        if member_set.is_empty() {
            return Err(AppError::InvalidInput(
                "conversations require at least one member".to_owned(),
            ));
        }
        member_set.insert(creator_id);

        let member_ids: Vec<i64> = member_set.into_iter().collect();
        for &user_id in &member_ids {
            if !store::user_exists(&self.pool, user_id).await? {
                return Err(AppError::NotFound);
            }
        }

        let created_at = db::now_millis();

        if let &[a, b] = member_ids.as_slice() {
            let lock = self.pair_lock(a, b);
            let _guard = lock.lock().await;

            if store::find_one_on_one(&self.pool, a, b).await?.is_some() {
                return Err(AppError::DuplicateConversation);
            }

            let convo =
                store::insert_conversation_atomic(&self.pool, name, &member_ids, created_at)
                    .await?;
            tracing::info!(conversation_id = convo.id, a, b, "one-on-one conversation created");
            Ok(convo)
        } else {
            let convo =
                store::insert_conversation_atomic(&self.pool, name, &member_ids, created_at)
                    .await?;
            tracing::info!(
                conversation_id = convo.id,
                members = member_ids.len(),
                "conversation created"
            );
            Ok(convo)
        }
    }

    /// The authorization gate used before every conversation-scoped
    /// read or write.
    pub async fn is_member(&self, user_id: i64, conversation_id: i64) -> AppResult<bool> {
        Ok(store::is_member(&self.pool, user_id, conversation_id).await?)
    }

    pub async fn ensure_member(&self, user_id: i64, conversation_id: i64) -> AppResult<()> {
        if self.is_member(user_id, conversation_id).await? {
            Ok(())
        } else {
            Err(AppError::NotAMember(conversation_id))
        }
    }

    pub async fn members_of(&self, conversation_id: i64) -> AppResult<Vec<i64>> {
        Ok(store::member_ids(&self.pool, conversation_id).await?)
    }

    fn pair_lock(&self, a: i64, b: i64) -> Arc<Mutex<()>> {
        let key = (a.min(b), a.max(b));
        self.pair_locks.entry(key).or_default().clone()
    }
}
