use crate::error::{AppError, AppResult};
use crate::event::Event;

use super::fanout::Fanout;
use super::membership::Membership;

/// Ephemeral typing relay. Nothing is persisted and no timer is enforced
/// server-side; clients auto-clear a stale indicator. The signal goes to
/// the conversation's members minus every session of the sender.
#[derive(Clone)]
pub struct TypingBroadcaster {
    membership: Membership,
    fanout: Fanout,
}

impl TypingBroadcaster {
    pub fn new(membership: Membership, fanout: Fanout) -> Self {
        Self { membership, fanout }
    }

    pub async fn notify(
        &self,
        user_id: i64,
        conversation_id: i64,
        is_typing: bool,
    ) -> AppResult<()> {
        let member_ids = self.membership.members_of(conversation_id).await?;
        if !member_ids.contains(&user_id) {
            return Err(AppError::NotAMember(conversation_id));
        }

        self.fanout.signal(
            &member_ids,
            user_id,
            &Event::Typing {
                conversation_id,
                user_id,
                is_typing,
            },
        );

        Ok(())
    }
}
