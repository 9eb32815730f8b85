use axum::{debug_handler, extract::State, Json};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::Message;
use crate::error::AppResult;
use crate::session::CurrentUser;
use crate::store;
use crate::sync::SyncEngine;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MemberView {
    user_id: i64,
    username: String,
    is_online: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConversationView {
    id: i64,
    name: String,
    is_group: bool,
    members: Vec<MemberView>,
    last_message: Option<Message>,
}

/// The conversation list doubles as the presence re-sync point: each
/// member's `is_online` is read straight from the session registry, so a
/// client that missed a presence event heals here.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn my_conversations(
    CurrentUser(user_id): CurrentUser,
    State(db_pool): State<SqlitePool>,
    State(engine): State<SyncEngine>,
) -> AppResult<Json<Vec<ConversationView>>> {
    let convos = store::conversations_of(&db_pool, user_id).await?;

    let mut views = Vec::with_capacity(convos.len());
    for convo in convos {
        let members = store::members_with_names(&db_pool, convo.id)
            .await?
            .into_iter()
            .map(|user| MemberView {
                is_online: engine.registry.is_online(user.id),
                user_id: user.id,
                username: user.username,
            })
            .collect();

        views.push(ConversationView {
            id: convo.id,
            name: convo.name,
            is_group: convo.is_group,
            members,
            last_message: engine.log.last_message(convo.id).await?,
        });
    }

    Ok(Json(views))
}
