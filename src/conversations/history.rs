use axum::{
    debug_handler,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::db::Message;
use crate::error::AppResult;
use crate::session::CurrentUser;
use crate::sync::{SyncEngine, MAX_PAGE_SIZE};

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryQuery {
    skip: Option<i64>,
    take: Option<i64>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn messages(
    CurrentUser(user_id): CurrentUser,
    State(engine): State<SyncEngine>,
    Path(conversation_id): Path<i64>,
    Query(HistoryQuery { skip, take }): Query<HistoryQuery>,
) -> AppResult<Json<Vec<Message>>> {
    let msgs = engine
        .history(
            user_id,
            conversation_id,
            skip.unwrap_or(0),
            take.unwrap_or(MAX_PAGE_SIZE),
        )
        .await?;

    Ok(Json(msgs))
}

#[derive(Debug, Deserialize)]
pub(crate) struct SendMessageRequest {
    content: String,
}

/// Same engine path as the websocket `send` frame; a client without a live
/// socket can still post.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn send_message(
    CurrentUser(user_id): CurrentUser,
    State(engine): State<SyncEngine>,
    Path(conversation_id): Path<i64>,
    Json(SendMessageRequest { content }): Json<SendMessageRequest>,
) -> AppResult<impl IntoResponse> {
    let msg = engine.send_message(user_id, conversation_id, &content).await?;

    Ok((StatusCode::CREATED, Json(msg)))
}
