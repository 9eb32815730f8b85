use axum::{debug_handler, extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;

use crate::error::AppResult;
use crate::session::CurrentUser;
use crate::sync::SyncEngine;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateConversationRequest {
    // Free text, empty allowed; group names carry no uniqueness constraint.
    #[serde(default)]
    name: String,
    member_ids: Vec<i64>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn create_conversation(
    CurrentUser(user_id): CurrentUser,
    State(engine): State<SyncEngine>,
    Json(CreateConversationRequest { name, member_ids }): Json<CreateConversationRequest>,
) -> AppResult<impl IntoResponse> {
    let convo = engine.create_conversation(user_id, &name, &member_ids).await?;

    Ok((StatusCode::CREATED, Json(convo)))
}
