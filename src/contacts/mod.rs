use axum::{
    debug_handler,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::db::{self, Contact, User};
use crate::error::{AppError, AppResult};
use crate::session::CurrentUser;
use crate::store;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(contacts).post(add_contact))
        .route("/search", get(search))
}

#[debug_handler(state = AppState)]
pub(crate) async fn contacts(
    CurrentUser(user_id): CurrentUser,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<Vec<Contact>>> {
    Ok(Json(store::contacts_of(&db_pool, user_id).await?))
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchQuery {
    query: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn search(
    CurrentUser(user_id): CurrentUser,
    State(db_pool): State<SqlitePool>,
    Query(SearchQuery { query }): Query<SearchQuery>,
) -> AppResult<Json<Vec<User>>> {
    if query.trim().is_empty() {
        return Err(AppError::InvalidInput("query cannot be empty".to_owned()));
    }

    Ok(Json(store::search_users(&db_pool, user_id, query.trim()).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddContactRequest {
    contact_user_id: i64,
}

#[debug_handler(state = AppState)]
pub(crate) async fn add_contact(
    CurrentUser(user_id): CurrentUser,
    State(db_pool): State<SqlitePool>,
    Json(AddContactRequest { contact_user_id }): Json<AddContactRequest>,
) -> AppResult<impl IntoResponse> {
    if contact_user_id == user_id {
        return Err(AppError::InvalidInput(
            "cannot add yourself as a contact".to_owned(),
        ));
    }
    if !store::user_exists(&db_pool, contact_user_id).await? {
        return Err(AppError::NotFound);
    }

    let inserted =
        store::add_contact(&db_pool, user_id, contact_user_id, db::now_millis()).await?;
    if !inserted {
        return Err(AppError::InvalidInput("already a contact".to_owned()));
    }

    Ok(StatusCode::CREATED)
}
