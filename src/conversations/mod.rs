mod history;
mod list;
mod new;

use axum::{
    routing::{get, post},
    Router,
};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/new", post(new::create_conversation))
        .route("/", get(list::my_conversations))
        .route(
            "/{id}/messages",
            get(history::messages).post(history::send_message),
        )
}
