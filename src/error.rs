use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Crate-wide error taxonomy. Validation and authorization failures are
/// surfaced to the caller; storage-layer failures are logged and reported
/// as a generic 500 without leaking database details.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("not a member of conversation {0}")]
    NotAMember(i64),

    #[error("message content cannot be empty")]
    EmptyMessage,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("conversation already exists")]
    DuplicateConversation,

    #[error("not found")]
    NotFound,

    #[error("unauthorized")]
    Unauthorized,

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::NotAMember(_) => StatusCode::FORBIDDEN,
            AppError::EmptyMessage => StatusCode::BAD_REQUEST,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::DuplicateConversation => StatusCode::CONFLICT,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Database details are logged, never leaked to the client.
        let message = match &self {
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                "internal server error".to_owned()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
