use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;

/// Header the authenticating gateway sets after verifying credentials.
/// Everything behind it trusts the id as-is.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub i64);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok())
            .map(CurrentUser)
            .ok_or(AppError::Unauthorized)
    }
}
