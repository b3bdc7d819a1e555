//! Acting-user extractor
//!
//! Session handling is out of scope for this service; callers name the
//! acting account in the `X-RareIndex-User` header. Requests without the
//! header act as the configured default user.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use crate::db::users;
use crate::error::ApiError;
use crate::AppState;

pub const USER_HEADER: &str = "x-rareindex-user";

/// The account a request acts as
#[derive(Debug, Clone)]
pub struct ActingUser {
    pub id: i64,
    pub username: String,
}

#[async_trait]
impl FromRequestParts<AppState> for ActingUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let named = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        let user = match named {
            Some(username) => users::find_user_by_username(&state.db, username)
                .await?
                .ok_or_else(|| {
                    warn!(username, "Request names an unknown user");
                    ApiError::BadRequest(format!("Unknown user: {}", username))
                })?,
            None => users::get_user(&state.db, state.default_user_id)
                .await?
                .ok_or_else(|| ApiError::Internal("Default user is missing".to_string()))?,
        };

        if !user.is_active {
            return Err(ApiError::BadRequest(format!("User {} is inactive", user.username)));
        }
        Ok(Self {
            id: user.id,
            username: user.username,
        })
    }
}
