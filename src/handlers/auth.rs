//! Identity of the user behind a request.
//!
//! Authentication itself happens in front of this service; the fronting
//! proxy forwards the authenticated user id in [`USER_HEADER`] and the
//! user's role in [`ROLE_HEADER`].

use crate::errors::AppError;
use axum::{extract::FromRequestParts, http::request::Parts};

pub const USER_HEADER: &str = "x-user-id";
pub const ROLE_HEADER: &str = "x-user-role";

/// Role that sees every upload regardless of the author-only setting.
pub const ADMIN_ROLE: &str = "administrator";

/// Authenticated user. Requests without a valid id are rejected with
/// "Unauthorized action".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i64,
    pub is_admin: bool,
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .ok_or_else(AppError::unauthorized)?;

        let is_admin = parts
            .headers
            .get(ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|role| role.trim().eq_ignore_ascii_case(ADMIN_ROLE));

        Ok(CurrentUser { id, is_admin })
    }
}
