//! Request extractors

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use fintrack_core::auth;
use fintrack_store::User;

use crate::error::ApiError;
use crate::AppState;

/// The authenticated user, resolved from the Authorization bearer token.
///
/// Rejects with 401 when the header is missing or the session is unknown
/// or expired.
pub struct AuthUser(pub User);

/// Pull the bearer token out of the Authorization header
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(ApiError::Unauthorized)?;
        let conn = state.conn()?;
        let user = auth::authenticate(&conn, &token)?;
        Ok(AuthUser(user))
    }
}
