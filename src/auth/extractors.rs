use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::warn;

use super::{
    cookie::{read_cookie, SESSION_COOKIE},
    jwt::JwtKeys,
};
use crate::{accounts::Account, error::ApiError, state::AppState};

/// The account behind a valid session token, reloaded from the store.
pub struct AuthUser(pub Account);

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth = headers.get(AUTHORIZATION)?.to_str().ok()?;
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Authorization header first, session cookie as fallback
        let token = bearer_token(&parts.headers)
            .or_else(|| read_cookie(&parts.headers, SESSION_COOKIE))
            .ok_or_else(|| ApiError::unauthorized("Access token required"))?;

        let claims = JwtKeys::from_ref(state).verify(&token).map_err(|e| {
            warn!(error = %e, "invalid or expired token");
            ApiError::unauthorized("Invalid token")
        })?;

        let account = state
            .accounts
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| ApiError::unauthorized("User not found"))?;

        Ok(AuthUser(account))
    }
}
