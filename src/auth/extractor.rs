use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use time::{Duration, OffsetDateTime};
use tracing::warn;

use super::token;
use crate::error::ApiError;
use crate::state::AppState;

/// Validates the bearer token and yields the authenticated user's id.
/// Every owner-scoped handler takes this as its identity context.
pub struct AuthUser(pub i64);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("missing Authorization header"))?;

        let key = auth
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("invalid Authorization header"))?;

        let issued_after = state
            .config
            .token_ttl_minutes
            .map(|m| OffsetDateTime::now_utc() - Duration::minutes(m));

        match token::resolve(&state.db, key, issued_after).await {
            Ok(Some(user_id)) => Ok(AuthUser(user_id)),
            Ok(None) => {
                warn!("unrecognized or expired token");
                Err(ApiError::unauthorized("invalid or expired token"))
            }
            Err(err) => Err(ApiError::Internal(err)),
        }
    }
}
