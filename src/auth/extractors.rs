use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;
use uuid::Uuid;

use super::jwt::{JwtKeys, TokenError};
use crate::error::AppError;

/// Authentication gate: a handler taking `AuthUser` only runs for a request
/// carrying a valid bearer token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

pub(crate) fn bearer_token(value: Option<&str>) -> Result<&str, TokenError> {
    let header = value.ok_or(TokenError::Missing)?;
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .ok_or(TokenError::Malformed)?
        .trim();
    if token.is_empty() {
        return Err(TokenError::Missing);
    }
    Ok(token)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        let token = bearer_token(header).map_err(|e| {
            warn!(reason = %e, "request rejected");
            e
        })?;

        let user_id = JwtKeys::from_ref(state).verify(token).map_err(|e| {
            warn!(reason = %e, "request rejected");
            e
        })?;

        Ok(AuthUser(user_id))
    }
}
