use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use crate::auth::jwt::JwtKeys;
use crate::errors::ApiError;

/// Extracts and validates the bearer token, yielding the caller's user id.
pub struct AuthUser(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing Authorization header".into()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or_else(|| ApiError::Unauthorized("invalid auth scheme".into()))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(token).map_err(|_| {
            warn!("invalid or expired token");
            ApiError::Unauthorized("invalid or expired token".into())
        })?;

        Ok(AuthUser(claims.sub))
    }
}
