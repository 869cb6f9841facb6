use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::warn;
use uuid::Uuid;

use super::{claims::TokenKind, jwt::JwtKeys};
use crate::error::AppError;

/// Authenticated caller; rejects with 401 when there is no valid access token.
pub struct AuthUser(pub Uuid);

/// Caller identity for public endpoints that personalise their output.
/// Anonymous when no `Authorization` header is sent; a bad token still
/// rejects with 401.
pub struct MaybeAuthUser(pub Option<Uuid>);

fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AppError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| AppError::Unauthenticated("Invalid Authorization header".into()))?;
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(Some)
        .ok_or_else(|| AppError::Unauthenticated("Invalid Authorization header".into()))
}

fn authenticate(keys: &JwtKeys, token: &str) -> Result<Uuid, AppError> {
    match keys.verify_kind(token, TokenKind::Access) {
        Ok(claims) => Ok(claims.sub),
        Err(e) => {
            warn!(error = %e, "rejected bearer token");
            Err(AppError::Unauthenticated("Invalid or expired token".into()))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?.ok_or_else(|| {
            AppError::Unauthenticated("Authentication credentials were not provided".into())
        })?;
        let keys = JwtKeys::from_ref(state);
        Ok(AuthUser(authenticate(&keys, token)?))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match bearer_token(&parts.headers)? {
            Some(token) => {
                let keys = JwtKeys::from_ref(state);
                Ok(MaybeAuthUser(Some(authenticate(&keys, token)?)))
            }
            None => Ok(MaybeAuthUser(None)),
        }
    }
}
