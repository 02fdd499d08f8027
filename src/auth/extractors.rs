use std::marker::PhantomData;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use super::{jwt::JwtKeys, repo_types::Role};
use crate::{error::AppError, policy};

/// Identity taken from a verified bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);

        // Read Authorization header
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::MissingToken)?;

        // Expect "Bearer <token>"
        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or(AppError::MissingToken)?;

        let claims = keys.verify(token.trim()).map_err(|e| {
            warn!("invalid or expired token");
            e
        })?;

        Ok(AuthUser {
            id: claims.sub,
            role: claims.role,
        })
    }
}

/// Role set a route requires.
pub trait RoleSet: Send + Sync + 'static {
    const ALLOWED: &'static [Role];
}

pub struct AdminOnly;

impl RoleSet for AdminOnly {
    const ALLOWED: &'static [Role] = &[Role::Admin];
}

/// `AuthUser` whose role is in `R::ALLOWED`; rejects with 403 otherwise.
pub struct RequireRole<R: RoleSet>(pub AuthUser, pub PhantomData<R>);

#[async_trait]
impl<S, R> FromRequestParts<S> for RequireRole<R>
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
    R: RoleSet,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !policy::permits(user.role, R::ALLOWED) {
            warn!(user_id = %user.id, role = %user.role, "role not permitted for route");
            return Err(AppError::Forbidden("Forbidden resource".into()));
        }
        Ok(RequireRole(user, PhantomData))
    }
}
