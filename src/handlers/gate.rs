use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::errors::AppError;
use crate::models::Capability;
use crate::services::identity::{self, CurrentUser};
use crate::state::AppState;

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub fn resolve(state: &AppState, token: &str) -> Result<CurrentUser, AppError> {
    let db = state.db()?;
    identity::get_current_user(&db, token)?.ok_or(AppError::Unauthenticated)
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AppError::Unauthenticated)?;
        resolve(state, token)
    }
}

/// The caller if they carry a live session. A missing, unknown or expired
/// token is simply `None`.
pub struct OptionalUser(pub Option<CurrentUser>);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for OptionalUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(&parts.headers) else {
            return Ok(OptionalUser(None));
        };
        let db = state.db()?;
        Ok(OptionalUser(identity::get_current_user(&db, token)?))
    }
}

/// A signed-in user holding the admin capability.
pub struct AdminUser(pub CurrentUser);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if let Err(e) = user.require(Capability::Admin) {
            tracing::warn!(user_id = %user.user.id, "non-admin on admin route");
            return Err(e);
        }
        Ok(AdminUser(user))
    }
}
