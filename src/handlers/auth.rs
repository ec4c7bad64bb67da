use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{AuthSession, Capabilities, Capability, User};
use crate::services::identity::{self, CurrentUser};
use crate::state::AppState;

use super::gate::OptionalUser;

#[derive(Serialize)]
pub struct AuthResponse {
    token: String,
    user: User,
    capabilities: Capabilities,
    expires_at: NaiveDateTime,
}

impl AuthResponse {
    fn new(session: AuthSession, user: User) -> Self {
        Self {
            token: session.token,
            user,
            capabilities: session.capabilities,
            expires_at: session.expires_at,
        }
    }
}

/// Runs password hashing on the blocking pool, away from the runtime and
/// the connection lock.
async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Backend(anyhow::Error::new(e).context("password task failed")))?
}

// POST /api/auth/sign-up
#[derive(Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: String,
}

pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SignUpRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let account = blocking(move || {
        identity::prepare_account(
            &body.email,
            &body.password,
            &body.display_name,
            Some(Capability::Student),
        )
    })
    .await?;

    let db = state.db()?;
    let user = identity::insert_account(&db, account)?;
    let session = identity::start_session(&db, &user, state.config.session_ttl_hours)?;
    Ok(Json(AuthResponse::new(session, user)))
}

// POST /api/auth/sign-in
#[derive(Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SignInRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = {
        let db = state.db()?;
        identity::find_account(&db, &body.email)?
    };

    let password = body.password;
    let user = blocking(move || identity::check_password(&user, &password).map(|()| user)).await?;

    let db = state.db()?;
    let session = identity::start_session(&db, &user, state.config.session_ttl_hours)?;
    Ok(Json(AuthResponse::new(session, user)))
}

// POST /api/auth/sign-out
// Always succeeds so a client holding a stale token can still clear it.
pub async fn sign_out(
    State(state): State<Arc<AppState>>,
    OptionalUser(user): OptionalUser,
) -> Result<Json<serde_json::Value>, AppError> {
    if let Some(user) = user {
        let db = state.db()?;
        identity::sign_out(&db, &user.session.token)?;
        tracing::info!(user_id = %user.user.id, "signed out");
    }
    Ok(Json(serde_json::json!({"ok": true})))
}

// GET /api/auth/session
#[derive(Serialize)]
pub struct SessionResponse {
    user: User,
    capabilities: Capabilities,
    expires_at: NaiveDateTime,
}

pub async fn get_session(user: CurrentUser) -> Json<SessionResponse> {
    Json(SessionResponse {
        capabilities: user.session.capabilities,
        expires_at: user.session.expires_at,
        user: user.user,
    })
}
