use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use crate::errors::{AppError, Resource};
use crate::models::DraftInput;
use crate::services::directory;
use crate::services::draft;
use crate::services::identity::CurrentUser;
use crate::state::AppState;

// POST /api/drafts
pub async fn create_draft(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(input): Json<DraftInput>,
) -> Result<Json<serde_json::Value>, AppError> {
    if input.teacher_id.trim().is_empty() {
        return Err(AppError::NotFound(Resource::Teacher));
    }

    let db = state.db()?;
    let teacher = directory::get_listed_teacher(&db, input.teacher_id.trim())?;
    let built = draft::build_draft(&teacher, input)?;
    let stored = draft::save_draft(&db, &user.user.id, built, state.config.draft_ttl_minutes)?;

    Ok(Json(serde_json::json!({
        "draft_token": stored.token,
        "draft": stored.draft,
        "expires_at": stored.expires_at,
    })))
}

// GET /api/drafts/:token
pub async fn get_draft(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(token): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = state.db()?;
    let stored = draft::peek_draft(&db, &user.user.id, Some(&token))?;
    Ok(Json(serde_json::json!({
        "draft": stored.draft,
        "expires_at": stored.expires_at,
    })))
}
