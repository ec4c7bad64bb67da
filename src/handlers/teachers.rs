use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;

use crate::errors::AppError;
use crate::models::Teacher;
use crate::services::directory::{self, TeacherFilter};
use crate::state::AppState;

// GET /api/teachers
pub async fn list_teachers(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<TeacherFilter>,
) -> Result<Json<serde_json::Value>, AppError> {
    let teachers = {
        let db = state.db()?;
        directory::list_teachers(&db, &filter)?
    };
    Ok(Json(serde_json::json!({ "teachers": teachers })))
}

// GET /api/teachers/:id
pub async fn get_teacher(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Teacher>, AppError> {
    let db = state.db()?;
    Ok(Json(directory::get_listed_teacher(&db, &id)?))
}
