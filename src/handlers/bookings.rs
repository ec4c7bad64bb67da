use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::errors::AppError;
use crate::models::BookingSummary;
use crate::services::dashboard;
use crate::services::identity::CurrentUser;
use crate::services::payment::{self, PaymentSubmission};
use crate::state::AppState;

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(submission): Json<PaymentSubmission>,
) -> Result<Json<serde_json::Value>, AppError> {
    let booking = payment::submit_payment(&state, &user, submission).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "booking": BookingSummary::from(booking),
    })))
}

// GET /api/bookings/mine
pub async fn my_bookings(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let bookings = {
        let db = state.db()?;
        dashboard::student_bookings(&db, &user)?
    };
    let bookings: Vec<BookingSummary> = bookings.into_iter().map(BookingSummary::from).collect();
    Ok(Json(serde_json::json!({ "bookings": bookings })))
}

// GET /api/teacher/bookings
pub async fn teacher_bookings(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let bookings = {
        let db = state.db()?;
        dashboard::teacher_bookings(&db, &user)?
    };
    let bookings: Vec<BookingSummary> = bookings.into_iter().map(BookingSummary::from).collect();
    Ok(Json(serde_json::json!({ "bookings": bookings })))
}
