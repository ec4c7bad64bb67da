use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{Booking, BookingEvent, BookingEventKind, BookingSummary, Teacher, TeacherStatus};
use crate::services::directory;
use crate::services::reconciliation::{self, BookingFilter, PaymentSummary};
use crate::state::AppState;

use super::gate::AdminUser;

fn summaries(bookings: Vec<Booking>) -> Vec<BookingSummary> {
    bookings.into_iter().map(BookingSummary::from).collect()
}

// GET /api/admin/bookings
pub async fn get_bookings(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(filter): Query<BookingFilter>,
) -> Result<Json<serde_json::Value>, AppError> {
    let bookings = {
        let db = state.db()?;
        reconciliation::list_bookings(&db, &filter)?
    };
    Ok(Json(serde_json::json!({ "bookings": summaries(bookings) })))
}

// GET /api/admin/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let db = state.db()?;
    Ok(Json(reconciliation::get_booking(&db, &id)?))
}

// GET /api/admin/payments/pending
pub async fn pending_payments(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let bookings = {
        let db = state.db()?;
        reconciliation::list_pending_payments(&db)?
    };
    Ok(Json(serde_json::json!({ "bookings": summaries(bookings) })))
}

// POST /api/admin/approve-payment
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovePaymentRequest {
    pub booking_id: String,
    pub approved: bool,
    #[serde(default)]
    pub admin_notes: Option<String>,
}

pub async fn approve_payment(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(body): Json<ApprovePaymentRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let booking = {
        let db = state.db()?;
        reconciliation::decide(
            &db,
            &admin.user.id,
            &body.booking_id,
            body.approved,
            body.admin_notes.as_deref(),
        )?
    };

    state.publish(BookingEvent::from_booking(
        BookingEventKind::PaymentDecided,
        &booking,
    ));

    Ok(Json(serde_json::json!({
        "success": true,
        "booking": BookingSummary::from(booking),
    })))
}

// GET /api/admin/summary
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<PaymentSummary>, AppError> {
    let db = state.db()?;
    Ok(Json(reconciliation::payment_summary(&db)?))
}

// GET /api/admin/teachers
#[derive(Deserialize)]
pub struct TeachersQuery {
    pub status: Option<String>,
}

fn parse_teacher_status(s: &str) -> Result<TeacherStatus, AppError> {
    TeacherStatus::parse(s).ok_or_else(|| AppError::validation(format!("وضعیت «{s}» معتبر نیست.")))
}

pub async fn get_teachers(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(query): Query<TeachersQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(s) => Some(parse_teacher_status(s)?),
    };
    let teachers = {
        let db = state.db()?;
        directory::list_all_teachers(&db, status)?
    };
    Ok(Json(serde_json::json!({ "teachers": teachers })))
}

// POST /api/admin/teachers/:id/status
#[derive(Deserialize)]
pub struct TeacherStatusRequest {
    pub status: String,
}

pub async fn set_teacher_status(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    Json(body): Json<TeacherStatusRequest>,
) -> Result<Json<Teacher>, AppError> {
    let status = parse_teacher_status(&body.status)?;
    let db = state.db()?;
    let teacher = directory::set_teacher_status(&db, &id, status)?;
    tracing::info!(admin_id = %admin.user.id, teacher_id = %id, "teacher status set by admin");
    Ok(Json(teacher))
}

// POST /api/admin/teachers/:id/account
#[derive(Deserialize)]
pub struct LinkAccountRequest {
    pub email: String,
}

pub async fn link_teacher_account(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    Json(body): Json<LinkAccountRequest>,
) -> Result<Json<Teacher>, AppError> {
    let db = state.db()?;
    let teacher = directory::link_teacher_account(&db, &id, &body.email)?;
    tracing::info!(admin_id = %admin.user.id, teacher_id = %id, "teacher account linked by admin");
    Ok(Json(teacher))
}
