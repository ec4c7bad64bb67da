pub mod admin;
pub mod auth;
pub mod bookings;
pub mod drafts;
pub mod events;
pub mod gate;
pub mod teachers;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::state::AppState;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.body_limit_bytes();

    Router::new()
        .route("/health", get(health))
        .route("/api/auth/sign-up", post(auth::sign_up))
        .route("/api/auth/sign-in", post(auth::sign_in))
        .route("/api/auth/sign-out", post(auth::sign_out))
        .route("/api/auth/session", get(auth::get_session))
        .route("/api/teachers", get(teachers::list_teachers))
        .route("/api/teachers/:id", get(teachers::get_teacher))
        .route("/api/drafts", post(drafts::create_draft))
        .route("/api/drafts/:token", get(drafts::get_draft))
        .route("/api/bookings", post(bookings::create_booking))
        .route("/api/bookings/mine", get(bookings::my_bookings))
        .route("/api/teacher/bookings", get(bookings::teacher_bookings))
        .route("/api/admin/bookings", get(admin::get_bookings))
        .route("/api/admin/bookings/:id", get(admin::get_booking))
        .route("/api/admin/payments/pending", get(admin::pending_payments))
        .route("/api/admin/approve-payment", post(admin::approve_payment))
        .route("/api/admin/summary", get(admin::get_summary))
        .route("/api/admin/teachers", get(admin::get_teachers))
        .route(
            "/api/admin/teachers/:id/status",
            post(admin::set_teacher_status),
        )
        .route(
            "/api/admin/teachers/:id/account",
            post(admin::link_teacher_account),
        )
        .route("/api/admin/events", get(events::events_stream))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
