use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::SessionType;

/// Booking details collected before payment. Prices are whole toman.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingDraft {
    pub teacher_id: String,
    pub student_name: String,
    pub student_email: String,
    pub student_phone: Option<String>,
    pub selected_days: Vec<String>,
    pub selected_hours: Vec<String>,
    pub session_type: SessionType,
    pub duration: i32,
    pub number_of_sessions: i32,
    pub total_price: i64,
    pub notes: Option<String>,
}

/// Raw draft form as posted by the client. Everything is optional here so
/// that missing fields surface as validation messages rather than as
/// deserialization failures.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DraftInput {
    pub teacher_id: String,
    pub student_name: String,
    pub student_email: String,
    pub student_phone: Option<String>,
    pub selected_days: Vec<String>,
    pub selected_hours: Vec<String>,
    pub session_type: String,
    pub duration: i32,
    pub number_of_sessions: i32,
    pub notes: Option<String>,
}

/// A draft parked server-side until the payment step picks it up.
#[derive(Debug, Clone, Serialize)]
pub struct StoredDraft {
    pub token: String,
    pub user_id: String,
    pub draft: BookingDraft,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}
