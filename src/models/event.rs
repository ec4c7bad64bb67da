use chrono::NaiveDateTime;
use serde::Serialize;

use super::{Booking, PaymentStatus};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingEventKind {
    PaymentSubmitted,
    PaymentDecided,
}

/// Pushed to connected admin dashboards whenever a payment changes.
#[derive(Debug, Clone, Serialize)]
pub struct BookingEvent {
    pub kind: BookingEventKind,
    pub booking_id: String,
    pub payment_status: PaymentStatus,
    pub student_name: String,
    pub total_price: i64,
    pub at: NaiveDateTime,
}

impl BookingEvent {
    pub fn from_booking(kind: BookingEventKind, booking: &Booking) -> Self {
        Self {
            kind,
            booking_id: booking.id.clone(),
            payment_status: booking.payment_status,
            student_name: booking.draft.student_name.clone(),
            total_price: booking.draft.total_price,
            at: chrono::Utc::now().naive_utc(),
        }
    }
}
