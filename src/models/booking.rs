use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::BookingDraft;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub student_id: String,
    #[serde(flatten)]
    pub draft: BookingDraft,
    pub payment_status: PaymentStatus,
    pub status: BookingStatus,
    pub transaction_id: String,
    pub receipt_image: String,
    pub payment_notes: Option<String>,
    pub admin_notes: Option<String>,
    pub reviewed_by: Option<String>,
    pub created_at: NaiveDateTime,
    pub approved_at: Option<NaiveDateTime>,
    pub rejected_at: Option<NaiveDateTime>,
}

/// Payment verification state. `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Approved => "approved",
            PaymentStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(PaymentStatus::Pending),
            "approved" => Some(PaymentStatus::Approved),
            "rejected" => Some(PaymentStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    /// Lifecycle status mirrored onto the booking for this payment status.
    pub fn booking_status(&self) -> BookingStatus {
        match self {
            PaymentStatus::Pending => BookingStatus::Pending,
            PaymentStatus::Approved => BookingStatus::Confirmed,
            PaymentStatus::Rejected => BookingStatus::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "confirmed" => BookingStatus::Confirmed,
            "cancelled" => BookingStatus::Cancelled,
            _ => BookingStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    Online,
    Offline,
    Hybrid,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Online => "online",
            SessionType::Offline => "offline",
            SessionType::Hybrid => "hybrid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "online" => Some(SessionType::Online),
            "offline" => Some(SessionType::Offline),
            "hybrid" => Some(SessionType::Hybrid),
            _ => None,
        }
    }
}

/// Booking as shown in lists: everything except the receipt image itself.
#[derive(Debug, Clone, Serialize)]
pub struct BookingSummary {
    pub id: String,
    pub student_id: String,
    #[serde(flatten)]
    pub draft: BookingDraft,
    pub payment_status: PaymentStatus,
    pub status: BookingStatus,
    pub transaction_id: String,
    pub has_receipt: bool,
    pub payment_notes: Option<String>,
    pub admin_notes: Option<String>,
    pub reviewed_by: Option<String>,
    pub created_at: NaiveDateTime,
    pub approved_at: Option<NaiveDateTime>,
    pub rejected_at: Option<NaiveDateTime>,
}

impl From<Booking> for BookingSummary {
    fn from(b: Booking) -> Self {
        Self {
            has_receipt: !b.receipt_image.is_empty(),
            id: b.id,
            student_id: b.student_id,
            draft: b.draft,
            payment_status: b.payment_status,
            status: b.status,
            transaction_id: b.transaction_id,
            payment_notes: b.payment_notes,
            admin_notes: b.admin_notes,
            reviewed_by: b.reviewed_by,
            created_at: b.created_at,
            approved_at: b.approved_at,
            rejected_at: b.rejected_at,
        }
    }
}
