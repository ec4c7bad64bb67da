use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::{self, queries};
use crate::errors::{AppError, ConflictKind, Resource};
use crate::models::{Booking, PaymentStatus};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingFilter {
    pub status: Option<String>,
    pub q: Option<String>,
}

pub fn list_pending_payments(conn: &Connection) -> Result<Vec<Booking>, AppError> {
    Ok(queries::list_bookings(conn, Some(PaymentStatus::Pending))?)
}

/// All bookings, optionally narrowed by payment status and by a search over
/// student name, student email and transaction id.
pub fn list_bookings(conn: &Connection, filter: &BookingFilter) -> Result<Vec<Booking>, AppError> {
    let status = match filter.status.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(s) => Some(
            PaymentStatus::parse(s)
                .ok_or_else(|| AppError::validation(format!("وضعیت «{s}» معتبر نیست.")))?,
        ),
    };
    let bookings = queries::list_bookings(conn, status)?;
    Ok(search_bookings(bookings, filter.q.as_deref()))
}

pub fn search_bookings(bookings: Vec<Booking>, q: Option<&str>) -> Vec<Booking> {
    let Some(needle) = q.map(|q| q.trim().to_lowercase()).filter(|q| !q.is_empty()) else {
        return bookings;
    };
    bookings
        .into_iter()
        .filter(|b| {
            b.draft.student_name.to_lowercase().contains(&needle)
                || b.draft.student_email.to_lowercase().contains(&needle)
                || b.transaction_id.to_lowercase().contains(&needle)
        })
        .collect()
}

pub fn get_booking(conn: &Connection, id: &str) -> Result<Booking, AppError> {
    queries::get_booking(conn, id)?.ok_or(AppError::NotFound(Resource::Booking))
}

/// Approves or rejects a pending payment. Only a booking still `pending` is
/// changed; a second decision on the same booking gets `Conflict`.
pub fn decide(
    conn: &Connection,
    admin_user_id: &str,
    booking_id: &str,
    approved: bool,
    admin_notes: Option<&str>,
) -> Result<Booking, AppError> {
    let decision = if approved {
        PaymentStatus::Approved
    } else {
        PaymentStatus::Rejected
    };
    let notes = admin_notes.map(str::trim).filter(|n| !n.is_empty());

    let changed =
        queries::decide_payment(conn, booking_id, decision, notes, admin_user_id, &db::now())?;
    if !changed {
        let current = get_booking(conn, booking_id)?;
        tracing::info!(
            booking_id = %booking_id,
            admin_id = %admin_user_id,
            current = current.payment_status.as_str(),
            "payment already decided"
        );
        return Err(AppError::Conflict(ConflictKind::PaymentDecided));
    }

    tracing::info!(
        booking_id = %booking_id,
        admin_id = %admin_user_id,
        decision = decision.as_str(),
        "payment decided"
    );
    get_booking(conn, booking_id)
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PaymentSummary {
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    pub pending_amount: i64,
    pub approved_amount: i64,
}

pub fn payment_summary(conn: &Connection) -> Result<PaymentSummary, AppError> {
    let mut summary = PaymentSummary::default();
    for totals in queries::payment_totals(conn)? {
        match totals.status {
            PaymentStatus::Pending => {
                summary.pending = totals.count;
                summary.pending_amount = totals.amount;
            }
            PaymentStatus::Approved => {
                summary.approved = totals.count;
                summary.approved_amount = totals.amount;
            }
            PaymentStatus::Rejected => summary.rejected = totals.count,
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookingDraft, BookingStatus, SessionType, Teacher, TeacherStatus};

    fn setup_db() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        let teacher = Teacher {
            id: "t1".to_string(),
            name: "Maryam".to_string(),
            email: "maryam@example.com".to_string(),
            phone: None,
            bio: None,
            languages: vec!["English".to_string()],
            levels: None,
            hourly_rate: Some(200_000),
            status: TeacherStatus::Approved,
            available: true,
            created_at: db::now(),
        };
        queries::insert_teacher(&conn, &teacher).unwrap();
        conn
    }

    fn insert(conn: &Connection, id: &str, name: &str, email: &str, txn: &str) {
        let student = queries::get_or_create_student(conn, name, email, None).unwrap();
        let booking = Booking {
            id: id.to_string(),
            student_id: student.id,
            draft: BookingDraft {
                teacher_id: "t1".to_string(),
                student_name: name.to_string(),
                student_email: email.to_string(),
                student_phone: None,
                selected_days: vec!["monday".to_string()],
                selected_hours: vec!["09:00".to_string()],
                session_type: SessionType::Offline,
                duration: 60,
                number_of_sessions: 2,
                total_price: 400_000,
                notes: None,
            },
            payment_status: PaymentStatus::Pending,
            status: BookingStatus::Pending,
            transaction_id: txn.to_string(),
            receipt_image: "data:image/png;base64,AAAA".to_string(),
            payment_notes: None,
            admin_notes: None,
            reviewed_by: None,
            created_at: db::now(),
            approved_at: None,
            rejected_at: None,
        };
        queries::insert_booking(conn, &booking).unwrap();
    }

    #[test]
    fn test_approve_sets_audit_fields() {
        let conn = setup_db();
        insert(&conn, "b1", "Sara", "sara@example.com", "TXN-1");

        let booking = decide(&conn, "admin-1", "b1", true, Some(" ok ")).unwrap();
        assert_eq!(booking.payment_status, PaymentStatus::Approved);
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.admin_notes.as_deref(), Some("ok"));
        assert_eq!(booking.reviewed_by.as_deref(), Some("admin-1"));
        assert!(booking.approved_at.is_some());
        assert!(booking.rejected_at.is_none());
    }

    #[test]
    fn test_reject_sets_rejected_at() {
        let conn = setup_db();
        insert(&conn, "b1", "Sara", "sara@example.com", "TXN-1");

        let booking = decide(&conn, "admin-1", "b1", false, None).unwrap();
        assert_eq!(booking.payment_status, PaymentStatus::Rejected);
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert!(booking.approved_at.is_none());
        assert!(booking.rejected_at.is_some());
    }

    #[test]
    fn test_terminal_states_never_change() {
        let conn = setup_db();
        insert(&conn, "b1", "Sara", "sara@example.com", "TXN-1");
        decide(&conn, "admin-1", "b1", true, Some("ok")).unwrap();

        let second = decide(&conn, "admin-2", "b1", false, Some("nope"));
        assert!(matches!(
            second,
            Err(AppError::Conflict(ConflictKind::PaymentDecided))
        ));

        let booking = get_booking(&conn, "b1").unwrap();
        assert_eq!(booking.payment_status, PaymentStatus::Approved);
        assert_eq!(booking.admin_notes.as_deref(), Some("ok"));
        assert_eq!(booking.reviewed_by.as_deref(), Some("admin-1"));
    }

    #[test]
    fn test_unknown_booking_is_not_found() {
        let conn = setup_db();
        let result = decide(&conn, "admin-1", "missing", true, None);
        assert!(matches!(result, Err(AppError::NotFound(Resource::Booking))));
    }

    #[test]
    fn test_pending_list_and_search() {
        let conn = setup_db();
        insert(&conn, "b1", "Sara", "sara@example.com", "TXN-1");
        insert(&conn, "b2", "Omid", "omid@example.com", "TXN-2");
        insert(&conn, "b3", "Nika", "nika@example.com", "ABC-9");

        assert_eq!(list_pending_payments(&conn).unwrap().len(), 3);
        decide(&conn, "admin-1", "b1", true, None).unwrap();

        let pending = list_pending_payments(&conn).unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|b| b.payment_status == PaymentStatus::Pending));

        let by_txn = list_bookings(
            &conn,
            &BookingFilter {
                status: None,
                q: Some("txn".to_string()),
            },
        )
        .unwrap();
        assert_eq!(by_txn.len(), 2);

        let approved_omid = list_bookings(
            &conn,
            &BookingFilter {
                status: Some("approved".to_string()),
                q: Some("OMID".to_string()),
            },
        )
        .unwrap();
        assert!(approved_omid.is_empty());

        let bad_status = list_bookings(
            &conn,
            &BookingFilter {
                status: Some("refunded".to_string()),
                q: None,
            },
        );
        assert!(matches!(bad_status, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_summary() {
        let conn = setup_db();
        insert(&conn, "b1", "Sara", "sara@example.com", "TXN-1");
        insert(&conn, "b2", "Omid", "omid@example.com", "TXN-2");
        insert(&conn, "b3", "Nika", "nika@example.com", "TXN-3");
        decide(&conn, "admin-1", "b1", true, None).unwrap();
        decide(&conn, "admin-1", "b2", false, None).unwrap();

        let summary = payment_summary(&conn).unwrap();
        assert_eq!(
            summary,
            PaymentSummary {
                pending: 1,
                approved: 1,
                rejected: 1,
                pending_amount: 400_000,
                approved_amount: 400_000,
            }
        );
    }
}
