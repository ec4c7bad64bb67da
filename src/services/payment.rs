use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::{self, queries};
use crate::errors::AppError;
use crate::models::{Booking, BookingEvent, BookingEventKind, PaymentStatus};
use crate::services::draft::{compute_total_price, consume_draft};
use crate::services::identity::CurrentUser;
use crate::services::notify::payment_submitted_message;
use crate::services::{directory, receipt};
use crate::state::AppState;

/// Payment evidence posted from the payment page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PaymentSubmission {
    pub draft_token: Option<String>,
    pub transaction_id: String,
    pub receipt_image: Option<String>,
    pub payment_notes: Option<String>,
    /// Price the page displayed; checked, never trusted.
    pub total_price: Option<i64>,
}

/// Checks the evidence is there before anything is read or written.
pub fn validate_evidence(submission: &PaymentSubmission) -> Result<(String, &str), AppError> {
    let transaction_id = submission.transaction_id.trim();
    if transaction_id.is_empty() {
        return Err(AppError::validation("لطفاً شناسه (کد پیگیری) تراکنش را وارد کنید."));
    }
    let receipt = submission
        .receipt_image
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| AppError::validation("لطفاً تصویر رسید پرداخت را بارگذاری کنید."))?;
    Ok((transaction_id.to_string(), receipt))
}

/// Turns the caller's draft into a pending booking. All-or-nothing: on any
/// error the draft is left in place and no booking row exists.
pub fn persist_payment(
    conn: &mut Connection,
    user: &CurrentUser,
    submission: &PaymentSubmission,
    transaction_id: String,
    receipt_image: String,
) -> Result<(Booking, String), AppError> {
    let tx = conn.transaction()?;

    let stored = consume_draft(&tx, &user.user.id, submission.draft_token.as_deref())?;
    let draft = stored.draft;

    let teacher = directory::get_listed_teacher(&tx, &draft.teacher_id)?;
    let Some(hourly_rate) = teacher.hourly_rate else {
        return Err(AppError::validation(
            "هزینه کلاس این استاد هنوز تعیین نشده است. لطفاً بعداً دوباره تلاش کنید.",
        ));
    };
    let expected = compute_total_price(hourly_rate, draft.duration, draft.number_of_sessions)?;
    let claimed_mismatch = submission.total_price.is_some_and(|p| p != expected);
    if draft.total_price != expected || claimed_mismatch {
        tracing::warn!(
            user_id = %user.user.id,
            draft_price = draft.total_price,
            claimed = ?submission.total_price,
            expected,
            "booking price mismatch"
        );
        return Err(AppError::validation(
            "مبلغ کلاس تغییر کرده است. لطفاً دوباره زمان کلاس را انتخاب کنید.",
        ));
    }

    // The student record follows the paying account; the form's email and
    // phone are contact details only.
    let student = queries::get_or_create_student(
        &tx,
        &draft.student_name,
        &user.user.email,
        draft.student_phone.as_deref(),
    )?;

    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        student_id: student.id,
        draft,
        payment_status: PaymentStatus::Pending,
        status: PaymentStatus::Pending.booking_status(),
        transaction_id,
        receipt_image,
        payment_notes: submission
            .payment_notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string),
        admin_notes: None,
        reviewed_by: None,
        created_at: db::now(),
        approved_at: None,
        rejected_at: None,
    };
    queries::insert_booking(&tx, &booking)?;
    tx.commit()?;

    Ok((booking, teacher.name))
}

/// Records a student's bank transfer for admin review, then tells the
/// operators about it. The booking stands even if the alert fails.
pub async fn submit_payment(
    state: &AppState,
    user: &CurrentUser,
    submission: PaymentSubmission,
) -> Result<Booking, AppError> {
    let (transaction_id, raw_receipt) = validate_evidence(&submission)?;
    let receipt_image = receipt::encode_receipt(raw_receipt, state.config.max_receipt_bytes)?;

    let (booking, teacher_name) = {
        let mut db = state.db()?;
        persist_payment(&mut db, user, &submission, transaction_id, receipt_image)?
    };

    tracing::info!(
        booking_id = %booking.id,
        user_id = %user.user.id,
        teacher_id = %booking.draft.teacher_id,
        total_price = booking.draft.total_price,
        "payment submitted"
    );

    state.publish(BookingEvent::from_booking(
        BookingEventKind::PaymentSubmitted,
        &booking,
    ));

    let message = payment_submitted_message(&booking, &teacher_name);
    if let Err(e) = state.notifier.notify(&message).await {
        tracing::error!(error = %e, booking_id = %booking.id, "failed to notify operators");
    }

    Ok(booking)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Resource;
    use crate::models::{DraftInput, Teacher, TeacherStatus};
    use crate::services::{draft, identity};

    fn setup() -> (Connection, CurrentUser, Teacher) {
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
        identity::register(&conn, "sara@example.com", "password1", "Sara", None).unwrap();
        let (session, _) =
            identity::sign_in_with_password(&conn, "sara@example.com", "password1", 1).unwrap();
        let user = identity::get_current_user(&conn, &session.token)
            .unwrap()
            .unwrap();
        (conn, user, teacher)
    }

    fn save(conn: &Connection, user: &CurrentUser, teacher: &Teacher, sessions: i32) -> String {
        let input = DraftInput {
            teacher_id: teacher.id.clone(),
            student_name: "Sara".to_string(),
            student_email: "sara@example.com".to_string(),
            selected_days: vec!["saturday".to_string()],
            selected_hours: vec!["10:00".to_string()],
            session_type: "online".to_string(),
            duration: 60,
            number_of_sessions: sessions,
            ..Default::default()
        };
        let built = draft::build_draft(teacher, input).unwrap();
        draft::save_draft(conn, &user.user.id, built, 30).unwrap().token
    }

    fn submission(token: &str) -> PaymentSubmission {
        PaymentSubmission {
            draft_token: Some(token.to_string()),
            transaction_id: "TXN-1".to_string(),
            receipt_image: Some("data:image/png;base64,AAAA".to_string()),
            ..Default::default()
        }
    }

    fn booking_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM bookings", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_missing_evidence_is_rejected() {
        let mut sub = submission("x");
        sub.transaction_id = "   ".to_string();
        assert!(matches!(validate_evidence(&sub), Err(AppError::Validation(_))));

        let mut sub = submission("x");
        sub.receipt_image = None;
        assert!(matches!(validate_evidence(&sub), Err(AppError::Validation(_))));

        let complete = submission("x");
        let (txn, _) = validate_evidence(&complete).unwrap();
        assert_eq!(txn, "TXN-1");
    }

    #[test]
    fn test_persist_creates_pending_booking() {
        let (mut conn, user, teacher) = setup();
        let token = save(&conn, &user, &teacher, 2);

        let sub = submission(&token);
        let (booking, teacher_name) =
            persist_payment(&mut conn, &user, &sub, "TXN-1".to_string(), "data:x".to_string())
                .unwrap();

        assert_eq!(teacher_name, "Maryam");
        assert_eq!(booking.payment_status, PaymentStatus::Pending);
        assert_eq!(booking.draft.total_price, 400_000);
        assert_eq!(booking_count(&conn), 1);

        let stored = queries::get_booking(&conn, &booking.id).unwrap().unwrap();
        assert_eq!(stored.transaction_id, "TXN-1");
        assert_eq!(stored.student_id, booking.student_id);

        let again = persist_payment(&mut conn, &user, &sub, "TXN-1".to_string(), "data:x".to_string());
        assert!(matches!(again, Err(AppError::NotFound(Resource::Draft))));
        assert_eq!(booking_count(&conn), 1);
    }

    #[test]
    fn test_tampered_price_rolls_back() {
        let (mut conn, user, teacher) = setup();
        let token = save(&conn, &user, &teacher, 3);

        let mut sub = submission(&token);
        sub.total_price = Some(1_000);
        let result =
            persist_payment(&mut conn, &user, &sub, "TXN-1".to_string(), "data:x".to_string());
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(booking_count(&conn), 0);

        // Draft survived the rollback.
        assert!(draft::peek_draft(&conn, &user.user.id, Some(&token)).is_ok());
    }

    #[test]
    fn test_rate_change_after_draft_is_rejected() {
        let (mut conn, user, teacher) = setup();
        let token = save(&conn, &user, &teacher, 1);
        conn.execute("UPDATE teachers SET hourly_rate = 250000 WHERE id = 't1'", [])
            .unwrap();

        let result = persist_payment(
            &mut conn,
            &user,
            &submission(&token),
            "TXN-1".to_string(),
            "data:x".to_string(),
        );
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(booking_count(&conn), 0);
    }

    #[test]
    fn test_repeat_bookings_share_one_student() {
        let (mut conn, user, teacher) = setup();
        let first = save(&conn, &user, &teacher, 1);
        let second = save(&conn, &user, &teacher, 1);

        let (a, _) = persist_payment(&mut conn, &user, &submission(&first), "A".into(), "data:x".into())
            .unwrap();
        let (b, _) = persist_payment(&mut conn, &user, &submission(&second), "B".into(), "data:x".into())
            .unwrap();
        assert_eq!(a.student_id, b.student_id);
    }

    #[test]
    fn test_student_follows_account_not_form_email() {
        let (mut conn, user, teacher) = setup();
        let input = DraftInput {
            teacher_id: teacher.id.clone(),
            student_name: "Sara".to_string(),
            student_email: "omid@example.com".to_string(),
            selected_days: vec!["saturday".to_string()],
            selected_hours: vec!["10:00".to_string()],
            session_type: "online".to_string(),
            duration: 60,
            number_of_sessions: 1,
            ..Default::default()
        };
        let built = draft::build_draft(&teacher, input).unwrap();
        let token = draft::save_draft(&conn, &user.user.id, built, 30).unwrap().token;

        let (booking, _) =
            persist_payment(&mut conn, &user, &submission(&token), "TXN-S".into(), "data:x".into())
                .unwrap();
        assert_eq!(booking.draft.student_email, "omid@example.com");

        let sara = queries::get_student_by_email(&conn, "sara@example.com").unwrap().unwrap();
        assert_eq!(booking.student_id, sara.id);
        assert!(queries::get_student_by_email(&conn, "omid@example.com").unwrap().is_none());
    }
}
