use chrono::{Duration, NaiveTime};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::{self, queries};
use crate::errors::{AppError, Resource};
use crate::models::{BookingDraft, DraftInput, SessionType, StoredDraft, Teacher};
use crate::services::identity::normalize_email;

const MAX_SESSIONS: i32 = 100;
const MAX_DURATION_MINUTES: i32 = 240;
const DURATION_STEP_MINUTES: i32 = 15;

/// Weekday labels as the booking form sends them, in either language.
/// Compared after dropping spaces and zero-width non-joiners.
const WEEKDAYS: &[&str] = &[
    "saturday",
    "sunday",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "شنبه",
    "یکشنبه",
    "دوشنبه",
    "سهشنبه",
    "چهارشنبه",
    "پنجشنبه",
    "جمعه",
];

fn is_weekday(label: &str) -> bool {
    let folded: String = label
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{200c}')
        .collect::<String>()
        .to_lowercase();
    WEEKDAYS.contains(&folded.as_str())
}

/// Accepts `HH:MM` or a `HH:MM-HH:MM` range.
fn is_time_slot(label: &str) -> bool {
    let parse = |s: &str| NaiveTime::parse_from_str(s.trim(), "%H:%M").ok();
    match label.split_once('-') {
        Some((start, end)) => match (parse(start), parse(end)) {
            (Some(start), Some(end)) => start < end,
            _ => false,
        },
        None => parse(label).is_some(),
    }
}

/// Keeps the first occurrence of every label, in order.
fn dedup_labels(labels: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(labels.len());
    for label in labels {
        let label = label.trim().to_string();
        if !label.is_empty() && !seen.contains(&label) {
            seen.push(label);
        }
    }
    seen
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `hourly_rate × duration/60 × sessions`, rounded half-up to whole toman.
pub fn compute_total_price(hourly_rate: i64, duration: i32, sessions: i32) -> Result<i64, AppError> {
    if hourly_rate < 0 || duration <= 0 || sessions <= 0 {
        return Err(AppError::validation("اطلاعات قیمت کلاس معتبر نیست."));
    }
    let minutes_total = i128::from(hourly_rate) * i128::from(duration) * i128::from(sessions);
    let price = (minutes_total + 30) / 60;
    i64::try_from(price).map_err(|_| AppError::validation("مبلغ کل بیش از حد مجاز است."))
}

/// Validates the booking form against `teacher` and prices it.
pub fn build_draft(teacher: &Teacher, input: DraftInput) -> Result<BookingDraft, AppError> {
    if input.teacher_id.trim() != teacher.id {
        return Err(AppError::validation("استاد انتخاب‌شده با فرم رزرو مطابقت ندارد."));
    }
    if !teacher.status.is_listed() {
        return Err(AppError::NotFound(Resource::Teacher));
    }
    if !teacher.available {
        return Err(AppError::validation(
            "این استاد در حال حاضر کلاس جدید نمی‌پذیرد. لطفاً استاد دیگری انتخاب کنید.",
        ));
    }
    let Some(hourly_rate) = teacher.hourly_rate else {
        return Err(AppError::validation(
            "هزینه کلاس این استاد هنوز تعیین نشده است. لطفاً بعداً دوباره تلاش کنید.",
        ));
    };

    let student_name = input.student_name.trim().to_string();
    if student_name.is_empty() {
        return Err(AppError::validation("لطفاً نام خود را وارد کنید."));
    }
    let student_email = normalize_email(&input.student_email);
    if !student_email.contains('@') {
        return Err(AppError::validation("لطفاً یک ایمیل معتبر وارد کنید."));
    }

    let selected_days = dedup_labels(input.selected_days);
    if selected_days.is_empty() {
        return Err(AppError::validation("لطفاً حداقل یک روز را انتخاب کنید."));
    }
    if let Some(day) = selected_days.iter().find(|d| !is_weekday(d)) {
        return Err(AppError::validation(format!("روز «{day}» معتبر نیست.")));
    }

    let selected_hours = dedup_labels(input.selected_hours);
    if selected_hours.is_empty() {
        return Err(AppError::validation("لطفاً حداقل یک ساعت را انتخاب کنید."));
    }
    if let Some(hour) = selected_hours.iter().find(|h| !is_time_slot(h)) {
        return Err(AppError::validation(format!("ساعت «{hour}» معتبر نیست.")));
    }

    let Some(session_type) = SessionType::parse(&input.session_type) else {
        return Err(AppError::validation("لطفاً نوع کلاس (آنلاین، حضوری یا ترکیبی) را انتخاب کنید."));
    };

    if input.duration <= 0
        || input.duration > MAX_DURATION_MINUTES
        || input.duration % DURATION_STEP_MINUTES != 0
    {
        return Err(AppError::validation("مدت هر جلسه معتبر نیست."));
    }
    if input.number_of_sessions < 1 || input.number_of_sessions > MAX_SESSIONS {
        return Err(AppError::validation("تعداد جلسات معتبر نیست."));
    }

    let total_price = compute_total_price(hourly_rate, input.duration, input.number_of_sessions)?;

    Ok(BookingDraft {
        teacher_id: teacher.id.clone(),
        student_name,
        student_email,
        student_phone: non_blank(input.student_phone),
        selected_days,
        selected_hours,
        session_type,
        duration: input.duration,
        number_of_sessions: input.number_of_sessions,
        total_price,
        notes: non_blank(input.notes),
    })
}

/// Parks `draft` for the payment step and returns its token.
pub fn save_draft(
    conn: &Connection,
    user_id: &str,
    draft: BookingDraft,
    ttl_minutes: i64,
) -> Result<StoredDraft, AppError> {
    match queries::delete_expired_drafts(conn) {
        Ok(0) => {}
        Ok(n) => tracing::debug!(count = n, "purged expired drafts"),
        Err(e) => tracing::warn!(error = %e, "failed to purge expired drafts"),
    }

    let now = db::now();
    let stored = StoredDraft {
        token: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        draft,
        created_at: now,
        expires_at: now + Duration::minutes(ttl_minutes),
    };
    queries::insert_draft(conn, &stored)?;

    tracing::info!(user_id = %user_id, teacher_id = %stored.draft.teacher_id, "saved booking draft");
    Ok(stored)
}

/// Looks a draft up without consuming it. An explicit token wins; without
/// one the caller's newest live draft is used.
pub fn peek_draft(
    conn: &Connection,
    user_id: &str,
    token: Option<&str>,
) -> Result<StoredDraft, AppError> {
    let token = token.map(str::trim).filter(|t| !t.is_empty());
    let found = match token {
        Some(token) => queries::get_live_draft(conn, token, user_id)?,
        None => queries::latest_live_draft(conn, user_id)?,
    };
    found.ok_or(AppError::NotFound(Resource::Draft))
}

/// Reads and deletes a draft. Run inside the caller's transaction so the
/// draft is only gone if the booking that replaces it commits.
pub fn consume_draft(
    conn: &Connection,
    user_id: &str,
    token: Option<&str>,
) -> Result<StoredDraft, AppError> {
    let stored = peek_draft(conn, user_id, token)?;
    if !queries::delete_draft(conn, &stored.token)? {
        return Err(AppError::NotFound(Resource::Draft));
    }
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TeacherStatus;
    use crate::services::identity;

    fn teacher() -> Teacher {
        Teacher {
            id: "t1".to_string(),
            name: "Maryam".to_string(),
            email: "maryam@example.com".to_string(),
            phone: None,
            bio: None,
            languages: vec!["English".to_string()],
            levels: Some(vec!["B1".to_string()]),
            hourly_rate: Some(200_000),
            status: TeacherStatus::Approved,
            available: true,
            created_at: db::now(),
        }
    }

    fn input() -> DraftInput {
        DraftInput {
            teacher_id: "t1".to_string(),
            student_name: "Sara".to_string(),
            student_email: " Sara@Example.com ".to_string(),
            student_phone: Some("  ".to_string()),
            selected_days: vec!["Saturday".to_string(), "سه‌شنبه".to_string(), "Saturday".to_string()],
            selected_hours: vec!["10:00".to_string(), "18:00-19:30".to_string()],
            session_type: "online".to_string(),
            duration: 60,
            number_of_sessions: 3,
            notes: None,
        }
    }

    #[test]
    fn test_price_computation() {
        assert_eq!(compute_total_price(200_000, 60, 3).unwrap(), 600_000);
        assert_eq!(compute_total_price(200_000, 90, 2).unwrap(), 600_000);
        assert_eq!(compute_total_price(100_000, 45, 1).unwrap(), 75_000);
        // 10 × 15 / 60 = 2.5 rounds up
        assert_eq!(compute_total_price(10, 15, 1).unwrap(), 3);
        assert!(compute_total_price(i64::MAX, 240, 100).is_err());
    }

    #[test]
    fn test_build_draft_normalizes_fields() {
        let draft = build_draft(&teacher(), input()).unwrap();
        assert_eq!(draft.total_price, 600_000);
        assert_eq!(draft.student_email, "sara@example.com");
        assert_eq!(draft.student_phone, None);
        assert_eq!(draft.selected_days, vec!["Saturday", "سه‌شنبه"]);
        assert_eq!(draft.session_type, SessionType::Online);
    }

    #[test]
    fn test_build_draft_requires_fields() {
        let mut missing_days = input();
        missing_days.selected_days.clear();
        assert!(matches!(
            build_draft(&teacher(), missing_days),
            Err(AppError::Validation(_))
        ));

        let mut bad_hour = input();
        bad_hour.selected_hours = vec!["25:00".to_string()];
        assert!(matches!(build_draft(&teacher(), bad_hour), Err(AppError::Validation(_))));

        let mut bad_type = input();
        bad_type.session_type = "carrier pigeon".to_string();
        assert!(matches!(build_draft(&teacher(), bad_type), Err(AppError::Validation(_))));

        let mut zero_sessions = input();
        zero_sessions.number_of_sessions = 0;
        assert!(matches!(
            build_draft(&teacher(), zero_sessions),
            Err(AppError::Validation(_))
        ));

        let mut odd_duration = input();
        odd_duration.duration = 50;
        assert!(matches!(
            build_draft(&teacher(), odd_duration),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_build_draft_caps_duration_and_sessions() {
        let mut longest = input();
        longest.duration = MAX_DURATION_MINUTES;
        longest.number_of_sessions = MAX_SESSIONS;
        assert!(build_draft(&teacher(), longest).is_ok());

        let mut too_long = input();
        too_long.duration = MAX_DURATION_MINUTES + DURATION_STEP_MINUTES;
        assert!(matches!(build_draft(&teacher(), too_long), Err(AppError::Validation(_))));

        let mut too_many = input();
        too_many.number_of_sessions = MAX_SESSIONS + 1;
        assert!(matches!(build_draft(&teacher(), too_many), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_build_draft_rejects_unpriced_teacher() {
        let mut t = teacher();
        t.hourly_rate = None;
        assert!(matches!(build_draft(&t, input()), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_draft_is_consumed_once() {
        let conn = db::init_db(":memory:").unwrap();
        let user = identity::register(&conn, "sara@example.com", "password1", "Sara", None).unwrap();
        let draft = build_draft(&teacher(), input()).unwrap();
        let stored = save_draft(&conn, &user.id, draft.clone(), 30).unwrap();

        let peeked = peek_draft(&conn, &user.id, Some(&stored.token)).unwrap();
        assert_eq!(peeked.draft, draft);

        let consumed = consume_draft(&conn, &user.id, Some(&stored.token)).unwrap();
        assert_eq!(consumed.draft, draft);

        let again = consume_draft(&conn, &user.id, Some(&stored.token));
        assert!(matches!(again, Err(AppError::NotFound(Resource::Draft))));
        let fallback = consume_draft(&conn, &user.id, None);
        assert!(matches!(fallback, Err(AppError::NotFound(Resource::Draft))));
    }

    #[test]
    fn test_fallback_uses_latest_draft_of_the_user() {
        let conn = db::init_db(":memory:").unwrap();
        let sara = identity::register(&conn, "sara@example.com", "password1", "Sara", None).unwrap();
        let omid = identity::register(&conn, "omid@example.com", "password1", "Omid", None).unwrap();
        let draft = build_draft(&teacher(), input()).unwrap();

        save_draft(&conn, &sara.id, draft.clone(), 30).unwrap();
        let newest = save_draft(&conn, &sara.id, draft.clone(), 30).unwrap();
        let omids = save_draft(&conn, &omid.id, draft, 30).unwrap();

        assert_eq!(peek_draft(&conn, &sara.id, None).unwrap().token, newest.token);
        // Someone else's token never resolves.
        assert!(peek_draft(&conn, &sara.id, Some(&omids.token)).is_err());
    }

    #[test]
    fn test_expired_draft_is_gone() {
        let conn = db::init_db(":memory:").unwrap();
        let user = identity::register(&conn, "sara@example.com", "password1", "Sara", None).unwrap();
        let draft = build_draft(&teacher(), input()).unwrap();
        let stored = save_draft(&conn, &user.id, draft, -1).unwrap();

        assert!(matches!(
            peek_draft(&conn, &user.id, Some(&stored.token)),
            Err(AppError::NotFound(Resource::Draft))
        ));
    }
}
