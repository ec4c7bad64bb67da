use anyhow::Context;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::{format_ts, now, parse_ts};
use crate::models::{
    AuthSession, Booking, BookingDraft, BookingStatus, Capabilities, PaymentStatus, SessionType,
    StoredDraft, Student, StudentStatus, Teacher, TeacherStatus, User,
};

// ── Users ──

pub fn insert_user(conn: &Connection, user: &User) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO users (id, email, password_hash, display_name, role, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user.id,
            user.email,
            user.password_hash,
            user.display_name,
            user.role,
            format_ts(&user.created_at),
        ],
    )?;
    Ok(())
}

const USER_COLUMNS: &str = "id, email, password_hash, display_name, role, created_at";

fn parse_user_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
    let created_at: String = row.get(5)?;
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        display_name: row.get(3)?,
        role: row.get(4)?,
        created_at: parse_ts(&created_at),
    })
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> anyhow::Result<Option<User>> {
    let result = conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
        params![email],
        parse_user_row,
    );

    match result {
        Ok(user) => Ok(Some(user)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<User>> {
    let result = conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![id],
        parse_user_row,
    );

    match result {
        Ok(user) => Ok(Some(user)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn has_admin_row(conn: &Connection, user_id: &str) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM admins WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn insert_admin(conn: &Connection, user_id: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO admins (user_id) VALUES (?1) ON CONFLICT(user_id) DO NOTHING",
        params![user_id],
    )?;
    Ok(())
}

// ── Sessions ──

pub fn insert_session(conn: &Connection, session: &AuthSession) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO sessions (token, user_id, capabilities, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            session.token,
            session.user_id,
            session.capabilities.to_csv(),
            format_ts(&session.created_at),
            format_ts(&session.expires_at),
        ],
    )?;
    Ok(())
}

pub fn get_live_session(conn: &Connection, token: &str) -> anyhow::Result<Option<AuthSession>> {
    let now = format_ts(&now());
    let result = conn.query_row(
        "SELECT token, user_id, capabilities, created_at, expires_at
         FROM sessions WHERE token = ?1 AND expires_at > ?2",
        params![token, now],
        |row| {
            let capabilities: String = row.get(2)?;
            let created_at: String = row.get(3)?;
            let expires_at: String = row.get(4)?;
            Ok(AuthSession {
                token: row.get(0)?,
                user_id: row.get(1)?,
                capabilities: Capabilities::from_csv(&capabilities),
                created_at: parse_ts(&created_at),
                expires_at: parse_ts(&expires_at),
            })
        },
    );

    match result {
        Ok(session) => Ok(Some(session)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn delete_session(conn: &Connection, token: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(count > 0)
}

pub fn delete_expired_sessions(conn: &Connection) -> anyhow::Result<usize> {
    let now = format_ts(&now());
    let count = conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])?;
    Ok(count)
}

// ── Teachers ──

const TEACHER_COLUMNS: &str =
    "id, name, email, phone, bio, languages, levels, hourly_rate, status, available, created_at";

pub fn insert_teacher(conn: &Connection, teacher: &Teacher) -> anyhow::Result<()> {
    let languages = serde_json::to_string(&teacher.languages)?;
    let levels = teacher
        .levels
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT INTO teachers (id, name, email, phone, bio, languages, levels, hourly_rate, status, available, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            teacher.id,
            teacher.name,
            teacher.email,
            teacher.phone,
            teacher.bio,
            languages,
            levels,
            teacher.hourly_rate,
            teacher.status.as_str(),
            teacher.available as i32,
            format_ts(&teacher.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_teacher(conn: &Connection, id: &str) -> anyhow::Result<Option<Teacher>> {
    let result = conn.query_row(
        &format!("SELECT {TEACHER_COLUMNS} FROM teachers WHERE id = ?1"),
        params![id],
        |row| Ok(parse_teacher_row(row)),
    );

    match result {
        Ok(teacher) => Ok(Some(teacher?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// The teacher profile an admin linked to `user_id`, if any.
pub fn get_teacher_by_user_id(
    conn: &Connection,
    user_id: &str,
) -> anyhow::Result<Option<Teacher>> {
    let result = conn.query_row(
        &format!("SELECT {TEACHER_COLUMNS} FROM teachers WHERE user_id = ?1"),
        params![user_id],
        |row| Ok(parse_teacher_row(row)),
    );

    match result {
        Ok(teacher) => Ok(Some(teacher?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn link_teacher_account(
    conn: &Connection,
    teacher_id: &str,
    user_id: &str,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE teachers SET user_id = ?1 WHERE id = ?2",
        params![user_id, teacher_id],
    )?;
    Ok(count > 0)
}

/// Teachers eligible for the public directory.
pub fn list_listed_teachers(conn: &Connection) -> anyhow::Result<Vec<Teacher>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TEACHER_COLUMNS} FROM teachers
         WHERE lower(status) IN ('approved', 'active') ORDER BY name ASC"
    ))?;

    let rows = stmt.query_map([], |row| Ok(parse_teacher_row(row)))?;

    let mut teachers = vec![];
    for row in rows {
        teachers.push(row??);
    }
    Ok(teachers)
}

pub fn list_teachers(
    conn: &Connection,
    status_filter: Option<TeacherStatus>,
) -> anyhow::Result<Vec<Teacher>> {
    let mut teachers = vec![];
    match status_filter {
        Some(status) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TEACHER_COLUMNS} FROM teachers WHERE lower(status) = ?1 ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map(params![status.as_str()], |row| Ok(parse_teacher_row(row)))?;
            for row in rows {
                teachers.push(row??);
            }
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TEACHER_COLUMNS} FROM teachers ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map([], |row| Ok(parse_teacher_row(row)))?;
            for row in rows {
                teachers.push(row??);
            }
        }
    }
    Ok(teachers)
}

pub fn update_teacher_status(
    conn: &Connection,
    id: &str,
    status: TeacherStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE teachers SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    Ok(count > 0)
}

fn parse_teacher_row(row: &rusqlite::Row) -> anyhow::Result<Teacher> {
    let languages_json: String = row.get(5)?;
    let levels_json: Option<String> = row.get(6)?;
    let status_str: String = row.get(8)?;
    let available: i32 = row.get(9)?;
    let created_at: String = row.get(10)?;

    let languages: Vec<String> =
        serde_json::from_str(&languages_json).context("malformed teacher languages")?;
    let levels = levels_json
        .map(|json| serde_json::from_str::<Vec<String>>(&json))
        .transpose()
        .context("malformed teacher levels")?;

    Ok(Teacher {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        bio: row.get(4)?,
        languages,
        levels,
        hourly_rate: row.get(7)?,
        status: TeacherStatus::parse(&status_str).unwrap_or(TeacherStatus::Pending),
        available: available != 0,
        created_at: parse_ts(&created_at),
    })
}

// ── Students ──

pub fn get_student_by_email(conn: &Connection, email: &str) -> anyhow::Result<Option<Student>> {
    let result = conn.query_row(
        "SELECT id, name, email, phone, status, created_at FROM students WHERE email = ?1",
        params![email],
        |row| {
            let status: String = row.get(4)?;
            let created_at: String = row.get(5)?;
            Ok(Student {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                phone: row.get(3)?,
                status: StudentStatus::parse(&status),
                created_at: parse_ts(&created_at),
            })
        },
    );

    match result {
        Ok(student) => Ok(Some(student)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Returns the student for `email`, inserting one first if none exists.
/// The unique index on `email` keeps this to one row per address.
pub fn get_or_create_student(
    conn: &Connection,
    name: &str,
    email: &str,
    phone: Option<&str>,
) -> anyhow::Result<Student> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students (id, name, email, phone, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(email) DO NOTHING",
        params![
            id,
            name,
            email,
            phone,
            StudentStatus::Active.as_str(),
            format_ts(&now()),
        ],
    )?;

    get_student_by_email(conn, email)?
        .with_context(|| format!("student row missing after upsert: {email}"))
}

// ── Booking drafts ──

pub fn insert_draft(conn: &Connection, stored: &StoredDraft) -> anyhow::Result<()> {
    let data = serde_json::to_string(&stored.draft)?;
    conn.execute(
        "INSERT INTO booking_drafts (token, user_id, data, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            stored.token,
            stored.user_id,
            data,
            format_ts(&stored.created_at),
            format_ts(&stored.expires_at),
        ],
    )?;
    Ok(())
}

fn parse_draft_row(row: &rusqlite::Row) -> anyhow::Result<StoredDraft> {
    let data: String = row.get(2)?;
    let created_at: String = row.get(3)?;
    let expires_at: String = row.get(4)?;
    Ok(StoredDraft {
        token: row.get(0)?,
        user_id: row.get(1)?,
        draft: serde_json::from_str(&data).context("malformed booking draft")?,
        created_at: parse_ts(&created_at),
        expires_at: parse_ts(&expires_at),
    })
}

pub fn get_live_draft(
    conn: &Connection,
    token: &str,
    user_id: &str,
) -> anyhow::Result<Option<StoredDraft>> {
    let now = format_ts(&now());
    let result = conn.query_row(
        "SELECT token, user_id, data, created_at, expires_at FROM booking_drafts
         WHERE token = ?1 AND user_id = ?2 AND expires_at > ?3",
        params![token, user_id, now],
        |row| Ok(parse_draft_row(row)),
    );

    match result {
        Ok(draft) => Ok(Some(draft?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn latest_live_draft(conn: &Connection, user_id: &str) -> anyhow::Result<Option<StoredDraft>> {
    let now = format_ts(&now());
    let result = conn.query_row(
        "SELECT token, user_id, data, created_at, expires_at FROM booking_drafts
         WHERE user_id = ?1 AND expires_at > ?2
         ORDER BY created_at DESC, rowid DESC LIMIT 1",
        params![user_id, now],
        |row| Ok(parse_draft_row(row)),
    );

    match result {
        Ok(draft) => Ok(Some(draft?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn delete_draft(conn: &Connection, token: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM booking_drafts WHERE token = ?1", params![token])?;
    Ok(count > 0)
}

pub fn delete_expired_drafts(conn: &Connection) -> anyhow::Result<usize> {
    let now = format_ts(&now());
    let count = conn.execute(
        "DELETE FROM booking_drafts WHERE expires_at <= ?1",
        params![now],
    )?;
    Ok(count)
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, student_id, teacher_id, student_name, student_email, student_phone, \
     selected_days, selected_hours, session_type, duration, number_of_sessions, total_price, notes, \
     payment_status, status, transaction_id, receipt_image, payment_notes, admin_notes, reviewed_by, \
     created_at, approved_at, rejected_at";

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    let draft = &booking.draft;
    let selected_days = serde_json::to_string(&draft.selected_days)?;
    let selected_hours = serde_json::to_string(&draft.selected_hours)?;

    conn.execute(
        &format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)"
        ),
        params![
            booking.id,
            booking.student_id,
            draft.teacher_id,
            draft.student_name,
            draft.student_email,
            draft.student_phone,
            selected_days,
            selected_hours,
            draft.session_type.as_str(),
            draft.duration,
            draft.number_of_sessions,
            draft.total_price,
            draft.notes,
            booking.payment_status.as_str(),
            booking.status.as_str(),
            booking.transaction_id,
            booking.receipt_image,
            booking.payment_notes,
            booking.admin_notes,
            booking.reviewed_by,
            format_ts(&booking.created_at),
            booking.approved_at.as_ref().map(format_ts),
            booking.rejected_at.as_ref().map(format_ts),
        ],
    )?;
    Ok(())
}

pub fn get_booking(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_bookings(
    conn: &Connection,
    payment_status: Option<PaymentStatus>,
) -> anyhow::Result<Vec<Booking>> {
    let mut bookings = vec![];
    match payment_status {
        Some(status) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings WHERE payment_status = ?1
                 ORDER BY created_at DESC, rowid DESC"
            ))?;
            let rows = stmt.query_map(params![status.as_str()], |row| Ok(parse_booking_row(row)))?;
            for row in rows {
                bookings.push(row??);
            }
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY created_at DESC, rowid DESC"
            ))?;
            let rows = stmt.query_map([], |row| Ok(parse_booking_row(row)))?;
            for row in rows {
                bookings.push(row??);
            }
        }
    }
    Ok(bookings)
}

pub fn list_bookings_for_student(
    conn: &Connection,
    student_id: &str,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE student_id = ?1
         ORDER BY created_at DESC, rowid DESC"
    ))?;
    let rows = stmt.query_map(params![student_id], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn list_bookings_for_teacher(
    conn: &Connection,
    teacher_id: &str,
    status: BookingStatus,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE teacher_id = ?1 AND status = ?2
         ORDER BY created_at DESC, rowid DESC"
    ))?;
    let rows = stmt.query_map(params![teacher_id, status.as_str()], |row| {
        Ok(parse_booking_row(row))
    })?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Moves a pending payment to `decision`. Only rows still `pending` are
/// touched; returns false when nothing matched.
pub fn decide_payment(
    conn: &Connection,
    id: &str,
    decision: PaymentStatus,
    admin_notes: Option<&str>,
    reviewed_by: &str,
    at: &NaiveDateTime,
) -> anyhow::Result<bool> {
    anyhow::ensure!(decision.is_terminal(), "payment decision must be terminal");

    let ts = format_ts(at);
    let (approved_at, rejected_at) = match decision {
        PaymentStatus::Approved => (Some(ts), None),
        _ => (None, Some(ts)),
    };

    let count = conn.execute(
        "UPDATE bookings
         SET payment_status = ?1, status = ?2, admin_notes = ?3, reviewed_by = ?4,
             approved_at = ?5, rejected_at = ?6
         WHERE id = ?7 AND payment_status = 'pending'",
        params![
            decision.as_str(),
            decision.booking_status().as_str(),
            admin_notes,
            reviewed_by,
            approved_at,
            rejected_at,
            id,
        ],
    )?;
    Ok(count > 0)
}

pub struct PaymentTotals {
    pub status: PaymentStatus,
    pub count: i64,
    pub amount: i64,
}

pub fn payment_totals(conn: &Connection) -> anyhow::Result<Vec<PaymentTotals>> {
    let mut stmt = conn.prepare(
        "SELECT payment_status, COUNT(*), COALESCE(SUM(total_price), 0)
         FROM bookings GROUP BY payment_status",
    )?;
    let rows = stmt.query_map([], |row| {
        let status: String = row.get(0)?;
        let count: i64 = row.get(1)?;
        let amount: i64 = row.get(2)?;
        Ok((status, count, amount))
    })?;

    let mut totals = vec![];
    for row in rows {
        let (status, count, amount) = row?;
        if let Some(status) = PaymentStatus::parse(&status) {
            totals.push(PaymentTotals {
                status,
                count,
                amount,
            });
        }
    }
    Ok(totals)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let selected_days_json: String = row.get(6)?;
    let selected_hours_json: String = row.get(7)?;
    let session_type_str: String = row.get(8)?;
    let payment_status_str: String = row.get(13)?;
    let status_str: String = row.get(14)?;
    let created_at: String = row.get(20)?;
    let approved_at: Option<String> = row.get(21)?;
    let rejected_at: Option<String> = row.get(22)?;

    let session_type = SessionType::parse(&session_type_str)
        .with_context(|| format!("unknown session type: {session_type_str}"))?;
    let payment_status = PaymentStatus::parse(&payment_status_str)
        .with_context(|| format!("unknown payment status: {payment_status_str}"))?;

    Ok(Booking {
        id: row.get(0)?,
        student_id: row.get(1)?,
        draft: BookingDraft {
            teacher_id: row.get(2)?,
            student_name: row.get(3)?,
            student_email: row.get(4)?,
            student_phone: row.get(5)?,
            selected_days: serde_json::from_str(&selected_days_json)
                .context("malformed selected_days")?,
            selected_hours: serde_json::from_str(&selected_hours_json)
                .context("malformed selected_hours")?,
            session_type,
            duration: row.get(9)?,
            number_of_sessions: row.get(10)?,
            total_price: row.get(11)?,
            notes: row.get(12)?,
        },
        payment_status,
        status: BookingStatus::parse(&status_str),
        transaction_id: row.get(15)?,
        receipt_image: row.get(16)?,
        payment_notes: row.get(17)?,
        admin_notes: row.get(18)?,
        reviewed_by: row.get(19)?,
        created_at: parse_ts(&created_at),
        approved_at: approved_at.as_deref().map(parse_ts),
        rejected_at: rejected_at.as_deref().map(parse_ts),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    #[test]
    fn test_get_or_create_student_is_idempotent() {
        let conn = setup_db();
        let first = get_or_create_student(&conn, "Sara", "sara@example.com", None).unwrap();
        let second =
            get_or_create_student(&conn, "Sara K.", "sara@example.com", Some("0912")).unwrap();

        assert_eq!(first.id, second.id);
        // The first insert wins; later contact details do not overwrite it.
        assert_eq!(second.name, "Sara");

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM students", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_teacher_status_capitalized_legacy_row() {
        let conn = setup_db();
        conn.execute(
            "INSERT INTO teachers (id, name, email, languages, hourly_rate, status, available)
             VALUES ('t1', 'Reza', 'reza@example.com', '[\"English\"]', 200000, 'Approved', 1)",
            [],
        )
        .unwrap();

        let listed = list_listed_teachers(&conn).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, TeacherStatus::Approved);

        let approved = list_teachers(&conn, Some(TeacherStatus::Approved)).unwrap();
        assert_eq!(approved.len(), 1);
    }

    #[test]
    fn test_expired_session_is_not_live() {
        let conn = setup_db();
        let user = User {
            id: "u1".to_string(),
            email: "a@example.com".to_string(),
            password_hash: "x".to_string(),
            display_name: "A".to_string(),
            role: None,
            created_at: now(),
        };
        insert_user(&conn, &user).unwrap();

        let session = AuthSession {
            token: "stale".to_string(),
            user_id: "u1".to_string(),
            capabilities: Capabilities::default(),
            created_at: now() - chrono::Duration::hours(2),
            expires_at: now() - chrono::Duration::hours(1),
        };
        insert_session(&conn, &session).unwrap();

        assert!(get_live_session(&conn, "stale").unwrap().is_none());
        assert_eq!(delete_expired_sessions(&conn).unwrap(), 1);
    }
}
