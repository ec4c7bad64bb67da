use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, Capability};
use crate::services::identity::CurrentUser;

/// Bookings the signed-in user paid for.
pub fn student_bookings(conn: &Connection, user: &CurrentUser) -> Result<Vec<Booking>, AppError> {
    let Some(student) = queries::get_student_by_email(conn, &user.user.email)? else {
        return Ok(vec![]);
    };
    Ok(queries::list_bookings_for_student(conn, &student.id)?)
}

/// Confirmed sessions for the teacher profile linked to the user.
pub fn teacher_bookings(conn: &Connection, user: &CurrentUser) -> Result<Vec<Booking>, AppError> {
    user.require(Capability::Teacher)?;
    let Some(teacher) = queries::get_teacher_by_user_id(conn, &user.user.id)? else {
        return Ok(vec![]);
    };
    Ok(queries::list_bookings_for_teacher(
        conn,
        &teacher.id,
        BookingStatus::Confirmed,
    )?)
}
