use rusqlite::Connection;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::{AppError, Resource};
use crate::models::{Teacher, TeacherStatus};
use crate::services::identity::normalize_email;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeacherFilter {
    pub q: Option<String>,
    pub language: Option<String>,
}

/// Approved teachers narrowed down by free-text search and language.
pub fn list_teachers(conn: &Connection, filter: &TeacherFilter) -> Result<Vec<Teacher>, AppError> {
    let teachers = queries::list_listed_teachers(conn)?;
    Ok(apply_filter(teachers, filter))
}

pub fn apply_filter(teachers: Vec<Teacher>, filter: &TeacherFilter) -> Vec<Teacher> {
    let needle = filter
        .q
        .as_deref()
        .map(|q| q.trim().to_lowercase())
        .filter(|q| !q.is_empty());
    let language = filter
        .language
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty());

    teachers
        .into_iter()
        .filter(|t| match &needle {
            Some(needle) => {
                t.name.to_lowercase().contains(needle.as_str())
                    || t.bio
                        .as_deref()
                        .is_some_and(|bio| bio.to_lowercase().contains(needle.as_str()))
            }
            None => true,
        })
        .filter(|t| language.map_or(true, |l| t.teaches(l)))
        .collect()
}

/// A teacher that can be shown in the directory and booked.
pub fn get_listed_teacher(conn: &Connection, id: &str) -> Result<Teacher, AppError> {
    match queries::get_teacher(conn, id)? {
        Some(teacher) if teacher.status.is_listed() => Ok(teacher),
        _ => Err(AppError::NotFound(Resource::Teacher)),
    }
}

pub fn list_all_teachers(
    conn: &Connection,
    status: Option<TeacherStatus>,
) -> Result<Vec<Teacher>, AppError> {
    Ok(queries::list_teachers(conn, status)?)
}

pub fn set_teacher_status(
    conn: &Connection,
    id: &str,
    status: TeacherStatus,
) -> Result<Teacher, AppError> {
    if !queries::update_teacher_status(conn, id, status)? {
        return Err(AppError::NotFound(Resource::Teacher));
    }
    tracing::info!(teacher_id = %id, status = status.as_str(), "teacher status changed");

    queries::get_teacher(conn, id)?.ok_or(AppError::NotFound(Resource::Teacher))
}

/// Gives the account registered under `email` the dashboard of teacher `id`.
pub fn link_teacher_account(
    conn: &Connection,
    id: &str,
    email: &str,
) -> Result<Teacher, AppError> {
    let teacher = queries::get_teacher(conn, id)?.ok_or(AppError::NotFound(Resource::Teacher))?;
    let user = queries::get_user_by_email(conn, &normalize_email(email))?
        .ok_or(AppError::NotFound(Resource::User))?;

    if let Some(linked) = queries::get_teacher_by_user_id(conn, &user.id)? {
        if linked.id != teacher.id {
            return Err(AppError::validation(format!(
                "این حساب کاربری پیش‌تر به استاد «{}» متصل شده است.",
                linked.name
            )));
        }
    }
    queries::link_teacher_account(conn, &teacher.id, &user.id)?;

    tracing::info!(teacher_id = %teacher.id, user_id = %user.id, "teacher account linked");
    Ok(teacher)
}
