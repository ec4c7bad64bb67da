use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Teacher {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub languages: Vec<String>,
    pub levels: Option<Vec<String>>,
    pub hourly_rate: Option<i64>,
    pub status: TeacherStatus,
    pub available: bool,
    pub created_at: NaiveDateTime,
}

impl Teacher {
    pub fn teaches(&self, language: &str) -> bool {
        let language = language.trim();
        self.languages
            .iter()
            .any(|l| l.trim().eq_ignore_ascii_case(language))
    }
}

/// Registration status. Older rows carry `Approved` with a capital letter, so
/// parsing is case-insensitive and both spellings land on `Approved`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TeacherStatus {
    Pending,
    Approved,
    Active,
    Rejected,
}

impl TeacherStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeacherStatus::Pending => "pending",
            TeacherStatus::Approved => "approved",
            TeacherStatus::Active => "active",
            TeacherStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(TeacherStatus::Pending),
            "approved" => Some(TeacherStatus::Approved),
            "active" => Some(TeacherStatus::Active),
            "rejected" => Some(TeacherStatus::Rejected),
            _ => None,
        }
    }

    /// Whether the teacher may appear in the directory and take bookings.
    pub fn is_listed(&self) -> bool {
        matches!(self, TeacherStatus::Approved | TeacherStatus::Active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!(TeacherStatus::parse("Approved"), Some(TeacherStatus::Approved));
        assert_eq!(TeacherStatus::parse("approved"), Some(TeacherStatus::Approved));
        assert_eq!(TeacherStatus::parse(" ACTIVE "), Some(TeacherStatus::Active));
        assert_eq!(TeacherStatus::parse("banned"), None);
    }

    #[test]
    fn test_listed_statuses() {
        assert!(TeacherStatus::Approved.is_listed());
        assert!(TeacherStatus::Active.is_listed());
        assert!(!TeacherStatus::Pending.is_listed());
        assert!(!TeacherStatus::Rejected.is_listed());
    }
}
