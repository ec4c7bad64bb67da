use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub display_name: String,
    /// Legacy role flag; the `admins` table takes precedence for admin rights.
    pub role: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Admin,
    Teacher,
    Student,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Admin => "admin",
            Capability::Teacher => "teacher",
            Capability::Student => "student",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "admin" => Some(Capability::Admin),
            "teacher" => Some(Capability::Teacher),
            "student" => Some(Capability::Student),
            _ => None,
        }
    }
}

/// Everything an authenticated user may do, resolved once at sign-in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Capabilities(BTreeSet<Capability>);

impl Capabilities {
    pub fn insert(&mut self, capability: Capability) {
        self.0.insert(capability);
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn to_csv(&self) -> String {
        self.0
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn from_csv(s: &str) -> Self {
        Self(s.split(',').filter_map(Capability::parse).collect())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub user_id: String,
    pub capabilities: Capabilities,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}
