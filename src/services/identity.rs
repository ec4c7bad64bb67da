use anyhow::Context;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Duration;
use rand::distributions::Alphanumeric;
use rand::Rng;
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::db::{self, queries};
use crate::errors::{AppError, ConflictKind};
use crate::models::{AuthSession, Capabilities, Capability, User};

const MIN_PASSWORD_LEN: usize = 8;
const TOKEN_LEN: usize = 64;

/// The authenticated caller of a request.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub user: User,
    #[serde(skip)]
    pub session: AuthSession,
}

impl CurrentUser {
    pub fn can(&self, capability: Capability) -> bool {
        self.session.capabilities.contains(capability)
    }

    pub fn require(&self, capability: Capability) -> Result<(), AppError> {
        if self.can(capability) {
            Ok(())
        } else {
            Err(AppError::NotAuthorized)
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is malformed");
            false
        }
    }
}

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Validates a sign-up and hashes its password. Touches no database, so
/// callers can run it off the connection lock.
pub fn prepare_account(
    email: &str,
    password: &str,
    display_name: &str,
    role: Option<Capability>,
) -> Result<User, AppError> {
    let email = normalize_email(email);
    if !email.contains('@') {
        return Err(AppError::validation("لطفاً یک ایمیل معتبر وارد کنید."));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation("رمز عبور باید حداقل ۸ کاراکتر باشد."));
    }

    Ok(User {
        id: Uuid::new_v4().to_string(),
        email,
        password_hash: hash_password(password)?,
        display_name: display_name.trim().to_string(),
        role: role.map(|r| r.as_str().to_string()),
        created_at: db::now(),
    })
}

pub fn insert_account(conn: &Connection, user: User) -> Result<User, AppError> {
    if queries::get_user_by_email(conn, &user.email)?.is_some() {
        tracing::info!("sign-up with an email that is already registered");
        return Err(AppError::Conflict(ConflictKind::EmailTaken));
    }
    queries::insert_user(conn, &user)?;

    tracing::info!(user_id = %user.id, "registered user");
    Ok(user)
}

pub fn register(
    conn: &Connection,
    email: &str,
    password: &str,
    display_name: &str,
    role: Option<Capability>,
) -> Result<User, AppError> {
    insert_account(conn, prepare_account(email, password, display_name, role)?)
}

/// Works out what `user` may do. Admin rights come from the `admins` table
/// first; accounts that predate it carry `role = 'admin'` instead. Teacher
/// rights need a teacher profile an admin has linked to this account.
pub fn resolve_capabilities(conn: &Connection, user: &User) -> anyhow::Result<Capabilities> {
    let mut caps = Capabilities::default();
    let role = user.role.as_deref().and_then(Capability::parse);

    let admin = queries::has_admin_row(conn, &user.id)? || role == Some(Capability::Admin);
    if admin {
        caps.insert(Capability::Admin);
    }

    let teacher = role == Some(Capability::Teacher)
        || queries::get_teacher_by_user_id(conn, &user.id)?.is_some();
    if teacher {
        caps.insert(Capability::Teacher);
    }

    if role == Some(Capability::Student) || (!admin && !teacher) {
        caps.insert(Capability::Student);
    }

    Ok(caps)
}

/// Opens a session for an already authenticated user.
pub fn start_session(
    conn: &Connection,
    user: &User,
    ttl_hours: i64,
) -> Result<AuthSession, AppError> {
    let now = db::now();
    let session = AuthSession {
        token: generate_token(),
        user_id: user.id.clone(),
        capabilities: resolve_capabilities(conn, user)?,
        created_at: now,
        expires_at: now + Duration::hours(ttl_hours),
    };
    queries::insert_session(conn, &session)?;

    if let Err(e) = queries::delete_expired_sessions(conn) {
        tracing::warn!(error = %e, "failed to purge expired sessions");
    }

    tracing::info!(user_id = %user.id, capabilities = %session.capabilities.to_csv(), "signed in");
    Ok(session)
}

/// Looks up the account a sign-in names. The password is checked
/// separately with [`check_password`].
pub fn find_account(conn: &Connection, email: &str) -> Result<User, AppError> {
    match queries::get_user_by_email(conn, &normalize_email(email))? {
        Some(user) => Ok(user),
        None => {
            tracing::info!("sign-in for unknown email");
            Err(AppError::Unauthenticated)
        }
    }
}

pub fn check_password(user: &User, password: &str) -> Result<(), AppError> {
    if verify_password(password, &user.password_hash) {
        Ok(())
    } else {
        tracing::info!(user_id = %user.id, "sign-in with wrong password");
        Err(AppError::Unauthenticated)
    }
}

pub fn sign_in_with_password(
    conn: &Connection,
    email: &str,
    password: &str,
    ttl_hours: i64,
) -> Result<(AuthSession, User), AppError> {
    let user = find_account(conn, email)?;
    check_password(&user, password)?;
    let session = start_session(conn, &user, ttl_hours)?;
    Ok((session, user))
}

pub fn get_session(conn: &Connection, token: &str) -> anyhow::Result<Option<AuthSession>> {
    if token.is_empty() {
        return Ok(None);
    }
    queries::get_live_session(conn, token)
}

pub fn get_current_user(conn: &Connection, token: &str) -> anyhow::Result<Option<CurrentUser>> {
    let Some(session) = get_session(conn, token)? else {
        return Ok(None);
    };
    let user = queries::get_user_by_id(conn, &session.user_id)?;
    Ok(user.map(|user| CurrentUser { user, session }))
}

pub fn sign_out(conn: &Connection, token: &str) -> anyhow::Result<bool> {
    queries::delete_session(conn, token)
}

/// Makes sure the configured bootstrap account exists and is an admin.
pub fn ensure_admin(conn: &Connection, email: &str, password: &str) -> anyhow::Result<()> {
    let email = normalize_email(email);
    let user = match queries::get_user_by_email(conn, &email)? {
        Some(user) => user,
        None => register(conn, &email, password, "Administrator", None)
            .context("failed to create bootstrap admin")?,
    };
    queries::insert_admin(conn, &user.id)?;
    tracing::info!(user_id = %user.id, "bootstrap admin ready");
    Ok(())
}
