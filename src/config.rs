use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub session_ttl_hours: i64,
    pub draft_ttl_minutes: i64,
    pub max_receipt_bytes: usize,
    pub admin_email: String,
    pub admin_password: String,
    pub telegram_bot_token: String,
    pub telegram_chat_id: String,
    pub notify_timeout_secs: u64,
    pub cors_origin: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: parse_var("PORT", 3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "academy.db".to_string()),
            session_ttl_hours: parse_var("SESSION_TTL_HOURS", 24 * 7),
            draft_ttl_minutes: parse_var("DRAFT_TTL_MINUTES", 30),
            max_receipt_bytes: parse_var("MAX_RECEIPT_BYTES", 5 * 1024 * 1024),
            admin_email: env::var("ADMIN_EMAIL").unwrap_or_default(),
            admin_password: env::var("ADMIN_PASSWORD").unwrap_or_default(),
            telegram_bot_token: env::var("TELEGRAM_BOT_TOKEN").unwrap_or_default(),
            telegram_chat_id: env::var("TELEGRAM_CHAT_ID").unwrap_or_default(),
            notify_timeout_secs: parse_var("NOTIFY_TIMEOUT_SECS", 10),
            cors_origin: env::var("CORS_ORIGIN").ok().filter(|v| !v.trim().is_empty()),
        }
    }

    /// Request bodies carry the receipt as base64 inside JSON, so the limit
    /// has to leave room for the 4/3 expansion plus the rest of the payload.
    pub fn body_limit_bytes(&self) -> usize {
        self.max_receipt_bytes / 3 * 4 + 64 * 1024
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
