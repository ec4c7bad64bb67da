pub mod migrations;
pub mod queries;

use anyhow::Context;
use chrono::{NaiveDateTime, Utc};
use rusqlite::Connection;

/// Timestamps are stored as UTC text in this format so they sort lexically.
pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn init_db(path: &str) -> anyhow::Result<Connection> {
    let conn = Connection::open(path).context("failed to open database")?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        .context("failed to set database pragmas")?;

    migrations::run_migrations(&conn)?;

    Ok(conn)
}

pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

pub fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

pub fn parse_ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, TS_FORMAT).unwrap_or_else(|_| now())
}
