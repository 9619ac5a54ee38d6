//! Database row types — these map directly to SQLite rows.
//! Distinct from clipstream-types API models to keep the DB layer independent.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};

/// Full user row, credentials included. Never serialized.
#[derive(Debug)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub avatar_url: String,
    pub cover_image_url: String,
    pub refresh_token: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Columns supplied by the caller on insert; id and timestamps are assigned
/// by the store.
#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub avatar_url: String,
    pub cover_image_url: String,
}

/// User row without `password` and `refresh_token`.
#[derive(Debug)]
pub struct PublicUserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar_url: String,
    pub cover_image_url: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Parse a `datetime('now')` column value.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .with_context(|| format!("bad timestamp in database: {}", raw))?;
    Ok(naive.and_utc())
}
