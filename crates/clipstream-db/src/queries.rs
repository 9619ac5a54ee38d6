use crate::models::{NewUser, PublicUserRow, UserRow};
use crate::Database;
use anyhow::Result;
use rusqlite::{Connection, Row};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, username, email, full_name, password, avatar_url, \
     cover_image_url, refresh_token, created_at, updated_at";

const PUBLIC_USER_COLUMNS: &str =
    "id, username, email, full_name, avatar_url, cover_image_url, created_at, updated_at";

impl Database {
    // -- Users --

    /// First user whose username (case-insensitive) or email matches.
    pub fn find_user_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username_or_email(conn, username, email))
    }

    /// Insert a user and return the row as inserted, store-assigned fields
    /// included. Changes made afterwards (by triggers or other writers) are
    /// not reflected.
    ///
    /// Fails with a constraint error if the username or email is taken; see
    /// [`crate::is_unique_violation`].
    pub fn create_user(&self, user: &NewUser) -> Result<UserRow> {
        self.with_conn_mut(|conn| {
            let id = Uuid::new_v4().to_string();

            let row = conn.query_row(
                &format!(
                    "INSERT INTO users (id, username, email, full_name, password, avatar_url, cover_image_url)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     RETURNING {}",
                    USER_COLUMNS
                ),
                rusqlite::params![
                    &id,
                    &user.username,
                    &user.email,
                    &user.full_name,
                    &user.password_hash,
                    &user.avatar_url,
                    &user.cover_image_url,
                ],
                user_from_row,
            )?;

            Ok(row)
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                [id],
                user_from_row,
            )
            .optional()
        })
    }

    /// Load a user through the public projection: no password, no refresh token.
    pub fn find_public_user_by_id(&self, id: &str) -> Result<Option<PublicUserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", PUBLIC_USER_COLUMNS),
                [id],
                |row| {
                    Ok(PublicUserRow {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        email: row.get(2)?,
                        full_name: row.get(3)?,
                        avatar_url: row.get(4)?,
                        cover_image_url: row.get(5)?,
                        created_at: row.get(6)?,
                        updated_at: row.get(7)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn count_users(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
            Ok(n as u64)
        })
    }
}

fn query_user_by_username_or_email(
    conn: &Connection,
    username: &str,
    email: &str,
) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users WHERE username = ?1 OR email = ?2 LIMIT 1",
        USER_COLUMNS
    ))?;

    let row = stmt.query_row([username, email], user_from_row).optional()?;

    Ok(row)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        full_name: row.get(3)?,
        password: row.get(4)?,
        avatar_url: row.get(5)?,
        cover_image_url: row.get(6)?,
        refresh_token: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
