use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (users, subscriptions)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                username        TEXT NOT NULL UNIQUE COLLATE NOCASE,
                email           TEXT NOT NULL UNIQUE,
                full_name       TEXT NOT NULL,
                password        TEXT NOT NULL,
                avatar_url      TEXT NOT NULL,
                cover_image_url TEXT NOT NULL DEFAULT '',
                refresh_token   TEXT,
                created_at      TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE subscriptions (
                id          TEXT PRIMARY KEY,
                subscriber  TEXT NOT NULL REFERENCES users(id),
                channel     TEXT NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_subscriptions_channel
                ON subscriptions(channel);

            INSERT INTO schema_version (version) VALUES (1);
            "
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        run(&conn).unwrap();
        conn
    }

    fn insert_user(conn: &Connection, id: &str, username: &str) {
        conn.execute(
            "INSERT INTO users (id, username, email, full_name, password, avatar_url)
             VALUES (?1, ?2, ?3, 'Someone', 'hash', 'https://cdn/a.png')",
            (id, username, format!("{}@example.com", username)),
        )
        .unwrap();
    }

    #[test]
    fn rerunning_is_a_no_op() {
        let conn = fresh();
        run(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }

    #[test]
    fn subscription_links_two_users() {
        let conn = fresh();
        insert_user(&conn, "u1", "viewer");
        insert_user(&conn, "u2", "creator");

        conn.execute(
            "INSERT INTO subscriptions (id, subscriber, channel) VALUES ('s1', 'u1', 'u2')",
            [],
        )
        .unwrap();

        let dangling = conn.execute(
            "INSERT INTO subscriptions (id, subscriber, channel) VALUES ('s2', 'u1', 'nobody')",
            [],
        );
        assert!(dangling.is_err());
    }

    #[test]
    fn username_uniqueness_ignores_case() {
        let conn = fresh();
        insert_user(&conn, "u1", "alice");

        let clash = conn.execute(
            "INSERT INTO users (id, username, email, full_name, password, avatar_url)
             VALUES ('u2', 'ALICE', 'other@example.com', 'A', 'hash', 'x')",
            [],
        );
        assert!(clash.is_err());
    }
}
