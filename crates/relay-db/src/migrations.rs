use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        // Timestamps are stored as RFC 3339 with millisecond precision so that
        // recency ordering is stable within a single second.
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              INTEGER PRIMARY KEY,
                username        TEXT,
                first_name      TEXT,
                last_name       TEXT,
                is_active       INTEGER NOT NULL DEFAULT 1,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                last_activity   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_users_activity ON users(is_active, last_activity);

            CREATE TABLE role_grants (
                user_id     INTEGER PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                granted_by  INTEGER NOT NULL,
                granted_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            -- No foreign keys on the logs: a delivery may target an id the
            -- directory has never seen. Hard deletes purge them explicitly.
            CREATE TABLE messages (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                sender_id       INTEGER NOT NULL,
                recipient_id    INTEGER NOT NULL,
                text            TEXT NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_messages_created ON messages(created_at);
            CREATE INDEX idx_messages_sender ON messages(sender_id);
            CREATE INDEX idx_messages_recipient ON messages(recipient_id);

            CREATE TABLE broadcasts (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                sender_id           INTEGER NOT NULL,
                text                TEXT NOT NULL,
                total_recipients    INTEGER NOT NULL,
                successful          INTEGER NOT NULL DEFAULT 0,
                failed              INTEGER NOT NULL DEFAULT 0,
                created_at          TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_broadcasts_sender ON broadcasts(sender_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
