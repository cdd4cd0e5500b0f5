use anyhow::Result;
use rusqlite::OptionalExtension;
use tracing::info;

use relay_types::UserId;
use relay_types::models::{BroadcastRecord, DisplayFields, RoleGrant, Stats, User};

use crate::Database;
use crate::models::{
    BROADCAST_COLUMNS, RecentMessageRow, USER_COLUMNS, broadcast_from_row, recent_message_from_row,
    role_grant_from_row, user_from_row,
};

impl Database {
    // -- Users --

    /// Insert the user, or refresh display fields and `last_activity` if known.
    pub fn upsert_user(&self, id: UserId, display: &DisplayFields) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, first_name, last_name)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    username = excluded.username,
                    first_name = excluded.first_name,
                    last_name = excluded.last_name,
                    last_activity = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                rusqlite::params![id, display.username, display.first_name, display.last_name],
            )?;
            Ok(())
        })
    }

    pub fn get_user(&self, id: UserId) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
            let user = conn.query_row(&sql, [id], user_from_row).optional()?;
            Ok(user)
        })
    }

    /// Active users, most recently seen first.
    pub fn list_active_users(&self, exclude: Option<UserId>) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM users
                 WHERE is_active = 1 AND (?1 IS NULL OR id != ?1)
                 ORDER BY last_activity DESC, id DESC",
                USER_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let users = stmt
                .query_map([exclude], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(users)
        })
    }

    /// Every known user including deactivated ones, most recently seen first.
    pub fn list_all_users(&self) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM users ORDER BY last_activity DESC, id DESC",
                USER_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let users = stmt
                .query_map([], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(users)
        })
    }

    /// Soft delete. Returns `false` if the user does not exist.
    pub fn deactivate_user(&self, id: UserId) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("UPDATE users SET is_active = 0 WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    /// Remove the user together with every message, broadcast, and role grant
    /// that references them. Returns `false` if the user does not exist.
    pub fn hard_delete_user(&self, id: UserId) -> Result<bool> {
        let removed = self.with_tx(|tx| {
            let messages = tx.execute(
                "DELETE FROM messages WHERE sender_id = ?1 OR recipient_id = ?1",
                [id],
            )?;
            let broadcasts = tx.execute("DELETE FROM broadcasts WHERE sender_id = ?1", [id])?;
            tx.execute("DELETE FROM role_grants WHERE user_id = ?1", [id])?;
            let users = tx.execute("DELETE FROM users WHERE id = ?1", [id])?;
            Ok((users > 0, messages, broadcasts))
        })?;

        let (existed, messages, broadcasts) = removed;
        if existed {
            info!(
                "Hard-deleted user {} ({} messages, {} broadcasts purged)",
                id, messages, broadcasts
            );
        }
        Ok(existed)
    }

    // -- Messages --

    pub fn append_message(&self, sender_id: UserId, recipient_id: UserId, text: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (sender_id, recipient_id, text) VALUES (?1, ?2, ?3)",
                rusqlite::params![sender_id, recipient_id, text],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Newest first, joined with the directory so callers can label both ends.
    pub fn list_recent_messages(&self, limit: u32) -> Result<Vec<RecentMessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.sender_id, m.recipient_id, m.text, m.created_at,
                        s.id, s.username, s.first_name, s.last_name,
                        r.id, r.username, r.first_name, r.last_name
                 FROM messages m
                 LEFT JOIN users s ON m.sender_id = s.id
                 LEFT JOIN users r ON m.recipient_id = r.id
                 ORDER BY m.created_at DESC, m.id DESC
                 LIMIT ?1",
            )?;
            let rows = stmt
                .query_map([limit], recent_message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Broadcasts --

    pub fn create_broadcast(&self, sender_id: UserId, text: &str, total_recipients: u32) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO broadcasts (sender_id, text, total_recipients) VALUES (?1, ?2, ?3)",
                rusqlite::params![sender_id, text, total_recipients],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Write the final counters. Called exactly once per broadcast.
    pub fn finalize_broadcast(&self, id: i64, successful: u32, failed: u32) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE broadcasts SET successful = ?1, failed = ?2 WHERE id = ?3",
                rusqlite::params![successful, failed, id],
            )?;
            Ok(())
        })
    }

    pub fn get_broadcast(&self, id: i64) -> Result<Option<BroadcastRecord>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM broadcasts WHERE id = ?1", BROADCAST_COLUMNS);
            let record = conn.query_row(&sql, [id], broadcast_from_row).optional()?;
            Ok(record)
        })
    }

    // -- Counters --

    /// Active users only.
    pub fn count_users(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM users WHERE is_active = 1")
    }

    pub fn count_messages(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM messages")
    }

    pub fn count_broadcasts(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM broadcasts")
    }

    pub fn stats(&self) -> Result<Stats> {
        Ok(Stats {
            total_users: self.count_users()?,
            total_messages: self.count_messages()?,
            total_broadcasts: self.count_broadcasts()?,
        })
    }

    fn count(&self, sql: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as u64)
        })
    }

    // -- Role grants --

    /// Insert a grant unless one already exists. Returns `false` on conflict,
    /// which keeps the existence check and the write in one statement.
    pub fn insert_role_grant(&self, user_id: UserId, granted_by: UserId) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO role_grants (user_id, granted_by) VALUES (?1, ?2)",
                [user_id, granted_by],
            )?;
            Ok(changed > 0)
        })
    }

    /// Returns `false` if there was no grant to delete.
    pub fn delete_role_grant(&self, user_id: UserId) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM role_grants WHERE user_id = ?1", [user_id])?;
            Ok(changed > 0)
        })
    }

    pub fn get_role_grant(&self, user_id: UserId) -> Result<Option<RoleGrant>> {
        self.with_conn(|conn| {
            let grant = conn
                .query_row(
                    "SELECT user_id, granted_by, granted_at FROM role_grants WHERE user_id = ?1",
                    [user_id],
                    role_grant_from_row,
                )
                .optional()?;
            Ok(grant)
        })
    }

    pub fn list_role_grants(&self) -> Result<Vec<RoleGrant>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, granted_by, granted_at FROM role_grants ORDER BY granted_at DESC",
            )?;
            let grants = stmt
                .query_map([], role_grant_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(grants)
        })
    }
}
