//! Row mapping between SQLite and the shared relay-types models.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;

use relay_types::UserId;
use relay_types::models::{BroadcastRecord, DisplayFields, MessageRecord, RoleGrant, User};

pub(crate) const USER_COLUMNS: &str =
    "id, username, first_name, last_name, is_active, created_at, last_activity";

pub(crate) const BROADCAST_COLUMNS: &str =
    "id, sender_id, text, total_recipients, successful, failed, created_at";

/// A logged message joined with whatever the directory still knows about
/// both ends. Either side is `None` once that user is gone.
#[derive(Debug, Clone)]
pub struct RecentMessageRow {
    pub record: MessageRecord,
    pub sender: Option<DisplayFields>,
    pub recipient: Option<DisplayFields>,
}

/// Parse a stored timestamp. Accepts RFC 3339 as written by the migrations,
/// and SQLite's bare `YYYY-MM-DD HH:MM:SS` for rows written by hand.
pub(crate) fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        display: DisplayFields {
            username: row.get(1)?,
            first_name: row.get(2)?,
            last_name: row.get(3)?,
        },
        active: row.get(4)?,
        created_at: timestamp(row, 5)?,
        last_activity: timestamp(row, 6)?,
    })
}

pub(crate) fn broadcast_from_row(row: &Row<'_>) -> rusqlite::Result<BroadcastRecord> {
    Ok(BroadcastRecord {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        text: row.get(2)?,
        total_recipients: row.get(3)?,
        successful: row.get(4)?,
        failed: row.get(5)?,
        created_at: timestamp(row, 6)?,
    })
}

pub(crate) fn role_grant_from_row(row: &Row<'_>) -> rusqlite::Result<RoleGrant> {
    Ok(RoleGrant {
        user_id: row.get(0)?,
        granted_by: row.get(1)?,
        granted_at: timestamp(row, 2)?,
    })
}

pub(crate) fn recent_message_from_row(row: &Row<'_>) -> rusqlite::Result<RecentMessageRow> {
    let sender_known: Option<UserId> = row.get(5)?;
    let recipient_known: Option<UserId> = row.get(9)?;

    Ok(RecentMessageRow {
        record: MessageRecord {
            id: row.get(0)?,
            sender_id: row.get(1)?,
            recipient_id: row.get(2)?,
            text: row.get(3)?,
            created_at: timestamp(row, 4)?,
        },
        sender: match sender_known {
            Some(_) => Some(DisplayFields {
                username: row.get(6)?,
                first_name: row.get(7)?,
                last_name: row.get(8)?,
            }),
            None => None,
        },
        recipient: match recipient_known {
            Some(_) => Some(DisplayFields {
                username: row.get(10)?,
                first_name: row.get(11)?,
                last_name: row.get(12)?,
            }),
            None => None,
        },
    })
}
