use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// Display fields reported by the chat platform on every interaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayFields {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl DisplayFields {
    /// `@username` when present, otherwise the trimmed full name, otherwise `ID: <id>`.
    pub fn label(&self, id: UserId) -> String {
        if let Some(username) = self.username.as_deref().filter(|u| !u.is_empty()) {
            return format!("@{}", username);
        }

        let full_name = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        );
        let full_name = full_name.trim();
        if !full_name.is_empty() {
            return full_name.to_string();
        }

        format!("ID: {}", id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(flatten)]
    pub display: DisplayFields,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl User {
    pub fn label(&self) -> String {
        self.display.label(self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Admin,
    User,
}

impl Role {
    pub fn can_initiate_send(self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleGrant {
    pub user_id: UserId,
    pub granted_by: UserId,
    pub granted_at: DateTime<Utc>,
}

/// One successful delivery. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: i64,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Audit row for one confirmed send. Counters stay zero until the fan-out finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastRecord {
    pub id: i64,
    pub sender_id: UserId,
    pub text: String,
    pub total_recipients: u32,
    pub successful: u32,
    pub failed: u32,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a finished broadcast as shown to the initiator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastReport {
    pub broadcast_id: i64,
    pub total: u32,
    pub successful: u32,
    pub failed: u32,
    /// Labels of recipients that could not be reached, truncated to a fixed bound.
    pub failed_recipients: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total_users: u64,
    pub total_messages: u64,
    pub total_broadcasts: u64,
}
