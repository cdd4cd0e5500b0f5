use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;
use crate::models::{DisplayFields, Role, User};

// -- JWT Claims --

/// Identity asserted by the chat platform. Shared by the REST middleware and
/// the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub exp: usize,
}

impl Claims {
    pub fn display_fields(&self) -> DisplayFields {
        DisplayFields {
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

// -- Users --

#[derive(Debug, Serialize, Deserialize)]
pub struct StartResponse {
    pub user: User,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub label: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            label: user.label(),
        }
    }
}

// -- Composition --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    SelectingRecipients,
    EnteringText,
    Confirming,
    Completed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Cancelled)
    }
}

/// Snapshot of an in-flight composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub state: SessionState,
    pub recipients: Vec<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ComposeStarted {
    pub session: SessionView,
    pub candidates: Vec<UserSummary>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SubmitTextRequest {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePreview {
    pub sender_label: String,
    pub text: String,
    pub recipient_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfirmResponse {
    pub accepted: bool,
    pub recipient_count: usize,
}

// -- Admin --

#[derive(Debug, Serialize, Deserialize)]
pub struct RecentMessage {
    pub id: i64,
    pub sender_id: UserId,
    pub sender_label: String,
    pub recipient_id: UserId,
    pub recipient_label: String,
    pub preview: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminActionResponse {
    pub user_id: UserId,
    pub done: bool,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}
