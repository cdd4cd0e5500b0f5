//! Owner-only endpoints. Every handler checks the caller before touching the core.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use relay_types::UserId;
use relay_types::api::{AdminActionResponse, Claims, RecentMessage};
use relay_types::models::{RoleGrant, User};

use crate::AppState;
use crate::error::ApiResult;

/// Characters of message text shown in the recent-messages view.
const PREVIEW_CHARS: usize = 50;

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    20
}

/// GET /admin/users: Includes deactivated users.
pub async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<User>>> {
    state.permissions.require_owner(claims.sub)?;
    Ok(Json(state.db.list_all_users()?))
}

/// GET /admin/messages?limit=N
pub async fn recent_messages(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<RecentMessage>>> {
    state.permissions.require_owner(claims.sub)?;

    let rows = state.db.list_recent_messages(query.limit.min(200))?;
    let messages = rows
        .into_iter()
        .map(|row| {
            let record = row.record;
            RecentMessage {
                id: record.id,
                sender_id: record.sender_id,
                sender_label: row
                    .sender
                    .map(|d| d.label(record.sender_id))
                    .unwrap_or_else(|| "unknown".to_string()),
                recipient_id: record.recipient_id,
                recipient_label: row
                    .recipient
                    .map(|d| d.label(record.recipient_id))
                    .unwrap_or_else(|| "unknown".to_string()),
                preview: preview(&record.text),
                created_at: record.created_at,
            }
        })
        .collect();

    Ok(Json(messages))
}

/// GET /admin/admins
pub async fn list_admins(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<RoleGrant>>> {
    state.permissions.require_owner(claims.sub)?;
    Ok(Json(state.db.list_role_grants()?))
}

/// POST /admin/admins/{user_id}
pub async fn grant_admin(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<AdminActionResponse>> {
    state.permissions.require_owner(claims.sub)?;
    state.permissions.grant(user_id, claims.sub)?;
    Ok(done(user_id))
}

/// DELETE /admin/admins/{user_id}
pub async fn revoke_admin(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<AdminActionResponse>> {
    state.permissions.require_owner(claims.sub)?;
    state.permissions.revoke(user_id)?;
    Ok(done(user_id))
}

/// POST /admin/users/{user_id}/deactivate
pub async fn deactivate_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<AdminActionResponse>> {
    state.permissions.require_owner(claims.sub)?;
    state.permissions.deactivate_user(user_id)?;
    Ok(done(user_id))
}

/// DELETE /admin/users/{user_id}: Removes the user and every message and
/// broadcast that references them.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<AdminActionResponse>> {
    state.permissions.require_owner(claims.sub)?;
    state.permissions.hard_delete_user(user_id)?;
    Ok(done(user_id))
}

fn done(user_id: UserId) -> Json<AdminActionResponse> {
    Json(AdminActionResponse { user_id, done: true })
}

fn preview(text: &str) -> String {
    if text.chars().count() > PREVIEW_CHARS {
        let cut: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_not_truncated() {
        assert_eq!(preview("hello"), "hello");
    }

    #[test]
    fn long_text_is_cut_on_char_boundary() {
        let text = "é".repeat(60);
        let out = preview(&text);
        assert_eq!(out.chars().count(), PREVIEW_CHARS + 3);
        assert!(out.ends_with("..."));
    }
}
