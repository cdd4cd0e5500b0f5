use axum::{Extension, Json, extract::State};
use tracing::info;

use relay_core::RelayError;
use relay_types::api::{Claims, StartResponse, UserSummary};
use relay_types::models::Stats;

use crate::AppState;
use crate::error::ApiResult;

/// POST /start: Register the caller or refresh their display fields.
pub async fn start(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<StartResponse>> {
    state.db.upsert_user(claims.sub, &claims.display_fields())?;

    let user = state
        .db
        .get_user(claims.sub)?
        .ok_or(RelayError::UnknownUser(claims.sub))?;
    let role = state.permissions.resolve(claims.sub)?;

    info!("User {} ({}) checked in as {:?}", user.id, user.label(), role);
    Ok(Json(StartResponse { user, role }))
}

/// GET /users: Everyone the caller could address, most recently active first.
pub async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<UserSummary>>> {
    let users = state.db.list_active_users(Some(claims.sub))?;
    Ok(Json(users.iter().map(UserSummary::from).collect()))
}

pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<Stats>> {
    Ok(Json(state.db.stats()?))
}
