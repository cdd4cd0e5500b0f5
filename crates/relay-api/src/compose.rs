use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::{error, warn};

use relay_core::{BroadcastHandle, RelayError};
use relay_types::UserId;
use relay_types::api::{
    Claims, ComposeStarted, ConfirmResponse, MessagePreview, SessionView, SubmitTextRequest,
    UserSummary,
};
use relay_types::events::GatewayEvent;

use crate::AppState;
use crate::error::ApiResult;

/// GET /compose: The caller's in-flight composition, if any.
pub async fn view(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<SessionView>> {
    let view = state
        .composer
        .view(claims.sub)
        .await
        .ok_or(RelayError::InvalidSessionState)?;
    Ok(Json(view))
}

/// POST /compose
pub async fn start(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<ComposeStarted>> {
    let (session, candidates) = state.composer.start(claims.sub).await?;
    Ok(Json(ComposeStarted {
        session,
        candidates: candidates.iter().map(UserSummary::from).collect(),
    }))
}

/// POST /compose/recipients/{user_id}
pub async fn toggle(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<SessionView>> {
    Ok(Json(state.composer.toggle(claims.sub, user_id).await?))
}

/// POST /compose/finish
pub async fn finish(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<SessionView>> {
    Ok(Json(state.composer.finish_selecting(claims.sub).await?))
}

/// POST /compose/text
pub async fn submit_text(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SubmitTextRequest>,
) -> ApiResult<Json<MessagePreview>> {
    Ok(Json(state.composer.submit_text(claims.sub, &req.text).await?))
}

/// POST /compose/confirm: Accepted, not delivered. The report is pushed to
/// the caller's gateway connection once the broadcast finishes.
pub async fn confirm(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<(StatusCode, Json<ConfirmResponse>)> {
    let (recipient_count, handle) = state.composer.confirm(claims.sub).await?;

    tokio::spawn(report_when_done(state.clone(), claims.sub, handle));

    Ok((
        StatusCode::ACCEPTED,
        Json(ConfirmResponse {
            accepted: true,
            recipient_count,
        }),
    ))
}

/// POST /compose/cancel
pub async fn cancel(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    state.composer.cancel(claims.sub).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /reply/{sender_id}
pub async fn reply(
    State(state): State<AppState>,
    Path(sender_id): Path<UserId>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<SessionView>> {
    Ok(Json(state.composer.reply(claims.sub, sender_id).await?))
}

async fn report_when_done(state: AppState, initiator: UserId, handle: BroadcastHandle) {
    let report = match handle.await {
        Ok(Ok(report)) => report,
        Ok(Err(e)) => {
            error!("Broadcast from {} failed: {}", initiator, e);
            return;
        }
        Err(e) => {
            error!("Broadcast task from {} panicked: {}", initiator, e);
            return;
        }
    };

    if !state
        .dispatcher
        .send_to_user(initiator, GatewayEvent::BroadcastFinished { report })
        .await
    {
        warn!("User {} went offline before their broadcast report was ready", initiator);
    }
}
