use axum::{
    extract::{Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use relay_gateway::connection;

use crate::AppState;
use crate::auth::decode_token;

#[derive(Debug, Deserialize)]
pub struct GatewayQuery {
    pub token: String,
}

/// GET /gateway?token=...: The token is checked before the upgrade so an
/// unauthenticated socket is never registered with the dispatcher.
pub async fn upgrade(
    State(state): State<AppState>,
    Query(query): Query<GatewayQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, StatusCode> {
    let claims = decode_token(&state.jwt_secret, &query.token).map_err(|_| StatusCode::UNAUTHORIZED)?;

    state
        .db
        .upsert_user(claims.sub, &claims.display_fields())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let dispatcher = state.dispatcher.clone();
    Ok(ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher, claims.sub)))
}
