use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use relay_types::UserId;
use relay_types::events::GatewayEvent;

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Serve a WebSocket whose token was already validated at the HTTP upgrade.
///
/// The connection is receive-only from the relay's point of view: events
/// addressed to `user_id` are forwarded, client text frames are ignored.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, user_id: UserId) {
    let (mut sender, mut receiver) = socket.split();

    let (conn_id, mut user_rx) = dispatcher.register_user_channel(user_id).await;
    info!("User {} connected to gateway", user_id);

    if send_event(&mut sender, &GatewayEvent::Ready { user_id }).await.is_err() {
        dispatcher.unregister_user_channel(user_id, conn_id).await;
        return;
    }

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward targeted events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                event = user_rx.recv() => {
                    let Some(event) = event else { break };
                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Pong(_) => pong_flag_recv.store(true, Ordering::Release),
                Message::Close(_) => break,
                Message::Text(text) => {
                    debug!("User {} sent unexpected text frame ({} bytes)", user_id, text.len());
                }
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.unregister_user_channel(user_id, conn_id).await;
    info!("User {} disconnected from gateway", user_id);
}

async fn send_event(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    event: &GatewayEvent,
) -> Result<(), ()> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to serialize gateway event: {}", e);
            return Ok(());
        }
    };
    sender.send(Message::Text(text.into())).await.map_err(|_| ())
}
