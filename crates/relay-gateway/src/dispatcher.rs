use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc};
use tracing::debug;
use uuid::Uuid;

use relay_core::{OutgoingMessage, Transport, TransportError};
use relay_types::UserId;
use relay_types::events::GatewayEvent;

/// Routes events to connected users. Doubles as the relay's [`Transport`]:
/// a user is reachable exactly while they hold a live gateway connection.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Default)]
struct DispatcherInner {
    /// Per-user targeted send channels: user_id -> (conn_id, sender)
    user_channels: RwLock<HashMap<UserId, (Uuid, mpsc::UnboundedSender<GatewayEvent>)>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a per-user channel. A newer connection replaces an older one.
    pub async fn register_user_channel(&self, user_id: UserId) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        if self
            .inner
            .user_channels
            .write()
            .await
            .insert(user_id, (conn_id, tx))
            .is_some()
        {
            debug!("User {} reconnected, previous gateway connection superseded", user_id);
        }
        (conn_id, rx)
    }

    /// Unregister a per-user channel, but only if conn_id matches.
    pub async fn unregister_user_channel(&self, user_id: UserId, conn_id: Uuid) {
        let mut channels = self.inner.user_channels.write().await;
        if let Some((stored_conn_id, _)) = channels.get(&user_id) {
            if *stored_conn_id == conn_id {
                channels.remove(&user_id);
            }
        }
    }

    /// Send a targeted event. Returns `false` if the user is not connected.
    pub async fn send_to_user(&self, user_id: UserId, event: GatewayEvent) -> bool {
        let channels = self.inner.user_channels.read().await;
        match channels.get(&user_id) {
            Some((_, tx)) => tx.send(event).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl Transport for Dispatcher {
    async fn deliver(&self, recipient: UserId, message: &OutgoingMessage) -> Result<(), TransportError> {
        let event = GatewayEvent::MessageReceived {
            text: message.text.clone(),
            reply_to: message.reply_to,
        };

        if self.send_to_user(recipient, event).await {
            Ok(())
        } else {
            Err(TransportError::Unreachable(recipient))
        }
    }
}
