use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use relay_db::Database;
use relay_types::UserId;
use relay_types::models::BroadcastReport;

use crate::error::{RelayError, Result};
use crate::transport::{OutgoingMessage, Transport};

/// Pause between consecutive deliveries within one broadcast.
pub const DEFAULT_SEND_DELAY: Duration = Duration::from_millis(500);

/// How many failed recipients a report names before truncating.
pub const DEFAULT_MAX_REPORTED_FAILURES: usize = 5;

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub send_delay: Duration,
    pub max_reported_failures: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            send_delay: DEFAULT_SEND_DELAY,
            max_reported_failures: DEFAULT_MAX_REPORTED_FAILURES,
        }
    }
}

/// A confirmed composition, ready to fan out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    pub sender_id: UserId,
    /// Delivery order is the order of this list.
    pub recipients: Vec<UserId>,
    pub text: String,
}

/// Completion signal of an accepted broadcast.
pub type BroadcastHandle = JoinHandle<Result<BroadcastReport>>;

/// Executes broadcasts: sequential, throttled, failure-tolerant per recipient.
pub struct BroadcastEngine {
    db: Arc<Database>,
    transport: Arc<dyn Transport>,
    config: EngineConfig,
}

impl BroadcastEngine {
    pub fn new(db: Arc<Database>, transport: Arc<dyn Transport>, config: EngineConfig) -> Self {
        Self {
            db,
            transport,
            config,
        }
    }

    /// Run `request` on its own task. Once spawned it runs to completion.
    pub fn spawn(self: &Arc<Self>, request: SendRequest) -> BroadcastHandle {
        let engine = self.clone();
        tokio::spawn(async move {
            engine
                .execute(request.sender_id, &request.recipients, &request.text)
                .await
        })
    }

    pub async fn execute(
        &self,
        sender_id: UserId,
        recipients: &[UserId],
        text: &str,
    ) -> Result<BroadcastReport> {
        let sender = self
            .db
            .get_user(sender_id)?
            .ok_or(RelayError::UnknownSender(sender_id))?;

        let total = recipient_total(recipients.len())?;
        let broadcast_id = self.db.create_broadcast(sender_id, text, total)?;
        info!(
            "Broadcast {} from {} to {} recipients started",
            broadcast_id, sender_id, total
        );

        let message = OutgoingMessage {
            text: format_message(&sender.label(), text),
            reply_to: Some(sender_id),
        };

        let mut successful = 0u32;
        let mut failed = 0u32;
        let mut failed_labels = Vec::new();

        for (i, &recipient) in recipients.iter().enumerate() {
            if i > 0 && !self.config.send_delay.is_zero() {
                tokio::time::sleep(self.config.send_delay).await;
            }

            match self.transport.deliver(recipient, &message).await {
                Ok(()) => {
                    // Delivery already happened; a log failure must not turn it into a miss.
                    if let Err(e) = self.db.append_message(sender_id, recipient, text) {
                        error!("Broadcast {}: failed to log message to {}: {}", broadcast_id, recipient, e);
                    }
                    successful += 1;
                }
                Err(e) => {
                    warn!("Broadcast {}: delivery to {} failed: {}", broadcast_id, recipient, e);
                    failed += 1;
                    failed_labels.push(self.recipient_label(recipient));
                }
            }
        }

        self.db.finalize_broadcast(broadcast_id, successful, failed)?;
        info!(
            "Broadcast {} finished: {} delivered, {} failed",
            broadcast_id, successful, failed
        );

        failed_labels.truncate(self.config.max_reported_failures);
        Ok(BroadcastReport {
            broadcast_id,
            total,
            successful,
            failed,
            failed_recipients: failed_labels,
        })
    }

    fn recipient_label(&self, recipient: UserId) -> String {
        match self.db.get_user(recipient) {
            Ok(Some(user)) => user.label(),
            Ok(None) => format!("ID: {}", recipient),
            Err(e) => {
                warn!("Could not look up recipient {}: {}", recipient, e);
                format!("ID: {}", recipient)
            }
        }
    }
}

/// Report counters are `u32`; a longer list is refused before anything is recorded.
fn recipient_total(len: usize) -> Result<u32> {
    u32::try_from(len)
        .map_err(|_| RelayError::Store(anyhow::anyhow!("broadcast of {} recipients exceeds the report range", len)))
}

/// Render the text the recipient sees.
pub fn format_message(sender_label: &str, text: &str) -> String {
    format!("Message from {}\n\n{}", sender_label, text)
}
