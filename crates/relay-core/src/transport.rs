//! Delivery seam between the broadcast engine and the chat platform.

use async_trait::async_trait;

use relay_types::UserId;

/// A rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
    /// When set, the recipient is offered a one-tap reply to this user.
    pub reply_to: Option<UserId>,
}

/// Delivery failure. The cause is opaque to the core; it is only logged.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("recipient {0} is unreachable")]
    Unreachable(UserId),
}

/// Platform-specific message delivery.
///
/// Implementations must be safe to share across concurrently running
/// broadcasts. The engine calls `deliver` sequentially within one broadcast.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, recipient: UserId, message: &OutgoingMessage) -> Result<(), TransportError>;
}
