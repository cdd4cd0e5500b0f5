use serde::{Deserialize, Serialize};

use crate::UserId;
use crate::models::BroadcastReport;

/// Events pushed to clients over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms the connection is authenticated
    Ready { user_id: UserId },

    /// A relayed message addressed to this user
    MessageReceived {
        text: String,
        /// Reply affordance: replying goes straight back to this user
        reply_to: Option<UserId>,
    },

    /// A broadcast started by this user has finished
    BroadcastFinished { report: BroadcastReport },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_for_clients() {
        let json = serde_json::to_value(GatewayEvent::MessageReceived {
            text: "hi".into(),
            reply_to: Some(7),
        })
        .unwrap();
        assert_eq!(json["type"], "MessageReceived");
        assert_eq!(json["data"]["reply_to"], 7);
    }
}
