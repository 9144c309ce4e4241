//! Wire types of the bridge protocol.
//!
//! The bridge speaks line-oriented JSON over a WebSocket: commands go out,
//! events come in. Close events carry the network's disconnect status so
//! the connection manager can tell logout and session conflict apart from
//! an ordinary drop.

use serde::{Deserialize, Serialize};

/// Disconnect status meaning "logged out remotely": credentials are dead.
pub const CLOSE_LOGGED_OUT: u16 = 401;

/// Disconnect status meaning another live session took over this identity.
/// Dual sessions corrupt remote-side state irrecoverably, so this is fatal
/// to the whole process.
pub const CLOSE_SESSION_CONFLICT: u16 = 440;

/// Command sent to the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeCommand {
    /// Begin/refresh the session with previously persisted credentials.
    Login {
        creds: Option<serde_json::Value>,
    },
    Logout,
    SendText {
        request_id: String,
        to_jid: String,
        body: String,
    },
    SendMedia {
        request_id: String,
        to_jid: String,
        reference: String,
        mime: String,
        caption: Option<String>,
    },
    DownloadMedia {
        request_id: String,
        message_id: String,
    },
    UploadMedia {
        request_id: String,
        /// Base64-encoded payload.
        data: String,
        mime: String,
        filename: Option<String>,
    },
}

/// Event received from the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeEvent {
    /// Socket session is up and paired.
    Open,
    /// Pairing QR issued; shown to the operator until scanned.
    Qr { code: String },
    /// Updated credential blob to persist.
    CredsUpdate { creds: serde_json::Value },
    /// A delivered batch of raw message events.
    Messages { messages: Vec<RawMessage> },
    /// Session closed with the network's status code.
    Close { status: u16 },
    /// Reply to a request-bearing command.
    Response {
        request_id: String,
        ok: bool,
        data: Option<serde_json::Value>,
        error: Option<String>,
    },
}

/// One raw message event as delivered by the network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    /// Externally-assigned, globally unique message id.
    pub id: String,
    /// Conversation address (`local@domain`).
    pub chat_jid: String,
    /// Sender address; differs from `chat_jid` for our own sends.
    pub sender_jid: String,
    /// True when this device (or a linked one) authored the message.
    pub from_me: bool,
    /// Event time, epoch seconds.
    pub timestamp: i64,
    pub content: MessageContent,
}

/// Closed enumeration over inbound content kinds.
///
/// Anything the bridge cannot map lands in `Unsupported` explicitly rather
/// than falling through.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageContent {
    /// Event without a content body (receipts, key distribution, ...).
    Empty,
    Text {
        body: String,
    },
    ExtendedText {
        body: String,
    },
    Image {
        mime: String,
        caption: Option<String>,
    },
    Video {
        mime: String,
        caption: Option<String>,
    },
    Audio {
        mime: String,
    },
    Document {
        mime: String,
        caption: Option<String>,
        file_name: Option<String>,
    },
    /// Protocol/control payload, not user content.
    Protocol,
    Reaction,
    #[serde(other)]
    Unsupported,
}

impl MessageContent {
    /// True for protocol/control kinds that are never user content.
    #[must_use]
    pub fn is_control(&self) -> bool {
        matches!(self, Self::Protocol | Self::Reaction)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_content_kind_maps_to_unsupported() {
        let raw = r#"{"kind": "poll_update"}"#;
        let content: MessageContent = serde_json::from_str(raw).expect("parse");
        assert!(matches!(content, MessageContent::Unsupported));
    }

    #[test]
    fn close_event_round_trips() {
        let raw = r#"{"type": "close", "status": 440}"#;
        let event: BridgeEvent = serde_json::from_str(raw).expect("parse");
        assert!(matches!(
            event,
            BridgeEvent::Close {
                status: CLOSE_SESSION_CONFLICT
            }
        ));
    }
}
