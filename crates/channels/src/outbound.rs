use {async_trait::async_trait, serde::Serialize};

use crate::{Result, message::Message};

/// What an outbound send carries.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SendPayload {
    Text {
        body: String,
    },
    /// Media hosted at a URL the network fetches itself.
    MediaLink {
        url: String,
        mime: String,
        caption: Option<String>,
    },
    /// Media previously uploaded/registered with the transport.
    MediaReference {
        reference: String,
        mime: String,
        caption: Option<String>,
    },
    /// Pre-approved structured template.
    Template {
        name: String,
        language: String,
        components: serde_json::Value,
    },
}

impl SendPayload {
    /// Text persisted for history purposes.
    #[must_use]
    pub fn history_text(&self) -> String {
        match self {
            Self::Text { body } => body.clone(),
            Self::MediaLink { caption, .. } | Self::MediaReference { caption, .. } => {
                caption.clone().unwrap_or_default()
            },
            Self::Template { name, .. } => format!("[template: {name}]"),
        }
    }

    /// Media reference persisted as `media_path`, if any.
    #[must_use]
    pub fn media_reference(&self) -> Option<&str> {
        match self {
            Self::MediaLink { url, .. } => Some(url),
            Self::MediaReference { reference, .. } => Some(reference),
            _ => None,
        }
    }
}

/// Structured result of a send attempt. Failures are data, not panics:
/// callers translate them into a protocol-appropriate response.
#[derive(Debug, Clone, Serialize)]
pub struct SendOutcome {
    pub success: bool,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
}

impl SendOutcome {
    #[must_use]
    pub fn ok(provider_message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            provider_message_id: Some(provider_message_id.into()),
            error: None,
        }
    }

    #[must_use]
    pub fn failed(error: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            provider_message_id: None,
            error: Some(error.to_string()),
        }
    }
}

/// Send capability implemented by both transport adapters (persistent
/// session and HTTP business API), selected by configuration.
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Adapter identifier for logs.
    fn id(&self) -> &'static str;

    /// Send `payload` to the canonical phone `to`.
    async fn send(&self, to: &str, payload: &SendPayload) -> SendOutcome;

    /// Register embedded bytes with the transport, returning the reference
    /// to send (and persist) instead of the raw bytes.
    async fn upload_media(&self, bytes: &[u8], mime: &str, filename: Option<&str>)
    -> Result<String>;
}

/// Live-observer event raised by the dispatcher and ingestion pipeline.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum MessageEvent {
    Inbound { message: Message },
    Outbound { message: Message },
}

/// Sink for message events; the gateway provides the concrete
/// implementation (e.g. fan-out to live clients).
#[async_trait]
pub trait MessageEventSink: Send + Sync {
    async fn emit(&self, event: MessageEvent);
}

/// Connection lifecycle states of the persistent session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    /// Pairing code issued, waiting for the scan.
    QrPending { qr: String },
    Connected,
}

/// Observer over connectivity/QR status changes. Injectable so tests can
/// run isolated manager instances.
#[async_trait]
pub trait ConnectionObserver: Send + Sync {
    async fn status_changed(&self, status: &ConnectionStatus);
}
