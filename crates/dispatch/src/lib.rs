//! Outbound dispatcher: validate, send, record.
//!
//! Every successful send leaves one outgoing row in the message log so
//! conversation history is complete regardless of which surface (API,
//! auto-reply) initiated it. Failed sends leave no row.

use std::sync::Arc;

use tracing::{debug, warn};

use {
    leadline_channels::{
        LeadDirectory, MessageEvent, MessageEventSink, MessageStore, NewMessage, Outbound,
        SendOutcome, SendPayload,
    },
    leadline_common::{phone::canonical_phone, time::now_epoch},
    leadline_media::MediaStore,
};

/// What a caller hands the dispatcher.
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    /// Ready-to-send payload.
    Payload(SendPayload),
    /// Embedded bytes; validated and registered with the transport first.
    Attachment {
        bytes: Vec<u8>,
        mime: String,
        file_name: Option<String>,
        caption: Option<String>,
    },
}

pub struct Dispatcher {
    outbound: Arc<dyn Outbound>,
    store: Arc<dyn MessageStore>,
    leads: Arc<dyn LeadDirectory>,
    media: Arc<MediaStore>,
    sink: Option<Arc<dyn MessageEventSink>>,
}

impl Dispatcher {
    pub fn new(
        outbound: Arc<dyn Outbound>,
        store: Arc<dyn MessageStore>,
        leads: Arc<dyn LeadDirectory>,
        media: Arc<MediaStore>,
    ) -> Self {
        Self {
            outbound,
            store,
            leads,
            media,
            sink: None,
        }
    }

    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn MessageEventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Send to a recipient address and record the result. Failures come
    /// back as a structured outcome, not an error.
    pub async fn send(&self, to: &str, message: OutboundMessage) -> SendOutcome {
        let phone = canonical_phone(to);
        if phone.is_empty() {
            return SendOutcome::failed("recipient address has no digits");
        }

        let payload = match message {
            OutboundMessage::Payload(payload) => payload,
            OutboundMessage::Attachment {
                bytes,
                mime,
                file_name,
                caption,
            } => {
                if let Err(e) = self.media.validate(&bytes, &mime) {
                    // Rejected before any transport traffic.
                    return SendOutcome::failed(e);
                }
                let reference = match self
                    .outbound
                    .upload_media(&bytes, &mime, file_name.as_deref())
                    .await
                {
                    Ok(reference) => reference,
                    Err(e) => return SendOutcome::failed(e),
                };
                SendPayload::MediaReference {
                    reference,
                    mime,
                    caption,
                }
            },
        };

        let outcome = self.outbound.send(&phone, &payload).await;
        if !outcome.success {
            warn!(
                adapter = self.outbound.id(),
                phone,
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "send failed"
            );
            return outcome;
        }

        self.record(&phone, &payload, &outcome).await;
        outcome
    }

    /// Persist the outgoing row and notify live observers. The send
    /// already happened, so problems here are logged, not returned.
    async fn record(&self, phone: &str, payload: &SendPayload, outcome: &SendOutcome) {
        let lead = self.leads.find_by_phone(phone).await.unwrap_or_else(|e| {
            warn!(phone, error = %e, "lead lookup failed");
            None
        });

        let message_id = outcome
            .provider_message_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let new_message = NewMessage {
            message_id: message_id.clone(),
            phone: phone.to_string(),
            lead_id: lead.map(|l| l.id),
            outgoing: true,
            message_text: payload.history_text(),
            has_media: payload.media_reference().is_some(),
            media_path: payload.media_reference().map(ToString::to_string),
            // Own sends never count as unread.
            is_viewed: true,
            timestamp: now_epoch(),
        };

        if let Err(e) = self.store.insert(new_message).await {
            warn!(message_id, error = %e, "outgoing message not recorded");
            return;
        }
        debug!(adapter = self.outbound.id(), phone, message_id, "sent");

        if let Some(sink) = &self.sink
            && let Ok(Some(message)) = self.store.get(&message_id).await
        {
            sink.emit(MessageEvent::Outbound { message }).await;
        }
    }
}
