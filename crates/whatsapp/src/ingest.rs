//! Inbound event ingestion: classify, fetch media, persist idempotently.
//!
//! Every raw event becomes exactly one persisted message or a documented
//! skip. Duplicate deliveries are reported as success. Auto-reply dispatch
//! happens after the inbound message is persisted and never rolls it back.

use std::sync::Arc;

use {
    anyhow::Result,
    async_trait::async_trait,
    tracing::{debug, warn},
};

use {
    leadline_channels::{
        InsertOutcome, Lead, LeadDirectory, MessageEvent, MessageEventSink, MessageStore,
        NewMessage,
    },
    leadline_common::phone::{
        canonical_phone, is_broadcast_address, is_group_address, is_linked_device_address,
    },
    leadline_media::MediaStore,
};

use crate::{
    events::{MessageContent, RawMessage},
    socket::Transport,
};

/// Why an event was not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Event carries no content body.
    NoContent,
    /// Targets the broadcast/status pseudo-address.
    Broadcast,
    /// Protocol/control payload, not user content.
    ProtocolContent,
    /// Duplicate delivery path via the linked-device namespace.
    LinkedDevice,
    /// Group conversations are out of scope.
    GroupChat,
    /// Content kind the bridge could not map.
    Unsupported,
    /// Media fetch failed and there was no caption to fall back to.
    MediaUnavailable,
}

/// Result of ingesting one raw event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Persisted,
    /// The message id was already in the log; success, not an error.
    Duplicate,
    Skipped(SkipReason),
}

/// Invoked after an inbound text message is persisted; may issue one
/// outbound send before ingestion returns. The concrete implementation
/// wires the auto-reply engine to the outbound dispatcher.
#[async_trait]
pub trait ReplyHook: Send + Sync {
    async fn on_inbound(&self, phone: &str, lead: Option<&Lead>, text: &str) -> Result<()>;
}

struct MediaMeta {
    mime: String,
    file_name: Option<String>,
}

enum Classified {
    Skip(SkipReason),
    Content {
        text: String,
        media: Option<MediaMeta>,
    },
}

pub struct IngestPipeline {
    store: Arc<dyn MessageStore>,
    media: Arc<MediaStore>,
    leads: Arc<dyn LeadDirectory>,
    reply_hook: Option<Arc<dyn ReplyHook>>,
    sink: Option<Arc<dyn MessageEventSink>>,
}

impl IngestPipeline {
    pub fn new(
        store: Arc<dyn MessageStore>,
        media: Arc<MediaStore>,
        leads: Arc<dyn LeadDirectory>,
    ) -> Self {
        Self {
            store,
            media,
            leads,
            reply_hook: None,
            sink: None,
        }
    }

    #[must_use]
    pub fn with_reply_hook(mut self, hook: Arc<dyn ReplyHook>) -> Self {
        self.reply_hook = Some(hook);
        self
    }

    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn MessageEventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Ingest one raw event. Media download and disk writes are awaited
    /// per-message, which serializes processing within a delivered batch.
    pub async fn ingest(
        &self,
        transport: &dyn Transport,
        raw: &RawMessage,
    ) -> Result<IngestOutcome> {
        if let Some(reason) = skip_reason(raw) {
            debug!(message_id = %raw.id, ?reason, "event skipped");
            return Ok(IngestOutcome::Skipped(reason));
        }

        let (mut text, media) = match classify(&raw.content) {
            Classified::Skip(reason) => {
                debug!(message_id = %raw.id, ?reason, "event skipped");
                return Ok(IngestOutcome::Skipped(reason));
            },
            Classified::Content { text, media } => (text, media),
        };

        // Fetch and store the binary payload before persistence; a failed
        // fetch degrades to the text-only portion when a caption exists.
        let mut media_path = None;
        if let Some(meta) = media {
            match self.fetch_media(transport, raw, &meta).await {
                Ok(path) => media_path = Some(path),
                Err(e) => {
                    if text.trim().is_empty() {
                        warn!(message_id = %raw.id, error = %e, "media unavailable, nothing to persist");
                        return Ok(IngestOutcome::Skipped(SkipReason::MediaUnavailable));
                    }
                    warn!(message_id = %raw.id, error = %e, "media unavailable, persisting caption only");
                },
            }
        }

        let counterpart = if raw.from_me {
            &raw.chat_jid
        } else {
            &raw.sender_jid
        };
        let phone = canonical_phone(counterpart);

        let lead = self
            .leads
            .find_by_phone(&phone)
            .await
            .unwrap_or_else(|e| {
                warn!(phone, error = %e, "lead lookup failed");
                None
            });

        if text.is_empty() && media_path.is_none() {
            return Ok(IngestOutcome::Skipped(SkipReason::NoContent));
        }
        if media_path.is_none() {
            text = text.trim().to_string();
        }

        let new_message = NewMessage {
            message_id: raw.id.clone(),
            phone: phone.clone(),
            lead_id: lead.as_ref().map(|l| l.id.clone()),
            outgoing: raw.from_me,
            message_text: text.clone(),
            has_media: media_path.is_some(),
            media_path: media_path.clone(),
            // Own messages are self-viewed.
            is_viewed: raw.from_me,
            timestamp: raw.timestamp,
        };

        let outcome = match self.store.insert(new_message).await {
            Ok(outcome) => outcome,
            Err(e) => {
                // The file exists but no index entry will: compensate.
                if let Some(path) = &media_path {
                    self.media.remove(path).await;
                }
                return Err(e.into());
            },
        };

        if outcome == InsertOutcome::Duplicate {
            debug!(message_id = %raw.id, "duplicate delivery reported as success");
            return Ok(IngestOutcome::Duplicate);
        }

        if let Some(sink) = &self.sink
            && let Ok(Some(message)) = self.store.get(&raw.id).await
        {
            sink.emit(MessageEvent::Inbound { message }).await;
        }

        // Downstream reply failure is an independent outcome; the inbound
        // message stays persisted either way.
        if !raw.from_me
            && !text.is_empty()
            && let Some(hook) = &self.reply_hook
            && let Err(e) = hook.on_inbound(&phone, lead.as_ref(), &text).await
        {
            warn!(phone, error = %e, "auto-reply dispatch failed");
        }

        Ok(IngestOutcome::Persisted)
    }

    async fn fetch_media(
        &self,
        transport: &dyn Transport,
        raw: &RawMessage,
        meta: &MediaMeta,
    ) -> Result<String> {
        let bytes = transport.download_media(&raw.id).await?;
        Ok(self
            .media
            .store(&bytes, &meta.mime, meta.file_name.as_deref())
            .await?)
    }
}

/// Ordered skip rules over the event envelope.
fn skip_reason(raw: &RawMessage) -> Option<SkipReason> {
    if matches!(raw.content, MessageContent::Empty) {
        return Some(SkipReason::NoContent);
    }
    if is_broadcast_address(&raw.chat_jid) || is_broadcast_address(&raw.sender_jid) {
        return Some(SkipReason::Broadcast);
    }
    if raw.content.is_control() {
        return Some(SkipReason::ProtocolContent);
    }
    if is_linked_device_address(&raw.sender_jid) {
        return Some(SkipReason::LinkedDevice);
    }
    if is_group_address(&raw.chat_jid) || is_group_address(&raw.sender_jid) {
        return Some(SkipReason::GroupChat);
    }
    None
}

/// Map each content kind to its extracted text and media flag.
fn classify(content: &MessageContent) -> Classified {
    match content {
        MessageContent::Empty => Classified::Skip(SkipReason::NoContent),
        MessageContent::Text { body } | MessageContent::ExtendedText { body } => {
            Classified::Content {
                text: body.clone(),
                media: None,
            }
        },
        MessageContent::Image { mime, caption } | MessageContent::Video { mime, caption } => {
            Classified::Content {
                text: caption.clone().unwrap_or_default(),
                media: Some(MediaMeta {
                    mime: mime.clone(),
                    file_name: None,
                }),
            }
        },
        MessageContent::Audio { mime } => Classified::Content {
            text: String::new(),
            media: Some(MediaMeta {
                mime: mime.clone(),
                file_name: None,
            }),
        },
        MessageContent::Document {
            mime,
            caption,
            file_name,
        } => Classified::Content {
            text: caption.clone().unwrap_or_default(),
            media: Some(MediaMeta {
                mime: mime.clone(),
                file_name: file_name.clone(),
            }),
        },
        MessageContent::Protocol | MessageContent::Reaction => {
            Classified::Skip(SkipReason::ProtocolContent)
        },
        MessageContent::Unsupported => Classified::Skip(SkipReason::Unsupported),
    }
}
