//! Webhook payload shapes, as delivered by the hosted platform.

use serde::Deserialize;

use leadline_whatsapp::events::{MessageContent, RawMessage};

/// Address domain the webhook sender ids are lifted into so inbound
/// processing sees the same shape on both transports.
const USER_DOMAIN: &str = "s.whatsapp.net";

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub object: String,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
pub struct Entry {
    pub id: String,
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
pub struct Change {
    pub field: String,
    pub value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangeValue {
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub messages: Vec<WebhookMessage>,
}

#[derive(Debug, Deserialize)]
pub struct Metadata {
    pub phone_number_id: String,
}

/// One inbound message in platform shape.
#[derive(Debug, Deserialize)]
pub struct WebhookMessage {
    pub from: String,
    pub id: String,
    /// Epoch seconds, delivered as a string.
    pub timestamp: String,
    #[serde(rename = "type")]
    pub message_type: String,
    pub text: Option<TextBody>,
    pub image: Option<MediaBody>,
    pub video: Option<MediaBody>,
    pub audio: Option<MediaBody>,
    pub document: Option<MediaBody>,
}

#[derive(Debug, Deserialize)]
pub struct TextBody {
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct MediaBody {
    pub id: String,
    pub mime_type: String,
    pub caption: Option<String>,
    pub filename: Option<String>,
}

impl WebhookMessage {
    /// Lift into the transport-neutral event shape the ingestion pipeline
    /// consumes. Unknown message types land in `Unsupported` and get
    /// skipped downstream with their reason recorded.
    #[must_use]
    pub fn into_raw(self) -> RawMessage {
        let content = match self.message_type.as_str() {
            "text" => match self.text {
                Some(text) => MessageContent::Text { body: text.body },
                None => MessageContent::Empty,
            },
            "image" => match self.image {
                Some(media) => MessageContent::Image {
                    mime: media.mime_type,
                    caption: media.caption,
                },
                None => MessageContent::Empty,
            },
            "video" => match self.video {
                Some(media) => MessageContent::Video {
                    mime: media.mime_type,
                    caption: media.caption,
                },
                None => MessageContent::Empty,
            },
            "audio" => match self.audio {
                Some(media) => MessageContent::Audio {
                    mime: media.mime_type,
                },
                None => MessageContent::Empty,
            },
            "document" => match self.document {
                Some(media) => MessageContent::Document {
                    mime: media.mime_type,
                    caption: media.caption,
                    file_name: media.filename,
                },
                None => MessageContent::Empty,
            },
            "reaction" => MessageContent::Reaction,
            _ => MessageContent::Unsupported,
        };

        let jid = format!("{}@{USER_DOMAIN}", self.from);
        RawMessage {
            id: self.id,
            chat_jid: jid.clone(),
            sender_jid: jid,
            from_me: false,
            timestamp: self.timestamp.parse().unwrap_or_default(),
            content,
        }
    }
}
