//! Outbound adapter over the persistent session transport.

use std::sync::Arc;

use {async_trait::async_trait, tracing::debug};

use leadline_channels::{Error, Outbound, Result, SendOutcome, SendPayload};

use crate::socket::Transport;

/// Conversation address domain for direct chats.
const USER_DOMAIN: &str = "s.whatsapp.net";

pub struct SessionOutbound {
    transport: Arc<dyn Transport>,
}

impl SessionOutbound {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

fn to_jid(phone: &str) -> String {
    format!("{phone}@{USER_DOMAIN}")
}

#[async_trait]
impl Outbound for SessionOutbound {
    fn id(&self) -> &'static str {
        "session"
    }

    async fn send(&self, to: &str, payload: &SendPayload) -> SendOutcome {
        let jid = to_jid(to);
        let sent = match payload {
            SendPayload::Text { body } => self.transport.send_text(&jid, body).await,
            SendPayload::MediaReference {
                reference,
                mime,
                caption,
            }
            | SendPayload::MediaLink {
                url: reference,
                mime,
                caption,
            } => {
                self.transport
                    .send_media(&jid, reference, mime, caption.as_deref())
                    .await
            },
            SendPayload::Template { name, .. } => {
                return SendOutcome::failed(format!(
                    "template {name} requires the business api transport"
                ));
            },
        };

        match sent {
            Ok(provider_id) => {
                debug!(to, provider_id, "session send delivered");
                SendOutcome::ok(provider_id)
            },
            Err(e) => SendOutcome::failed(e),
        }
    }

    async fn upload_media(
        &self,
        bytes: &[u8],
        mime: &str,
        filename: Option<&str>,
    ) -> Result<String> {
        self.transport
            .upload_media(bytes, mime, filename)
            .await
            .map_err(|e| Error::External {
                context: "session media upload".into(),
                source: e.into(),
            })
    }
}
