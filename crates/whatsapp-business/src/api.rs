//! Graph-style HTTP send adapter.

use {
    async_trait::async_trait,
    serde_json::{Value, json},
    tracing::{debug, warn},
};

use leadline_channels::{Error, Outbound, Result, SendOutcome, SendPayload};

const DEFAULT_BASE_URL: &str = "https://graph.facebook.com/v19.0";

/// Outbound adapter over the cloud-hosted business API. Stateless per
/// request; no persistent session and no QR pairing.
pub struct BusinessApiOutbound {
    http: reqwest::Client,
    access_token: String,
    phone_number_id: String,
    base_url: String,
}

impl BusinessApiOutbound {
    pub fn new(access_token: impl Into<String>, phone_number_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            access_token: access_token.into(),
            phone_number_id: phone_number_id.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point at a different API root (standin server in tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/{}/messages", self.base_url, self.phone_number_id)
    }

    fn media_url(&self) -> String {
        format!("{}/{}/media", self.base_url, self.phone_number_id)
    }
}

/// Payload field name the API keys media objects under.
fn media_field(mime: &str) -> &'static str {
    match mime.split('/').next().unwrap_or_default() {
        "image" => "image",
        "video" => "video",
        "audio" => "audio",
        _ => "document",
    }
}

/// Platform request body for one send.
fn request_body(to: &str, payload: &SendPayload) -> Value {
    let mut body = json!({
        "messaging_product": "whatsapp",
        "to": to,
    });

    match payload {
        SendPayload::Text { body: text } => {
            body["type"] = json!("text");
            body["text"] = json!({ "body": text });
        },
        SendPayload::MediaLink { url, mime, caption } => {
            let field = media_field(mime);
            let mut media = json!({ "link": url });
            if let Some(caption) = caption {
                media["caption"] = json!(caption);
            }
            body["type"] = json!(field);
            body[field] = media;
        },
        SendPayload::MediaReference {
            reference,
            mime,
            caption,
        } => {
            let field = media_field(mime);
            let mut media = json!({ "id": reference });
            if let Some(caption) = caption {
                media["caption"] = json!(caption);
            }
            body["type"] = json!(field);
            body[field] = media;
        },
        SendPayload::Template {
            name,
            language,
            components,
        } => {
            body["type"] = json!("template");
            body["template"] = json!({
                "name": name,
                "language": { "code": language },
                "components": components,
            });
        },
    }

    body
}

#[async_trait]
impl Outbound for BusinessApiOutbound {
    fn id(&self) -> &'static str {
        "business_api"
    }

    async fn send(&self, to: &str, payload: &SendPayload) -> SendOutcome {
        let body = request_body(to, payload);
        let response = match self
            .http
            .post(self.messages_url())
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(to, error = %e, "business api request failed");
                return SendOutcome::failed(e);
            },
        };

        let status = response.status();
        let reply: Value = match response.json().await {
            Ok(reply) => reply,
            Err(e) => return SendOutcome::failed(e),
        };

        if !status.is_success() {
            let message = reply
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("business api send rejected");
            warn!(to, %status, message, "business api send rejected");
            return SendOutcome::failed(message);
        }

        let provider_id = reply
            .pointer("/messages/0/id")
            .and_then(Value::as_str)
            .unwrap_or_default();
        debug!(to, provider_id, "business api send accepted");
        SendOutcome::ok(provider_id)
    }

    async fn upload_media(
        &self,
        bytes: &[u8],
        mime: &str,
        filename: Option<&str>,
    ) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(bytes.to_vec())
            .file_name(filename.unwrap_or("upload").to_string())
            .mime_str(mime)
            .map_err(|e| Error::invalid_input(format!("bad mime type: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .text("messaging_product", "whatsapp")
            .part("file", part);

        let response = self
            .http
            .post(self.media_url())
            .bearer_auth(&self.access_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::external("business api media upload", e))?;

        let status = response.status();
        let reply: Value = response
            .json()
            .await
            .map_err(|e| Error::external("business api media upload", e))?;

        if !status.is_success() {
            let message = reply
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("media upload rejected");
            return Err(Error::unavailable(message));
        }

        reply
            .get("id")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| Error::unavailable("media upload reply missing id"))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_body_shape() {
        let body = request_body("9876543210", &SendPayload::Text {
            body: "hello".into(),
        });
        assert_eq!(body["messaging_product"], "whatsapp");
        assert_eq!(body["to"], "9876543210");
        assert_eq!(body["type"], "text");
        assert_eq!(body["text"]["body"], "hello");
    }

    #[test]
    fn media_reference_keyed_by_category() {
        let body = request_body("1", &SendPayload::MediaReference {
            reference: "media-9".into(),
            mime: "image/png".into(),
            caption: Some("floor plan".into()),
        });
        assert_eq!(body["type"], "image");
        assert_eq!(body["image"]["id"], "media-9");
        assert_eq!(body["image"]["caption"], "floor plan");
    }

    #[test]
    fn spreadsheet_mime_is_a_document() {
        let body = request_body("1", &SendPayload::MediaLink {
            url: "https://example.com/rates.xlsx".into(),
            mime: "application/vnd.ms-excel".into(),
            caption: None,
        });
        assert_eq!(body["type"], "document");
        assert_eq!(body["document"]["link"], "https://example.com/rates.xlsx");
        assert!(body["document"].get("caption").is_none());
    }

    #[test]
    fn template_body_shape() {
        let body = request_body("1", &SendPayload::Template {
            name: "welcome".into(),
            language: "en_US".into(),
            components: serde_json::json!([]),
        });
        assert_eq!(body["type"], "template");
        assert_eq!(body["template"]["name"], "welcome");
        assert_eq!(body["template"]["language"]["code"], "en_US");
    }
}
