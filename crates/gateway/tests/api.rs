//! End-to-end API tests over the in-process router.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{collections::HashMap, sync::Arc};

use {
    async_trait::async_trait,
    axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
    },
    hmac::{Hmac, Mac},
    http_body_util::BodyExt,
    serde_json::{Value, json},
    sha2::Sha256,
    sqlx::SqlitePool,
    tokio::sync::mpsc,
    tower::ServiceExt,
};

use {
    base64::Engine as _,
    leadline_channels::{
        Lead, LeadDirectory, MessageStore, NewMessage, Officer, OfficerDirectory, Outbound,
        Result as ChannelResult, SendOutcome, SendPayload,
    },
    leadline_config::WebhookConfig,
    leadline_dispatch::Dispatcher,
    leadline_gateway::{AppState, router},
    leadline_media::MediaStore,
    leadline_store::SqliteMessageStore,
    leadline_threads::ThreadAggregator,
    leadline_whatsapp::{
        IngestPipeline, Transport,
        events::{BridgeCommand, BridgeEvent},
    },
};

const APP_SECRET: &str = "test-app-secret";
const VERIFY_TOKEN: &str = "test-verify-token";
const BUSINESS_NUMBER: &str = "biz-number-1";

struct StaticLeads(Vec<Lead>);

#[async_trait]
impl LeadDirectory for StaticLeads {
    async fn find_by_phone(&self, phone: &str) -> ChannelResult<Option<Lead>> {
        Ok(self.0.iter().find(|l| l.phone == phone).cloned())
    }

    async fn get(&self, lead_id: &str) -> ChannelResult<Option<Lead>> {
        Ok(self.0.iter().find(|l| l.id == lead_id).cloned())
    }
}

struct StaticOfficers(HashMap<String, Officer>);

#[async_trait]
impl OfficerDirectory for StaticOfficers {
    async fn get(&self, officer_id: &str) -> ChannelResult<Option<Officer>> {
        Ok(self.0.get(officer_id).cloned())
    }
}

/// Transport with no live bridge: downloads fail, sends succeed.
struct OfflineTransport;

#[async_trait]
impl Transport for OfflineTransport {
    async fn connect(
        &self,
        _creds: Option<Value>,
    ) -> anyhow::Result<mpsc::Receiver<BridgeEvent>> {
        anyhow::bail!("offline")
    }

    async fn send_command(&self, _command: BridgeCommand) -> anyhow::Result<()> {
        Ok(())
    }

    async fn download_media(&self, _message_id: &str) -> anyhow::Result<Vec<u8>> {
        anyhow::bail!("offline")
    }

    async fn upload_media(
        &self,
        _bytes: &[u8],
        _mime: &str,
        _filename: Option<&str>,
    ) -> anyhow::Result<String> {
        anyhow::bail!("offline")
    }

    async fn send_text(&self, _to_jid: &str, _body: &str) -> anyhow::Result<String> {
        Ok("provider-1".into())
    }

    async fn send_media(
        &self,
        _to_jid: &str,
        _reference: &str,
        _mime: &str,
        _caption: Option<&str>,
    ) -> anyhow::Result<String> {
        Ok("provider-1".into())
    }
}

struct FakeOutbound;

#[async_trait]
impl Outbound for FakeOutbound {
    fn id(&self) -> &'static str {
        "fake"
    }

    async fn send(&self, _to: &str, _payload: &SendPayload) -> SendOutcome {
        SendOutcome::ok("provider-1")
    }

    async fn upload_media(
        &self,
        _bytes: &[u8],
        _mime: &str,
        _filename: Option<&str>,
    ) -> ChannelResult<String> {
        Ok("media-ref-1".into())
    }
}

struct Harness {
    app: Router,
    store: Arc<SqliteMessageStore>,
    media_dir: tempfile::TempDir,
}

async fn harness() -> Harness {
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    SqliteMessageStore::init(&pool).await.unwrap();
    let store = Arc::new(SqliteMessageStore::new(pool));

    let leads: Arc<dyn LeadDirectory> = Arc::new(StaticLeads(vec![
        Lead {
            id: "l1".into(),
            name: "Amira".into(),
            phone: "111".into(),
            assigned_officer: Some("o1".into()),
        },
        Lead {
            id: "l2".into(),
            name: "Basim".into(),
            phone: "222".into(),
            assigned_officer: Some("o2".into()),
        },
    ]));
    let officers: Arc<dyn OfficerDirectory> = Arc::new(StaticOfficers(
        [
            ("o1".to_string(), Officer {
                id: "o1".into(),
                name: "Officer One".into(),
            }),
            ("o2".to_string(), Officer {
                id: "o2".into(),
                name: "Officer Two".into(),
            }),
        ]
        .into_iter()
        .collect(),
    ));

    let media_dir = tempfile::tempdir().unwrap();
    let media = Arc::new(MediaStore::new(media_dir.path()));
    let transport: Arc<dyn Transport> = Arc::new(OfflineTransport);

    let ingest = Arc::new(IngestPipeline::new(
        store.clone(),
        media.clone(),
        leads.clone(),
    ));
    let threads = Arc::new(ThreadAggregator::new(
        store.clone(),
        leads.clone(),
        officers,
    ));
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(FakeOutbound),
        store.clone(),
        leads,
        media.clone(),
    ));

    let state = AppState {
        store: store.clone(),
        threads,
        dispatcher,
        media,
        ingest,
        transport,
        manager: None,
        webhook: WebhookConfig {
            verify_token: VERIFY_TOKEN.into(),
            app_secret: APP_SECRET.into(),
        },
        business_number: Some(BUSINESS_NUMBER.into()),
    };

    Harness {
        app: router(state),
        store,
        media_dir,
    }
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| json!(String::from_utf8_lossy(&bytes).to_string()));
    (status, value)
}

fn sign(body: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(APP_SECRET.as_bytes()).unwrap();
    mac.update(body.as_bytes());
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

fn inbound(message_id: &str, phone: &str, lead_id: Option<&str>, text: &str) -> NewMessage {
    NewMessage {
        message_id: message_id.into(),
        phone: phone.into(),
        lead_id: lead_id.map(Into::into),
        outgoing: false,
        message_text: text.into(),
        has_media: false,
        media_path: None,
        is_viewed: false,
        timestamp: 100,
    }
}

#[tokio::test]
async fn webhook_subscription_echoes_challenge() {
    let h = harness().await;
    let (status, body) = call(
        &h.app,
        "GET",
        &format!("/webhook?hub.mode=subscribe&hub.verify_token={VERIFY_TOKEN}&hub.challenge=c123"),
        &[],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("c123"));

    let (status, _) = call(
        &h.app,
        "GET",
        "/webhook?hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=c123",
        &[],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn webhook_rejects_bad_signature() {
    let h = harness().await;
    let (status, body) = call(
        &h.app,
        "POST",
        "/webhook",
        &[("x-hub-signature-256", "sha256=deadbeef")],
        Some(json!({ "object": "whatsapp_business_account", "entry": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn webhook_rejects_unknown_topic() {
    let h = harness().await;
    let payload = json!({ "object": "instagram", "entry": [] }).to_string();
    let signature = sign(&payload);

    let (status, _) = call(
        &h.app,
        "POST",
        "/webhook",
        &[("x-hub-signature-256", signature.as_str())],
        Some(serde_json::from_str(&payload).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn signed_webhook_message_lands_in_the_log() {
    let h = harness().await;
    let payload = json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "e1",
            "changes": [{
                "field": "messages",
                "value": {
                    "metadata": { "phone_number_id": BUSINESS_NUMBER },
                    "messages": [{
                        "from": "111",
                        "id": "wamid.T1",
                        "timestamp": "1700000000",
                        "type": "text",
                        "text": { "body": "hello from webhook" }
                    }]
                }
            }]
        }]
    })
    .to_string();
    let signature = sign(&payload);

    let (status, body) = call(
        &h.app,
        "POST",
        "/webhook",
        &[("x-hub-signature-256", signature.as_str())],
        Some(serde_json::from_str(&payload).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));

    let message = h.store.get("wamid.T1").await.unwrap().unwrap();
    assert_eq!(message.message_text, "hello from webhook");
    assert_eq!(message.lead_id.as_deref(), Some("l1"));
}

#[tokio::test]
async fn webhook_for_another_business_number_is_acked_but_dropped() {
    let h = harness().await;
    let payload = json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "e1",
            "changes": [{
                "field": "messages",
                "value": {
                    "metadata": { "phone_number_id": "someone-elses-number" },
                    "messages": [{
                        "from": "111",
                        "id": "wamid.T2",
                        "timestamp": "1700000000",
                        "type": "text",
                        "text": { "body": "wrong account" }
                    }]
                }
            }]
        }]
    })
    .to_string();
    let signature = sign(&payload);

    let (status, body) = call(
        &h.app,
        "POST",
        "/webhook",
        &[("x-hub-signature-256", signature.as_str())],
        Some(serde_json::from_str(&payload).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert!(h.store.get("wamid.T2").await.unwrap().is_none());
}

#[tokio::test]
async fn send_text_returns_provider_id_and_records() {
    let h = harness().await;
    let (status, body) = call(
        &h.app,
        "POST",
        "/api/send",
        &[],
        Some(json!({ "phone": "111", "message": "hello there" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["provider_message_id"], json!("provider-1"));

    let message = h.store.get("provider-1").await.unwrap().unwrap();
    assert!(message.outgoing);
    assert!(message.is_viewed);
}

#[tokio::test]
async fn oversized_attachment_is_a_validation_failure() {
    let h = harness().await;
    let data = base64::engine::general_purpose::STANDARD.encode(vec![0u8; 21 * 1024 * 1024]);

    let (status, body) = call(
        &h.app,
        "POST",
        "/api/send",
        &[],
        Some(json!({
            "phone": "111",
            "attachment": { "data": data, "mime_type": "image/jpeg" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));

    // Neither a message row nor a file.
    let (_, listing) = call(&h.app, "GET", "/api/messages", &[], None).await;
    assert_eq!(listing["data"]["total"], json!(0));
    assert!(
        std::fs::read_dir(h.media_dir.path())
            .unwrap()
            .next()
            .is_none()
    );
}

#[tokio::test]
async fn empty_send_request_is_rejected() {
    let h = harness().await;
    let (status, _) = call(
        &h.app,
        "POST",
        "/api/send",
        &[],
        Some(json!({ "phone": "111" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn thread_listing_respects_caller_headers() {
    let h = harness().await;
    h.store.insert(inbound("m1", "111", Some("l1"), "a")).await.unwrap();
    h.store.insert(inbound("m2", "222", Some("l2"), "b")).await.unwrap();

    let (_, body) = call(
        &h.app,
        "GET",
        "/api/threads",
        &[("x-caller-admin", "true")],
        None,
    )
    .await;
    assert_eq!(body["data"]["total"], json!(2));

    let (_, body) = call(
        &h.app,
        "GET",
        "/api/threads",
        &[("x-caller-officer", "o1")],
        None,
    )
    .await;
    assert_eq!(body["data"]["total"], json!(1));
    assert_eq!(body["data"]["threads"][0]["phone"], json!("111"));

    // No identity headers at all: nothing is visible.
    let (_, body) = call(&h.app, "GET", "/api/threads", &[], None).await;
    assert_eq!(body["data"]["total"], json!(0));
}

#[tokio::test]
async fn mark_thread_viewed_clears_unread_listing() {
    let h = harness().await;
    h.store.insert(inbound("m1", "333", None, "x")).await.unwrap();
    h.store.insert(inbound("m2", "333", None, "y")).await.unwrap();

    let (_, body) = call(
        &h.app,
        "GET",
        "/api/threads?unread_only=true",
        &[("x-caller-admin", "true")],
        None,
    )
    .await;
    assert_eq!(body["data"]["total"], json!(1));
    assert_eq!(body["data"]["unread_messages"], json!(2));

    let (status, body) = call(&h.app, "PUT", "/api/threads/333/viewed", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["marked"], json!(2));

    let (_, body) = call(
        &h.app,
        "GET",
        "/api/threads?unread_only=true",
        &[("x-caller-admin", "true")],
        None,
    )
    .await;
    assert_eq!(body["data"]["total"], json!(0));
}

#[tokio::test]
async fn message_crud_round_trip() {
    let h = harness().await;
    h.store.insert(inbound("m1", "111", Some("l1"), "hello")).await.unwrap();

    let (status, body) = call(&h.app, "GET", "/api/messages/m1", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["message_text"], json!("hello"));

    let (status, _) = call(&h.app, "PUT", "/api/messages/m1/viewed", &[], None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call(&h.app, "GET", "/api/messages/m1", &[], None).await;
    assert_eq!(body["data"]["is_viewed"], json!(true));

    let (status, _) = call(&h.app, "DELETE", "/api/messages/m1", &[], None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&h.app, "GET", "/api/messages/m1", &[], None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stats_and_filtered_listing() {
    let h = harness().await;
    h.store.insert(inbound("m1", "111", Some("l1"), "question")).await.unwrap();
    let mut outgoing = inbound("m2", "111", Some("l1"), "answer");
    outgoing.outgoing = true;
    outgoing.is_viewed = true;
    h.store.insert(outgoing).await.unwrap();

    let (_, body) = call(&h.app, "GET", "/api/messages/stats", &[], None).await;
    assert_eq!(body["data"]["total"], json!(2));
    assert_eq!(body["data"]["inbound"], json!(1));
    assert_eq!(body["data"]["outbound"], json!(1));

    let (_, body) = call(
        &h.app,
        "GET",
        "/api/messages?direction=outbound",
        &[],
        None,
    )
    .await;
    assert_eq!(body["data"]["total"], json!(1));
    assert_eq!(
        body["data"]["messages"][0]["message_text"],
        json!("answer")
    );

    let (status, _) = call(&h.app, "GET", "/api/messages?direction=sideways", &[], None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn connection_endpoint_without_a_session_manager() {
    let h = harness().await;
    let (status, body) = call(&h.app, "GET", "/api/connection", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"]["state"], json!("disconnected"));
    assert_eq!(body["data"]["qr"], Value::Null);
}
