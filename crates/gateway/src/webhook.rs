//! Webhook surface for the hosted business transport.
//!
//! The receiver acknowledges with 200 regardless of internal processing
//! outcome so the supplier does not build a retry storm; the only refusals
//! are a bad signature and an unrecognized payload topic.

use {
    axum::{
        Json,
        body::Bytes,
        extract::{Query, State},
        http::StatusCode,
        response::IntoResponse,
    },
    serde::Deserialize,
    tracing::{info, warn},
};

use leadline_whatsapp_business::{
    WebhookPayload, extract_messages, verify_signature, verify_webhook_subscription,
};

use crate::state::AppState;

const WEBHOOK_TOPIC: &str = "whatsapp_business_account";

#[derive(Debug, Deserialize)]
pub struct SubscriptionQuery {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// `GET /webhook` — subscription handshake.
pub async fn verify(
    State(state): State<AppState>,
    Query(query): Query<SubscriptionQuery>,
) -> impl IntoResponse {
    match verify_webhook_subscription(
        query.mode.as_deref(),
        query.verify_token.as_deref(),
        query.challenge.as_deref(),
        &state.webhook.verify_token,
    ) {
        Some(challenge) => {
            info!("webhook subscription verified");
            (StatusCode::OK, challenge).into_response()
        },
        None => {
            warn!("webhook subscription verification failed");
            (StatusCode::FORBIDDEN, "verification failed").into_response()
        },
    }
}

/// `POST /webhook` — event receiver.
pub async fn receive(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let signature = headers
        .get("x-hub-signature-256")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !verify_signature(&body, signature, &state.webhook.app_secret) {
        warn!("webhook signature rejected");
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "success": false, "message": "invalid signature" })),
        );
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            // Unparseable but authentic: ack so the supplier stops resending.
            warn!(error = %e, "unparseable webhook body acknowledged");
            return (
                StatusCode::OK,
                Json(serde_json::json!({ "success": true })),
            );
        },
    };

    if payload.object != WEBHOOK_TOPIC {
        warn!(topic = %payload.object, "unrecognized webhook topic");
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "success": false, "message": "unknown topic" })),
        );
    }

    for raw in extract_messages(payload, state.business_number.as_deref()) {
        if let Err(e) = state.ingest.ingest(state.transport.as_ref(), &raw).await {
            warn!(message_id = %raw.id, error = %e, "webhook ingest failed");
        }
    }

    (StatusCode::OK, Json(serde_json::json!({ "success": true })))
}
