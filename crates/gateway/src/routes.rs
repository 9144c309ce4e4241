//! Query/mutation surface over the message log and the send path.
//!
//! Every endpoint answers the uniform `{success, data|message}` shape.

use {
    axum::{
        Json,
        extract::{Path, Query, State},
        http::{HeaderMap, StatusCode},
        response::IntoResponse,
    },
    serde::Deserialize,
    serde_json::{Value, json},
    tracing::warn,
};

use {
    base64::Engine as _,
    leadline_channels::{
        ConnectionStatus, Direction, Error, MessageFilter, Page, SendPayload, ThreadKey,
    },
    leadline_common::phone::canonical_phone,
    leadline_dispatch::OutboundMessage,
    leadline_threads::ThreadQuery,
};

use crate::{caller::caller_from_headers, state::AppState};

fn ok(data: impl serde::Serialize) -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "success": true, "data": data })))
}

fn fail(status: StatusCode, message: impl std::fmt::Display) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({ "success": false, "message": message.to_string() })),
    )
}

fn error_response(e: &Error) -> (StatusCode, Json<Value>) {
    let status = match e {
        Error::InvalidInput { .. } => StatusCode::BAD_REQUEST,
        Error::NotFound { .. } => StatusCode::NOT_FOUND,
        Error::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        Error::External { .. } | Error::SerdeJson(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    fail(status, e)
}

#[derive(Debug, Deserialize)]
pub struct ThreadsQuery {
    #[serde(default)]
    unread_only: bool,
    search: Option<String>,
    officer: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
}

fn page_from(page: Option<u32>, limit: Option<u32>) -> Page {
    let default = Page::default();
    Page {
        page: page.unwrap_or(default.page).max(1),
        limit: limit.unwrap_or(default.limit).clamp(1, 100),
    }
}

/// `GET /api/threads`
pub async fn list_threads(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ThreadsQuery>,
) -> impl IntoResponse {
    let caller = caller_from_headers(&headers);
    let thread_query = ThreadQuery {
        unread_only: query.unread_only,
        search: query.search,
        officer_id: query.officer,
        page: page_from(query.page, query.limit),
    };
    match state.threads.list(&caller, &thread_query).await {
        Ok(page) => ok(page),
        Err(e) => {
            warn!(error = %e, "thread listing failed");
            error_response(&e)
        },
    }
}

/// `PUT /api/threads/{key}/viewed` — key is `lead:<id>` or a phone.
pub async fn mark_thread_viewed(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    let key = match key.strip_prefix("lead:") {
        Some(lead_id) => ThreadKey::Lead(lead_id.to_string()),
        None => ThreadKey::Phone(canonical_phone(&key)),
    };
    match state.store.mark_thread_viewed(&key).await {
        Ok(marked) => ok(json!({ "marked": marked })),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    phone: Option<String>,
    direction: Option<String>,
    is_viewed: Option<bool>,
    has_media: Option<bool>,
    search: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
}

/// `GET /api/messages`
pub async fn list_messages(
    State(state): State<AppState>,
    Query(query): Query<MessagesQuery>,
) -> impl IntoResponse {
    let direction = match query.direction.as_deref() {
        None => None,
        Some(raw) => match Direction::parse(raw) {
            Some(direction) => Some(direction),
            None => {
                return fail(
                    StatusCode::BAD_REQUEST,
                    format!("unknown direction: {raw}"),
                );
            },
        },
    };

    let filter = MessageFilter {
        phone: query.phone.as_deref().map(canonical_phone),
        direction,
        is_viewed: query.is_viewed,
        has_media: query.has_media,
        search: query.search,
    };
    let page = page_from(query.page, query.limit);

    match state.store.list(&filter, page).await {
        Ok((messages, total)) => ok(json!({
            "messages": messages,
            "total": total,
            "page": page.page,
            "limit": page.limit,
        })),
        Err(e) => error_response(&e),
    }
}

/// `GET /api/messages/stats`
pub async fn message_stats(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.stats().await {
        Ok(stats) => ok(stats),
        Err(e) => error_response(&e),
    }
}

/// `GET /api/messages/{id}`
pub async fn get_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get(&id).await {
        Ok(Some(message)) => ok(message),
        Ok(None) => fail(StatusCode::NOT_FOUND, "message not found"),
        Err(e) => error_response(&e),
    }
}

/// `PUT /api/messages/{id}/viewed`
pub async fn mark_message_viewed(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.mark_viewed(&id).await {
        Ok(true) => ok(json!({ "message_id": id })),
        Ok(false) => fail(StatusCode::NOT_FOUND, "message not found"),
        Err(e) => error_response(&e),
    }
}

/// `DELETE /api/messages/{id}`
pub async fn delete_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.delete(&id).await {
        Ok(true) => ok(json!({ "message_id": id })),
        Ok(false) => fail(StatusCode::NOT_FOUND, "message not found"),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
pub struct AttachmentRequest {
    /// Base64-encoded bytes.
    pub data: String,
    pub mime_type: String,
    pub file_name: Option<String>,
    pub caption: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub phone: String,
    pub message: Option<String>,
    pub attachment: Option<AttachmentRequest>,
}

/// `POST /api/send` — plain text or one embedded attachment.
pub async fn send(
    State(state): State<AppState>,
    Json(request): Json<SendRequest>,
) -> impl IntoResponse {
    let message = match (request.message, request.attachment) {
        (_, Some(attachment)) => {
            let bytes = match base64::engine::general_purpose::STANDARD.decode(&attachment.data) {
                Ok(bytes) => bytes,
                Err(e) => {
                    return fail(
                        StatusCode::BAD_REQUEST,
                        format!("attachment is not valid base64: {e}"),
                    );
                },
            };
            OutboundMessage::Attachment {
                bytes,
                mime: attachment.mime_type,
                file_name: attachment.file_name,
                caption: attachment.caption,
            }
        },
        (Some(text), None) if !text.trim().is_empty() => {
            OutboundMessage::Payload(SendPayload::Text { body: text })
        },
        _ => return fail(StatusCode::BAD_REQUEST, "message or attachment required"),
    };

    let outcome = state.dispatcher.send(&request.phone, message).await;
    if outcome.success {
        ok(json!({ "provider_message_id": outcome.provider_message_id }))
    } else {
        fail(
            StatusCode::BAD_REQUEST,
            outcome.error.unwrap_or_else(|| "send failed".into()),
        )
    }
}

/// `GET /api/connection`
pub async fn connection_status(State(state): State<AppState>) -> impl IntoResponse {
    let Some(manager) = &state.manager else {
        return ok(json!({
            "status": ConnectionStatus::Disconnected,
            "qr": Value::Null,
            "connected_since": Value::Null,
        }));
    };
    ok(json!({
        "status": manager.status().await,
        "qr": manager.qr_code().await,
        "connected_since": manager.connected_since().await,
    }))
}
