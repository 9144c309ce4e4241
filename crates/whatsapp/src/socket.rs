//! WebSocket transport to the network bridge.

use std::{collections::HashMap, sync::Arc, time::Duration};

use {
    anyhow::{Context, Result, bail},
    async_trait::async_trait,
    futures::{SinkExt, StreamExt},
    tokio::sync::{Mutex, mpsc, oneshot},
    tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage},
    tracing::{debug, warn},
};

use crate::events::{BridgeCommand, BridgeEvent};

/// How long a request-bearing command waits for its response.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport seam over the bridge socket, mockable in tests.
///
/// `connect` yields the event stream of one session; it may be called again
/// after the stream ends (reconnection). Request-bearing operations
/// (download/upload) are correlated by request id.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(
        &self,
        creds: Option<serde_json::Value>,
    ) -> Result<mpsc::Receiver<BridgeEvent>>;

    async fn send_command(&self, command: BridgeCommand) -> Result<()>;

    /// Fetch the binary payload of a delivered media message.
    async fn download_media(&self, message_id: &str) -> Result<Vec<u8>>;

    /// Register bytes with the transport; returns the media reference.
    async fn upload_media(&self, bytes: &[u8], mime: &str, filename: Option<&str>)
    -> Result<String>;

    /// Send a message, returning the provider-assigned message id.
    async fn send_text(&self, to_jid: &str, body: &str) -> Result<String>;

    async fn send_media(
        &self,
        to_jid: &str,
        reference: &str,
        mime: &str,
        caption: Option<&str>,
    ) -> Result<String>;
}

type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<BridgeEvent>>>>;
type WsSink = futures::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    WsMessage,
>;

/// Production transport: one WebSocket connection to the bridge process.
pub struct BridgeSocket {
    url: String,
    writer: Arc<Mutex<Option<WsSink>>>,
    pending: PendingMap,
}

impl BridgeSocket {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            writer: Arc::new(Mutex::new(None)),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn write(&self, command: &BridgeCommand) -> Result<()> {
        let payload = serde_json::to_string(command)?;
        let mut writer = self.writer.lock().await;
        let Some(sink) = writer.as_mut() else {
            bail!("bridge socket not connected");
        };
        sink.send(WsMessage::Text(payload.into()))
            .await
            .context("write to bridge socket")?;
        Ok(())
    }

    /// Send a request-bearing command and await its correlated response.
    async fn request(&self, request_id: String, command: BridgeCommand) -> Result<BridgeEvent> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(request_id.clone(), tx);

        if let Err(e) = self.write(&command).await {
            self.pending.lock().await.remove(&request_id);
            return Err(e);
        }

        match tokio::time::timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(event)) => Ok(event),
            Ok(Err(_)) => bail!("bridge dropped request {request_id}"),
            Err(_) => {
                self.pending.lock().await.remove(&request_id);
                bail!("bridge request {request_id} timed out")
            },
        }
    }

    fn response_data(event: BridgeEvent) -> Result<serde_json::Value> {
        match event {
            BridgeEvent::Response {
                ok: true, data, ..
            } => Ok(data.unwrap_or(serde_json::Value::Null)),
            BridgeEvent::Response { error, .. } => {
                bail!(error.unwrap_or_else(|| "bridge request failed".into()))
            },
            other => bail!("unexpected bridge reply: {other:?}"),
        }
    }
}

#[async_trait]
impl Transport for BridgeSocket {
    async fn connect(
        &self,
        creds: Option<serde_json::Value>,
    ) -> Result<mpsc::Receiver<BridgeEvent>> {
        let (stream, _) = connect_async(&self.url)
            .await
            .with_context(|| format!("connect to bridge at {}", self.url))?;
        let (sink, mut source) = stream.split();
        *self.writer.lock().await = Some(sink);

        let (tx, rx) = mpsc::channel(64);
        let pending = Arc::clone(&self.pending);

        tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                let text = match frame {
                    Ok(WsMessage::Text(text)) => text,
                    Ok(WsMessage::Close(_)) | Err(_) => break,
                    Ok(_) => continue,
                };
                let event: BridgeEvent = match serde_json::from_str(&text) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(error = %e, "unparseable bridge frame");
                        continue;
                    },
                };

                // Correlated responses resolve their waiter; everything
                // else flows to the session event stream.
                if let BridgeEvent::Response { request_id, .. } = &event {
                    let waiter = pending.lock().await.remove(request_id);
                    if let Some(waiter) = waiter {
                        let _ = waiter.send(event);
                        continue;
                    }
                    debug!(%request_id, "response with no waiter");
                    continue;
                }

                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        self.write(&BridgeCommand::Login { creds }).await?;
        Ok(rx)
    }

    async fn send_command(&self, command: BridgeCommand) -> Result<()> {
        self.write(&command).await
    }

    async fn download_media(&self, message_id: &str) -> Result<Vec<u8>> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let reply = self
            .request(request_id.clone(), BridgeCommand::DownloadMedia {
                request_id,
                message_id: message_id.to_string(),
            })
            .await?;
        let data = Self::response_data(reply)?;
        let encoded = data
            .get("data")
            .and_then(|v| v.as_str())
            .context("media download reply missing data")?;
        use base64::Engine as _;
        Ok(base64::engine::general_purpose::STANDARD.decode(encoded)?)
    }

    async fn upload_media(
        &self,
        bytes: &[u8],
        mime: &str,
        filename: Option<&str>,
    ) -> Result<String> {
        use base64::Engine as _;
        let request_id = uuid::Uuid::new_v4().to_string();
        let reply = self
            .request(request_id.clone(), BridgeCommand::UploadMedia {
                request_id,
                data: base64::engine::general_purpose::STANDARD.encode(bytes),
                mime: mime.to_string(),
                filename: filename.map(ToString::to_string),
            })
            .await?;
        let data = Self::response_data(reply)?;
        data.get("reference")
            .and_then(|v| v.as_str())
            .map(ToString::to_string)
            .context("media upload reply missing reference")
    }

    async fn send_text(&self, to_jid: &str, body: &str) -> Result<String> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let reply = self
            .request(request_id.clone(), BridgeCommand::SendText {
                request_id,
                to_jid: to_jid.to_string(),
                body: body.to_string(),
            })
            .await?;
        let data = Self::response_data(reply)?;
        Ok(data
            .get("message_id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string())
    }

    async fn send_media(
        &self,
        to_jid: &str,
        reference: &str,
        mime: &str,
        caption: Option<&str>,
    ) -> Result<String> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let reply = self
            .request(request_id.clone(), BridgeCommand::SendMedia {
                request_id,
                to_jid: to_jid.to_string(),
                reference: reference.to_string(),
                mime: mime.to_string(),
                caption: caption.map(ToString::to_string),
            })
            .await?;
        let data = Self::response_data(reply)?;
        Ok(data
            .get("message_id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string())
    }
}
