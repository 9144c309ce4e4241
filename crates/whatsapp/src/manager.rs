//! Connection lifecycle: pairing, reconnection, terminal failures.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU32, Ordering},
};

use {
    anyhow::Result,
    tokio::sync::{RwLock, mpsc},
    tracing::{error, info, warn},
};

use {
    leadline_channels::{ConnectionObserver, ConnectionStatus},
    leadline_common::time::now_epoch,
};

use crate::{
    creds::CredentialStore,
    events::{BridgeCommand, BridgeEvent, CLOSE_LOGGED_OUT, CLOSE_SESSION_CONFLICT},
    ingest::IngestPipeline,
    socket::Transport,
};

/// Fixed-delay reconnection policy.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub delay: std::time::Duration,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: std::time::Duration::from_secs(5),
            max_retries: 5,
        }
    }
}

enum SessionEnd {
    /// Ordinary drop: reconnect under the retry policy.
    Reconnect,
    /// Credentials were wiped on purpose: reconnect at once for a fresh QR.
    Restart,
    /// Terminal: stop the connection loop.
    Stop,
}

type ConflictHandler = Box<dyn Fn() + Send + Sync>;

/// Owns one network session end to end.
///
/// `run` drives the loop: connect, replay the event stream, decide from the
/// close status whether to retry, re-pair, or stop. Incoming message batches
/// are ingested inline so ordering within a batch is preserved.
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    creds: CredentialStore,
    ingest: Arc<IngestPipeline>,
    status: RwLock<ConnectionStatus>,
    observers: Vec<Arc<dyn ConnectionObserver>>,
    retry: RetryPolicy,
    retries: AtomicU32,
    manual_disconnect: AtomicBool,
    on_conflict: ConflictHandler,
    connected_at: RwLock<Option<i64>>,
}

impl ConnectionManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        creds: CredentialStore,
        ingest: Arc<IngestPipeline>,
    ) -> Self {
        Self {
            transport,
            creds,
            ingest,
            status: RwLock::new(ConnectionStatus::Disconnected),
            observers: Vec::new(),
            retry: RetryPolicy::default(),
            retries: AtomicU32::new(0),
            manual_disconnect: AtomicBool::new(false),
            // A second live session corrupts remote session state, so the
            // default response to a detected conflict is to stop the process.
            on_conflict: Box::new(|| std::process::exit(1)),
            connected_at: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ConnectionObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    #[must_use]
    pub fn with_conflict_handler(mut self, handler: ConflictHandler) -> Self {
        self.on_conflict = handler;
        self
    }

    pub async fn status(&self) -> ConnectionStatus {
        self.status.read().await.clone()
    }

    /// Pending QR payload, if pairing is waiting on a scan.
    pub async fn qr_code(&self) -> Option<String> {
        match &*self.status.read().await {
            ConnectionStatus::QrPending { qr } => Some(qr.clone()),
            _ => None,
        }
    }

    /// Epoch seconds of the current session's open, if connected.
    pub async fn connected_since(&self) -> Option<i64> {
        *self.connected_at.read().await
    }

    /// Tear down the session on the remote side. The bridge acknowledges
    /// with a logged-out close, which the run loop turns into a re-pair.
    pub async fn logout(&self) -> Result<()> {
        self.manual_disconnect.store(true, Ordering::SeqCst);
        self.transport.send_command(BridgeCommand::Logout).await
    }

    /// Drive sessions until a terminal condition.
    pub async fn run(self: Arc<Self>) {
        loop {
            let creds = self.creds.load().await;
            self.set_status(ConnectionStatus::Connecting).await;

            let mut events = match self.transport.connect(creds).await {
                Ok(events) => events,
                Err(e) => {
                    warn!(error = %e, "bridge connection failed");
                    if !self.backoff().await {
                        self.set_status(ConnectionStatus::Disconnected).await;
                        return;
                    }
                    continue;
                },
            };

            match self.session(&mut events).await {
                SessionEnd::Restart => {
                    self.retries.store(0, Ordering::SeqCst);
                    tokio::time::sleep(self.retry.delay).await;
                },
                SessionEnd::Reconnect => {
                    if !self.backoff().await {
                        error!("giving up after repeated connection failures");
                        self.set_status(ConnectionStatus::Disconnected).await;
                        return;
                    }
                },
                SessionEnd::Stop => {
                    self.set_status(ConnectionStatus::Disconnected).await;
                    return;
                },
            }
        }
    }

    /// Returns false once the retry budget is spent.
    async fn backoff(&self) -> bool {
        let attempt = self.retries.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt > self.retry.max_retries {
            return false;
        }
        info!(attempt, max = self.retry.max_retries, "reconnecting");
        tokio::time::sleep(self.retry.delay).await;
        true
    }

    async fn session(&self, events: &mut mpsc::Receiver<BridgeEvent>) -> SessionEnd {
        while let Some(event) = events.recv().await {
            match event {
                BridgeEvent::Open => {
                    info!("session open");
                    self.retries.store(0, Ordering::SeqCst);
                    *self.connected_at.write().await = Some(now_epoch());
                    self.set_status(ConnectionStatus::Connected).await;
                },
                BridgeEvent::Qr { code } => {
                    info!("pairing qr issued");
                    self.set_status(ConnectionStatus::QrPending { qr: code }).await;
                },
                BridgeEvent::CredsUpdate { creds } => {
                    self.creds.save(&creds).await;
                },
                BridgeEvent::Messages { messages } => {
                    for raw in &messages {
                        if let Err(e) = self.ingest.ingest(self.transport.as_ref(), raw).await {
                            error!(message_id = %raw.id, error = %e, "ingest failed");
                        }
                    }
                },
                BridgeEvent::Close { status } => {
                    *self.connected_at.write().await = None;
                    return self.handle_close(status).await;
                },
                // Correlated replies are routed by the transport itself.
                BridgeEvent::Response { .. } => {},
            }
        }
        warn!("bridge event stream ended");
        *self.connected_at.write().await = None;
        SessionEnd::Reconnect
    }

    async fn handle_close(&self, status: u16) -> SessionEnd {
        match status {
            CLOSE_LOGGED_OUT => {
                self.creds.wipe().await;
                if self.manual_disconnect.swap(false, Ordering::SeqCst) {
                    info!("logout confirmed, restarting for re-pair");
                    SessionEnd::Restart
                } else {
                    warn!("logged out remotely, pairing required");
                    SessionEnd::Stop
                }
            },
            CLOSE_SESSION_CONFLICT => {
                error!("another session took over this identity");
                self.creds.wipe().await;
                (self.on_conflict)();
                SessionEnd::Stop
            },
            status => {
                info!(status, "session closed");
                SessionEnd::Reconnect
            },
        }
    }

    async fn set_status(&self, status: ConnectionStatus) {
        *self.status.write().await = status.clone();
        for observer in &self.observers {
            observer.status_changed(&status).await;
        }
    }
}
