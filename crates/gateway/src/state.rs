use std::sync::Arc;

use {
    leadline_channels::MessageStore,
    leadline_config::WebhookConfig,
    leadline_dispatch::Dispatcher,
    leadline_media::MediaStore,
    leadline_threads::ThreadAggregator,
    leadline_whatsapp::{ConnectionManager, IngestPipeline, Transport},
};

/// Shared state behind every route.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MessageStore>,
    pub threads: Arc<ThreadAggregator>,
    pub dispatcher: Arc<Dispatcher>,
    pub media: Arc<MediaStore>,
    pub ingest: Arc<IngestPipeline>,
    pub transport: Arc<dyn Transport>,
    /// Present when this deployment runs the persistent-session transport.
    pub manager: Option<Arc<ConnectionManager>>,
    pub webhook: WebhookConfig,
    /// Configured business number id; webhook deliveries addressed to a
    /// different number are dropped.
    pub business_number: Option<String>,
}
