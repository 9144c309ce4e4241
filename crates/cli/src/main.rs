//! `leadline` — wires the stores, transports and engines together and
//! serves the gateway.

use std::{path::PathBuf, sync::Arc, time::Duration};

use {
    anyhow::{Context, Result},
    async_trait::async_trait,
    clap::Parser,
    sqlx::{
        SqlitePool,
        sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    },
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    leadline_auto_reply::{AutoReplyEngine, SessionCache},
    leadline_channels::{
        Lead, LeadDirectory, MessageStore, OfficerDirectory, Outbound, SendPayload,
    },
    leadline_config::{LeadlineConfig, OutboundTransport, discover_and_load, load_config},
    leadline_dispatch::{Dispatcher, OutboundMessage},
    leadline_gateway::AppState,
    leadline_media::MediaStore,
    leadline_store::{SqliteDirectory, SqliteMessageStore},
    leadline_threads::ThreadAggregator,
    leadline_whatsapp::{
        BridgeSocket, ConnectionManager, CredentialStore, IngestPipeline, ReplyHook, RetryPolicy,
        SessionOutbound, Transport,
    },
    leadline_whatsapp_business::BusinessApiOutbound,
};

#[derive(Parser)]
#[command(name = "leadline", about = "LeadLine — chat-network CRM gateway")]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, default_value_t = false)]
    json_logs: bool,

    /// Address to bind to (overrides config value).
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on (overrides config value).
    #[arg(long)]
    port: Option<u16>,

    /// Config file path (overrides discovery).
    #[arg(long, env = "LEADLINE_CONFIG")]
    config: Option<PathBuf>,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Bridges the auto-reply engine into the ingestion pipeline.
struct AutoReplyBridge {
    engine: AutoReplyEngine,
    dispatcher: Arc<Dispatcher>,
}

#[async_trait]
impl ReplyHook for AutoReplyBridge {
    async fn on_inbound(&self, phone: &str, lead: Option<&Lead>, text: &str) -> Result<()> {
        let Some(reply) = self.engine.reply(phone, lead, text).await? else {
            return Ok(());
        };
        let outcome = self
            .dispatcher
            .send(phone, OutboundMessage::Payload(SendPayload::Text {
                body: reply,
            }))
            .await;
        if !outcome.success {
            anyhow::bail!(
                "auto-reply send failed: {}",
                outcome.error.unwrap_or_else(|| "unknown".into())
            );
        }
        Ok(())
    }
}

async fn connect_database(path: &str) -> Result<SqlitePool> {
    let pool = if path.starts_with("sqlite:") {
        SqlitePoolOptions::new().connect(path).await?
    } else {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        SqlitePoolOptions::new().connect_with(options).await?
    };
    SqliteMessageStore::init(&pool).await?;
    SqliteDirectory::init(&pool).await?;
    Ok(pool)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_telemetry(&cli);

    let config: LeadlineConfig = match &cli.config {
        Some(path) => load_config(path).with_context(|| format!("load {}", path.display()))?,
        None => discover_and_load(),
    };

    let pool = connect_database(&config.database.path)
        .await
        .with_context(|| format!("open database {}", config.database.path))?;
    let store: Arc<dyn MessageStore> = Arc::new(SqliteMessageStore::new(pool.clone()));
    let directory = Arc::new(SqliteDirectory::new(pool));
    let leads: Arc<dyn LeadDirectory> = directory.clone();
    let officers: Arc<dyn OfficerDirectory> = directory.clone();

    let media = Arc::new(
        MediaStore::new(config.media.dir.clone()).with_max_bytes(config.media.max_bytes),
    );

    let transport: Arc<dyn Transport> = Arc::new(BridgeSocket::new(&config.session.bridge_url));
    let outbound: Arc<dyn Outbound> = match config.outbound.transport {
        OutboundTransport::Session => Arc::new(SessionOutbound::new(transport.clone())),
        OutboundTransport::BusinessApi => {
            let api = BusinessApiOutbound::new(
                config.business_api.access_token.clone(),
                config.business_api.phone_number_id.clone(),
            );
            Arc::new(match &config.business_api.base_url {
                Some(base_url) => api.with_base_url(base_url),
                None => api,
            })
        },
    };
    info!(adapter = outbound.id(), "outbound transport selected");

    let dispatcher = Arc::new(Dispatcher::new(
        outbound,
        store.clone(),
        leads.clone(),
        media.clone(),
    ));

    let mut ingest = IngestPipeline::new(store.clone(), media.clone(), leads.clone());
    if config.auto_reply.enabled {
        let sessions = Arc::new(SessionCache::new(Duration::from_secs(
            config.auto_reply.session_ttl_secs,
        )));
        sessions.spawn_eviction(Duration::from_secs(config.auto_reply.sweep_interval_secs));
        let engine = AutoReplyEngine::new(directory.clone(), directory.clone(), sessions);
        ingest = ingest.with_reply_hook(Arc::new(AutoReplyBridge {
            engine,
            dispatcher: dispatcher.clone(),
        }));
    } else {
        info!("auto-reply disabled");
    }
    let ingest = Arc::new(ingest);

    let manager = if config.outbound.transport == OutboundTransport::Session {
        let creds = CredentialStore::new(&config.session.auth_dir);
        let manager = Arc::new(
            ConnectionManager::new(transport.clone(), creds, ingest.clone()).with_retry_policy(
                RetryPolicy {
                    delay: Duration::from_secs(config.session.retry_delay_secs),
                    max_retries: config.session.max_retries,
                },
            ),
        );
        tokio::spawn(manager.clone().run());
        Some(manager)
    } else {
        None
    };

    if config.webhook.app_secret.is_empty() {
        warn!("webhook app secret not configured; webhook posts will be rejected");
    }

    let threads = Arc::new(ThreadAggregator::new(store.clone(), leads, officers));

    let state = AppState {
        store,
        threads,
        dispatcher,
        media,
        ingest,
        transport,
        manager,
        webhook: config.webhook.clone(),
        business_number: (!config.business_api.phone_number_id.is_empty())
            .then(|| config.business_api.phone_number_id.clone()),
    };

    let bind = cli.bind.unwrap_or_else(|| config.server.bind.clone());
    let port = cli.port.unwrap_or(config.server.port);
    leadline_gateway::serve(state, &bind, port).await
}
