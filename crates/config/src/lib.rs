//! Configuration schema and discovery loader.

pub mod loader;
pub mod schema;

pub use {
    loader::{discover_and_load, load_config},
    schema::{
        AutoReplyConfig, BusinessApiConfig, DatabaseConfig, LeadlineConfig, MediaConfig,
        OutboundTransport, ServerConfig, SessionConfig, WebhookConfig,
    },
};
