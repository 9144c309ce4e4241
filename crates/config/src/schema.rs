//! Configuration schema with serde defaults.

use {
    serde::{Deserialize, Serialize},
    std::path::PathBuf,
};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadlineConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub media: MediaConfig,
    pub session: SessionConfig,
    pub webhook: WebhookConfig,
    pub business_api: BusinessApiConfig,
    pub outbound: OutboundConfig,
    pub auto_reply: AutoReplyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 8450,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path; `sqlite::memory:` is accepted for testing.
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "leadline.db".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Root directory for stored attachments.
    pub dir: PathBuf,
    /// Shared per-attachment size bound in bytes.
    pub max_bytes: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("media"),
            max_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Persistent socket session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory holding the per-session credential blob.
    pub auth_dir: PathBuf,
    /// WebSocket URL of the network bridge.
    pub bridge_url: String,
    /// Fixed delay between reconnect attempts, in seconds.
    pub retry_delay_secs: u64,
    /// Reconnect attempts before giving up silently.
    pub max_retries: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auth_dir: PathBuf::from("auth"),
            bridge_url: "ws://127.0.0.1:8451".into(),
            retry_delay_secs: 5,
            max_retries: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Token expected in the `hub.verify_token` subscription check.
    pub verify_token: String,
    /// App secret used for the HMAC signature over request bodies.
    pub app_secret: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessApiConfig {
    pub access_token: String,
    pub phone_number_id: String,
    /// Graph API base, overridable for tests.
    pub base_url: Option<String>,
}

/// Which transport adapter outbound sends go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboundTransport {
    /// The persistent socket session.
    Session,
    /// The HTTP business-messaging API.
    BusinessApi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboundConfig {
    pub transport: OutboundTransport,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            transport: OutboundTransport::Session,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoReplyConfig {
    pub enabled: bool,
    /// Session cache TTL in seconds.
    pub session_ttl_secs: u64,
    /// Interval of the background eviction sweep in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for AutoReplyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            session_ttl_secs: 30 * 60,
            sweep_interval_secs: 5 * 60,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = LeadlineConfig::default();
        assert_eq!(cfg.media.max_bytes, 16 * 1024 * 1024);
        assert_eq!(cfg.outbound.transport, OutboundTransport::Session);
        assert_eq!(cfg.auto_reply.session_ttl_secs, 1800);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: LeadlineConfig = toml::from_str(
            r#"
            [server]
            port = 9000

            [outbound]
            transport = "business_api"
            "#,
        )
        .expect("parse");
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.bind, "127.0.0.1");
        assert_eq!(cfg.outbound.transport, OutboundTransport::BusinessApi);
    }
}
