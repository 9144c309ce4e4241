//! Credential blob persistence.
//!
//! The network hands out an updated credential blob during and after
//! pairing; it must be written on every update or the next reconnect
//! falls back to QR pairing. A transient write failure is retried once
//! immediately and then only logged: the live socket session does not
//! depend on persistence succeeding.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

const CREDS_FILE: &str = "creds.json";

pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(auth_dir: impl AsRef<Path>) -> Self {
        Self {
            path: auth_dir.as_ref().join(CREDS_FILE),
        }
    }

    /// Load the persisted blob, if present and parseable.
    pub async fn load(&self) -> Option<serde_json::Value> {
        let raw = tokio::fs::read_to_string(&self.path).await.ok()?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "corrupt credential blob ignored");
                None
            },
        }
    }

    /// Persist an updated blob. One immediate retry, then log-and-continue.
    pub async fn save(&self, creds: &serde_json::Value) {
        let Ok(raw) = serde_json::to_string(creds) else {
            warn!("credential blob not serializable");
            return;
        };

        for attempt in 0..2u8 {
            if let Some(parent) = self.path.parent() {
                let _ = tokio::fs::create_dir_all(parent).await;
            }
            match tokio::fs::write(&self.path, &raw).await {
                Ok(()) => {
                    debug!(path = %self.path.display(), "credentials persisted");
                    return;
                },
                Err(e) if attempt == 0 => {
                    warn!(error = %e, "credential write failed, retrying once");
                },
                Err(e) => {
                    warn!(error = %e, "credential write failed after retry; session continues");
                },
            }
        }
    }

    /// Wipe the blob on logout or detected session conflict.
    pub async fn wipe(&self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "credentials wiped"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => warn!(error = %e, "failed to wipe credentials"),
        }
    }

    /// True when a persisted blob exists.
    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }
}
