use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::schema::LeadlineConfig;

/// Config file name, checked project-local first, then user-global.
const CONFIG_FILENAME: &str = "leadline.toml";

/// Load config from an explicit path.
pub fn load_config(path: &Path) -> anyhow::Result<LeadlineConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    Ok(toml::from_str(&raw)?)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./leadline.toml` (project-local)
/// 2. `~/.config/leadline/leadline.toml` (user-global)
///
/// Returns `LeadlineConfig::default()` if no config file is found or the
/// found file fails to parse.
pub fn discover_and_load() -> LeadlineConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    LeadlineConfig::default()
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILENAME);
    if local.exists() {
        return Some(local);
    }

    if let Some(dirs) = directories::ProjectDirs::from("", "", "leadline") {
        let p = dirs.config_dir().join(CONFIG_FILENAME);
        if p.exists() {
            return Some(p);
        }
    }

    None
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leadline.toml");
        std::fs::write(&path, "[server]\nport = 1234\n").unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.server.port, 1234);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_config(Path::new("/nonexistent/leadline.toml")).is_err());
    }
}
