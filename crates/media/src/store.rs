use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use {
    crate::{
        DEFAULT_MAX_BYTES,
        category::MediaCategory,
        error::{Error, Result},
    },
    leadline_common::time::now_epoch_millis,
};

/// Validates and persists binary attachments under a root directory, one
/// subdirectory per category, timestamp-named files.
///
/// Validation failures never touch disk. When a caller's downstream
/// persistence fails after a successful write, [`MediaStore::remove`] is
/// the best-effort compensation so no orphaned file survives without an
/// index entry.
pub struct MediaStore {
    root: PathBuf,
    max_bytes: usize,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }

    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    #[must_use]
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Validate without writing: size bound first, then mime allow-list.
    pub fn validate(&self, bytes: &[u8], mime: &str) -> Result<MediaCategory> {
        if bytes.len() > self.max_bytes {
            return Err(Error::invalid_input(format!(
                "attachment of {} bytes exceeds the {} byte limit",
                bytes.len(),
                self.max_bytes
            )));
        }
        MediaCategory::from_mime(mime)
            .ok_or_else(|| Error::invalid_input(format!("mime type not allowed: {mime}")))
    }

    /// Persist an attachment, returning its path relative to the root.
    pub async fn store(
        &self,
        bytes: &[u8],
        mime: &str,
        original_name: Option<&str>,
    ) -> Result<String> {
        let category = self.validate(bytes, mime)?;

        let stem = original_name
            .map(sanitize_stem)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| category.dir_name().to_string());
        let filename = format!(
            "{}-{}.{}",
            now_epoch_millis(),
            stem,
            MediaCategory::extension_for(mime)
        );
        let relative = format!("{}/{}", category.dir_name(), filename);

        let dir = self.root.join(category.dir_name());
        let path = dir.join(&filename);
        let data = bytes.to_vec();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            std::fs::create_dir_all(&dir)?;
            std::fs::write(&path, &data)
        })
        .await
        .map_err(|e| Error::external("media write task", e))?
        .map_err(|e| Error::external("write attachment", e))?;

        debug!(path = %relative, bytes = bytes.len(), "stored attachment");
        Ok(relative)
    }

    /// Best-effort compensating delete of a previously stored attachment.
    /// A failed delete is swallowed (warn-logged).
    pub async fn remove(&self, relative: &str) {
        let path = self.resolve(relative);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(path = %path.display(), error = %e, "compensating delete failed");
        }
    }

    /// Absolute path of a stored attachment.
    #[must_use]
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Keep only filesystem-safe characters of a client-supplied name, minus
/// its extension.
fn sanitize_stem(name: &str) -> String {
    let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
    stem.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}
