/// Attachment categories, each with its own subdirectory and mime
/// allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCategory {
    Image,
    Video,
    Audio,
    Document,
}

impl MediaCategory {
    /// Subdirectory under the media root.
    #[must_use]
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
        }
    }

    /// Resolve the category from a mime type, if allow-listed.
    #[must_use]
    pub fn from_mime(mime: &str) -> Option<Self> {
        let base = mime.split(';').next().unwrap_or(mime).trim();
        let category = match base {
            "image/jpeg" | "image/png" | "image/gif" | "image/webp" => Self::Image,
            "video/mp4" | "video/3gpp" | "video/quicktime" => Self::Video,
            "audio/aac" | "audio/mp4" | "audio/mpeg" | "audio/amr" | "audio/ogg"
            | "audio/opus" => Self::Audio,
            "application/pdf"
            | "application/msword"
            | "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            | "application/vnd.ms-excel"
            | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            | "text/plain" => Self::Document,
            _ => return None,
        };
        Some(category)
    }

    /// File extension for a mime type within this category.
    #[must_use]
    pub fn extension_for(mime: &str) -> &'static str {
        let base = mime.split(';').next().unwrap_or(mime).trim();
        match base {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "video/mp4" => "mp4",
            "video/3gpp" => "3gp",
            "video/quicktime" => "mov",
            "audio/aac" | "audio/mp4" => "aac",
            "audio/mpeg" => "mp3",
            "audio/amr" => "amr",
            "audio/ogg" | "audio/opus" => "ogg",
            "application/pdf" => "pdf",
            "application/msword" => "doc",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
            "application/vnd.ms-excel" => "xls",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
            "text/plain" => "txt",
            _ => "bin",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_listed_mimes_resolve() {
        assert_eq!(MediaCategory::from_mime("image/jpeg"), Some(MediaCategory::Image));
        assert_eq!(MediaCategory::from_mime("video/mp4"), Some(MediaCategory::Video));
        assert_eq!(MediaCategory::from_mime("audio/ogg; codecs=opus"), Some(MediaCategory::Audio));
        assert_eq!(
            MediaCategory::from_mime("application/pdf"),
            Some(MediaCategory::Document)
        );
    }

    #[test]
    fn unknown_mimes_are_rejected() {
        assert_eq!(MediaCategory::from_mime("application/x-msdownload"), None);
        assert_eq!(MediaCategory::from_mime("image/svg+xml"), None);
    }

    #[test]
    fn extensions() {
        assert_eq!(MediaCategory::extension_for("image/jpeg"), "jpg");
        assert_eq!(MediaCategory::extension_for("audio/mpeg"), "mp3");
        assert_eq!(MediaCategory::extension_for("weird/thing"), "bin");
    }
}
