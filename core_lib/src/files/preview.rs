use super::format::extension_of;

/// File formats the preview endpoint is willing to serve inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewKind {
    Jpeg,
    Png,
    Gif,
    Webp,
    Pdf,
    Epub,
}

impl PreviewKind {
    pub fn from_filename(filename: &str) -> Option<Self> {
        match extension_of(filename).as_str() {
            ".jpg" | ".jpeg" => Some(PreviewKind::Jpeg),
            ".png" => Some(PreviewKind::Png),
            ".gif" => Some(PreviewKind::Gif),
            ".webp" => Some(PreviewKind::Webp),
            ".pdf" => Some(PreviewKind::Pdf),
            ".epub" => Some(PreviewKind::Epub),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            PreviewKind::Jpeg => "image/jpeg",
            PreviewKind::Png => "image/png",
            PreviewKind::Gif => "image/gif",
            PreviewKind::Webp => "image/webp",
            PreviewKind::Pdf => "application/pdf",
            PreviewKind::Epub => "application/epub+zip",
        }
    }

    /// `no-cache` for EPUB, one hour of public caching for everything else.
    pub fn cache_control(&self) -> &'static str {
        match self {
            PreviewKind::Epub => "no-cache",
            _ => "public, max-age=3600",
        }
    }

    pub fn is_epub(&self) -> bool {
        matches!(self, PreviewKind::Epub)
    }
}
