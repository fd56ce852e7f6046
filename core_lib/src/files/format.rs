use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

const UNIT: u64 = 1024;
const UNIT_PREFIXES: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];

/// Coarse grouping of stored files, derived from the extension alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Image,
    Video,
    Document,
    Archive,
    Other,
}

impl FileCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileCategory::Image => "image",
            FileCategory::Video => "video",
            FileCategory::Document => "document",
            FileCategory::Archive => "archive",
            FileCategory::Other => "other",
        }
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower-cased extension including the leading dot, or an empty string.
pub fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default()
}

pub fn classify_extension(filename: &str) -> FileCategory {
    match extension_of(filename).as_str() {
        ".jpg" | ".jpeg" | ".png" | ".gif" => FileCategory::Image,
        ".mp4" | ".avi" | ".mov" => FileCategory::Video,
        ".doc" | ".docx" | ".pdf" | ".txt" => FileCategory::Document,
        ".zip" | ".rar" => FileCategory::Archive,
        _ => FileCategory::Other,
    }
}

/// Human-readable size in binary units, e.g. `512 B`, `1.5 KB`, `100.0 MB`.
pub fn format_size(bytes: u64) -> String {
    if bytes < UNIT {
        return format!("{} B", bytes);
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }

    format!("{:.1} {}B", bytes as f64 / div as f64, UNIT_PREFIXES[exp])
}
