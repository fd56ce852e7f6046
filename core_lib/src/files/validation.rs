use std::collections::HashSet;
use thiserror::Error;

use super::format::extension_of;

pub const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

pub const ALLOWED_EXTENSIONS: [&str; 13] = [
    ".txt", ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".png", ".jpg", ".jpeg", ".gif", ".mp4",
    ".zip", ".rar",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("file size exceeds maximum limit ({size} bytes, max: {max_size} bytes)")]
    FileTooLarge { size: u64, max_size: u64 },

    #[error("invalid file type: {extension:?}")]
    InvalidFileType { extension: String },
}

#[derive(Debug, Clone)]
pub struct FileValidationConfig {
    pub max_file_size: u64,
    pub allowed_extensions: HashSet<String>,
}

impl FileValidationConfig {
    pub fn new<I, S>(max_file_size: u64, allowed_extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed_extensions = allowed_extensions
            .into_iter()
            .map(|ext| normalize_extension(ext.as_ref()))
            .collect();

        Self {
            max_file_size,
            allowed_extensions,
        }
    }
}

impl Default for FileValidationConfig {
    fn default() -> Self {
        Self::new(MAX_FILE_SIZE, ALLOWED_EXTENSIONS)
    }
}

/// Accepts `pdf`, `.pdf` and `.PDF` alike.
fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

#[derive(Debug, Clone)]
pub struct FileValidator {
    config: FileValidationConfig,
}

impl FileValidator {
    pub fn new(config: FileValidationConfig) -> Self {
        Self { config }
    }

    pub fn with_default_config() -> Self {
        Self::new(FileValidationConfig::default())
    }

    pub fn max_file_size(&self) -> u64 {
        self.config.max_file_size
    }

    /// Type is checked before size, so a disallowed type reports
    /// `InvalidFileType` whatever its size.
    pub fn validate(&self, size: u64, filename: &str) -> Result<(), ValidationError> {
        self.validate_extension(filename)?;
        self.validate_size(size)
    }

    pub fn validate_size(&self, size: u64) -> Result<(), ValidationError> {
        if size > self.config.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max_size: self.config.max_file_size,
            });
        }
        Ok(())
    }

    pub fn validate_extension(&self, filename: &str) -> Result<(), ValidationError> {
        let extension = extension_of(filename);
        if !self.config.allowed_extensions.contains(&extension) {
            return Err(ValidationError::InvalidFileType { extension });
        }
        Ok(())
    }
}
