use axum::body::Bytes;
use chrono::{DateTime, Utc};
use futures_util::{Stream, StreamExt};
use std::ffi::OsStr;
use std::fs::Metadata;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Component, Path, PathBuf};
use tokio::fs as async_fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::config::FileConfig;
use crate::error::{AppError, Result};
use crate::logging::SharedLogger;
use super::format::{classify_extension, format_size};
use super::models::{FileEntry, ListPage, ListParams, PageRequest, SavedFile, DEFAULT_PAGE_SIZE};
use super::preview::PreviewKind;
use super::range::ByteRange;
use super::validation::{FileValidationConfig, FileValidator};

#[derive(Debug, Clone)]
pub struct FileManagerConfig {
    pub storage_path: PathBuf,
    pub temp_path: PathBuf,
    pub validation: FileValidationConfig,
    pub default_page_size: usize,
}

impl FileManagerConfig {
    pub fn new(storage_path: impl Into<PathBuf>, temp_path: impl Into<PathBuf>) -> Self {
        Self {
            storage_path: storage_path.into(),
            temp_path: temp_path.into(),
            validation: FileValidationConfig::default(),
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Default for FileManagerConfig {
    fn default() -> Self {
        Self::from(&FileConfig::default())
    }
}

impl From<&FileConfig> for FileManagerConfig {
    fn from(config: &FileConfig) -> Self {
        Self {
            storage_path: config.upload_dir.clone(),
            temp_path: config.temp_dir.clone(),
            validation: config.validation(),
            default_page_size: config.list_page_size,
        }
    }
}

/// A stored file opened for streaming.
#[derive(Debug)]
pub struct OpenedFile {
    pub name: String,
    pub size: u64,
    file: async_fs::File,
}

impl OpenedFile {
    pub fn into_reader(self) -> async_fs::File {
        self.file
    }

    /// Reader yielding exactly `range.size()` bytes starting at `range.start`.
    pub async fn into_range_reader(mut self, range: ByteRange) -> Result<impl AsyncRead> {
        self.file.seek(SeekFrom::Start(range.start)).await?;
        Ok(self.file.take(range.size()))
    }
}

/// Directory-backed file store over a single flat upload root.
///
/// There is no index: every listing re-reads the directory, and the
/// filesystem is the only source of truth.
#[derive(Clone)]
pub struct FileManager {
    config: FileManagerConfig,
    validator: FileValidator,
    logger: SharedLogger,
}

impl FileManager {
    pub fn new(config: FileManagerConfig, logger: SharedLogger) -> Self {
        let validator = FileValidator::new(config.validation.clone());

        Self {
            config,
            validator,
            logger,
        }
    }

    pub fn storage_path(&self) -> &Path {
        &self.config.storage_path
    }

    pub fn max_file_size(&self) -> u64 {
        self.validator.max_file_size()
    }

    /// Page request for raw `/list` parameters, using the configured page size
    /// when none is given.
    pub fn page_request(&self, params: &ListParams) -> PageRequest {
        PageRequest::from_params(params, self.config.default_page_size)
    }

    /// Creates the upload root and the staging directory, and checks that
    /// staged uploads can be renamed into the root.
    pub async fn initialize(&self) -> Result<()> {
        async_fs::create_dir_all(&self.config.storage_path).await?;
        async_fs::create_dir_all(&self.config.temp_path).await?;

        let storage = async_fs::metadata(&self.config.storage_path).await?;
        let staging = async_fs::metadata(&self.config.temp_path).await?;
        if !same_filesystem(&storage, &staging) {
            return Err(AppError::StorageIo(std::io::Error::other(format!(
                "temp directory {} must be on the same filesystem as upload directory {}",
                self.config.temp_path.display(),
                self.config.storage_path.display()
            ))));
        }

        self.logger.debug(&format!(
            "Upload directory created/verified: {}",
            self.config.storage_path.display()
        ));
        Ok(())
    }

    /// Streams `content` to `root/name`, replacing any existing file.
    ///
    /// Bytes are staged in the temp directory and renamed into place only
    /// after the whole body passed validation, so a rejected or interrupted
    /// upload never leaves a partial file in the root.
    pub async fn store_file<S>(&self, name: &str, content: S) -> Result<SavedFile>
    where
        S: Stream<Item = Result<Bytes>>,
    {
        let target = self
            .resolve(name)
            .map_err(|e| self.report("Upload rejected", e))?;

        self.validator
            .validate_extension(name)
            .map_err(|e| self.report("File validation failed", e.into()))?;

        let size = self.stage_and_persist(name, &target, content).await?;
        self.logger
            .debug(&format!("File validation passed: {} (size: {})", name, size));
        self.logger
            .info(&format!("File uploaded successfully: {}", target.display()));

        Ok(SavedFile {
            name: name.to_string(),
            size,
            category: classify_extension(name),
        })
    }

    async fn stage_and_persist<S>(&self, name: &str, target: &Path, content: S) -> Result<u64>
    where
        S: Stream<Item = Result<Bytes>>,
    {
        let staging = tempfile::Builder::new()
            .prefix(".upload-")
            .tempfile_in(&self.config.temp_path)
            .map_err(|e| self.report("Failed to save file", e.into()))?;
        let (file, staging_path) = staging.into_parts();
        let mut file = async_fs::File::from_std(file);

        futures_util::pin_mut!(content);
        let mut size: u64 = 0;
        while let Some(chunk) = content.next().await {
            let chunk = chunk.map_err(|e| self.report("Failed to read upload", e))?;
            size += chunk.len() as u64;
            self.validator
                .validate_size(size)
                .map_err(|e| self.report("File validation failed", e.into()))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| self.report("Failed to save file", e.into()))?;
        }

        file.flush()
            .await
            .map_err(|e| self.report("Failed to save file", e.into()))?;
        file.sync_all()
            .await
            .map_err(|e| self.report("Failed to save file", e.into()))?;
        drop(file);

        self.validator
            .validate(size, name)
            .map_err(|e| self.report("File validation failed", e.into()))?;

        staging_path
            .persist(target)
            .map_err(|e| self.report("Failed to save file", e.error.into()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) =
                async_fs::set_permissions(target, std::fs::Permissions::from_mode(0o644)).await
            {
                self.logger.warn(&format!(
                    "Failed to relax permissions on {}: {}",
                    target.display(),
                    e
                ));
            }
        }

        Ok(size)
    }

    pub async fn list_files(&self, request: &PageRequest) -> Result<ListPage> {
        self.logger.debug(&format!(
            "Starting to list files in directory: {}",
            self.config.storage_path.display()
        ));

        let mut dir = async_fs::read_dir(&self.config.storage_path)
            .await
            .map_err(|e| self.report("Failed to read directory", e.into()))?;

        let mut entries = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| self.report("Failed to read directory", e.into()))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();

            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) => {
                    self.logger
                        .warn(&format!("Failed to get file info for {}: {}", name, e));
                    continue;
                }
            };

            if !metadata.is_file() {
                self.logger
                    .debug(&format!("Skipping non-file entry: {}", name));
                continue;
            }

            let modified = match metadata.modified() {
                Ok(time) => DateTime::<Utc>::from(time),
                Err(e) => {
                    self.logger
                        .warn(&format!("Failed to get file info for {}: {}", name, e));
                    continue;
                }
            };

            entries.push(FileEntry {
                size: format_size(metadata.len()),
                category: classify_extension(&name),
                name,
                modified,
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        let scanned = entries.len();

        let filtered: Vec<FileEntry> = entries
            .into_iter()
            .filter(|entry| request.matches(&entry.name))
            .collect();
        let total = filtered.len();
        let (start, end) = request.bounds(total);

        let files: Vec<FileEntry> = filtered
            .into_iter()
            .skip(start)
            .take(end - start)
            .collect();

        self.logger.info(&format!(
            "Listed {} files (filtered from {} total files)",
            files.len(),
            scanned
        ));

        Ok(ListPage {
            files,
            total,
            page: request.page,
            page_size: request.page_size,
        })
    }

    pub async fn open_file(&self, name: &str) -> Result<OpenedFile> {
        let (path, metadata) = self
            .locate(name)
            .await
            .map_err(|e| self.report("Download failed", e))?;
        self.logger
            .debug(&format!("Starting file download: {}", path.display()));

        self.open_located(name, &path, &metadata).await
    }

    /// Existence is checked before the preview type, so a missing file is
    /// always `NotFound`.
    pub async fn open_preview(&self, name: &str) -> Result<(PreviewKind, OpenedFile)> {
        let (path, metadata) = self
            .locate(name)
            .await
            .map_err(|e| self.report("Preview failed", e))?;

        let kind = PreviewKind::from_filename(name).ok_or_else(|| {
            self.report(
                "Preview failed",
                AppError::UnsupportedPreviewType(name.to_string()),
            )
        })?;

        let opened = self.open_located(name, &path, &metadata).await?;
        Ok((kind, opened))
    }

    pub async fn delete_file(&self, name: &str) -> Result<()> {
        let (path, metadata) = self
            .locate(name)
            .await
            .map_err(|e| self.report("Delete failed", e))?;
        self.logger.debug(&format!(
            "File found: {} (size: {})",
            name,
            format_size(metadata.len())
        ));

        async_fs::remove_file(&path)
            .await
            .map_err(|e| self.report("Failed to delete file", e.into()))?;

        self.logger
            .info(&format!("File deleted successfully: {}", path.display()));
        Ok(())
    }

    async fn open_located(&self, name: &str, path: &Path, metadata: &Metadata) -> Result<OpenedFile> {
        let file = async_fs::File::open(path)
            .await
            .map_err(|e| self.report("Failed to open file", e.into()))?;

        Ok(OpenedFile {
            name: name.to_string(),
            size: metadata.len(),
            file,
        })
    }

    /// Maps a client-supplied name onto a path directly inside the root.
    ///
    /// The name must be a single normal path component; separators, `.`,
    /// `..`, NUL and absolute paths are rejected.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        let invalid = || AppError::InvalidFilename(name.to_string());

        if name.is_empty() || name.contains(['/', '\\', '\0']) {
            return Err(invalid());
        }

        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) if part == OsStr::new(name) => {
                Ok(self.config.storage_path.join(name))
            }
            _ => Err(invalid()),
        }
    }

    /// Resolves `name` to an existing regular file whose canonical path stays
    /// inside the canonical upload root.
    async fn locate(&self, name: &str) -> Result<(PathBuf, Metadata)> {
        let path = self.resolve(name)?;

        let metadata = match async_fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AppError::NotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        if !metadata.is_file() {
            return Err(AppError::NotFound(name.to_string()));
        }

        let root = async_fs::canonicalize(&self.config.storage_path).await?;
        let canonical = async_fs::canonicalize(&path).await?;
        if !canonical.starts_with(&root) {
            return Err(AppError::InvalidFilename(name.to_string()));
        }

        Ok((path, metadata))
    }

    /// Logs `err` at the severity of its class and hands it back.
    fn report(&self, context: &str, err: AppError) -> AppError {
        let message = format!("{}: {}", context, err);
        if err.is_client_error() {
            self.logger.warn(&message);
        } else {
            self.logger.error(&message);
        }
        err
    }
}

#[cfg(unix)]
fn same_filesystem(a: &Metadata, b: &Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.dev() == b.dev()
}

#[cfg(not(unix))]
fn same_filesystem(_a: &Metadata, _b: &Metadata) -> bool {
    true
}
