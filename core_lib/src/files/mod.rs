pub mod format;
pub mod manager;
pub mod models;
pub mod preview;
pub mod range;
pub mod validation;

pub use format::{classify_extension, extension_of, format_size, FileCategory};
pub use manager::{FileManager, FileManagerConfig, OpenedFile};
pub use models::{FileEntry, ListPage, ListParams, PageRequest, SavedFile, DEFAULT_PAGE_SIZE};
pub use preview::PreviewKind;
pub use range::{parse_range, ByteRange, RangeError};
pub use validation::{
    FileValidationConfig, FileValidator, ValidationError, ALLOWED_EXTENSIONS, MAX_FILE_SIZE,
};
