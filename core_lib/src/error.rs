//! Application error types and handling

use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::files::ValidationError;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("No file uploaded")]
    NoFileProvided,

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("File format not supported for preview: {0}")]
    UnsupportedPreviewType(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Requested range not satisfiable for {size} byte resource")]
    MalformedRange { size: u64 },

    #[error("Storage error: {0}")]
    StorageIo(#[from] std::io::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::NoFileProvided
            | AppError::InvalidFilename(_)
            | AppError::BadRequest(_)
            | AppError::UnsupportedPreviewType(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MalformedRange { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            AppError::StorageIo(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-input problems are logged at warning level, everything else at error.
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let error_message = match &self {
            AppError::Validation(err) => err.to_string(),
            AppError::NoFileProvided => "No file uploaded".to_string(),
            AppError::InvalidFilename(_) => "Invalid filename".to_string(),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::UnsupportedPreviewType(_) => {
                "File format not supported for preview".to_string()
            }
            AppError::NotFound(_) => "File not found".to_string(),
            AppError::MalformedRange { size } => {
                let mut headers = HeaderMap::new();
                if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", size)) {
                    headers.insert(header::CONTENT_RANGE, value);
                }
                return (status, headers).into_response();
            }
            AppError::StorageIo(_) => "Internal server error".to_string(),
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
