use axum::{
    body::Body,
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures_util::StreamExt;
use serde::Serialize;
use tokio_util::io::ReaderStream;

use crate::{
    error::{AppError, Result},
    files::{format_size, parse_range, FileCategory, ListPage, ListParams, PreviewKind, ValidationError},
    AppState,
};

const UPLOAD_FIELD: &str = "file";

const PREVIEW_ALLOW_METHODS: &str = "GET, OPTIONS, HEAD";
const PREVIEW_ALLOW_HEADERS: &str =
    "Origin, Content-Type, Content-Range, Content-Disposition, Content-Description, X-Requested-With";
const PREVIEW_EXPOSE_HEADERS: &str = "Content-Range, Content-Length";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub filename: String,
    pub size: String,
    #[serde(rename = "type")]
    pub category: FileCategory,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let max_size = state.file_manager.max_file_size();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        let err = multipart_error(e, max_size);
        state.logger.warn(&format!("Failed to read upload: {}", err));
        err
    })? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let Some(filename) = field.file_name().map(str::to_string) else {
            break;
        };

        let content = field.map(|chunk| chunk.map_err(|e| multipart_error(e, max_size)));
        let saved = state.file_manager.store_file(&filename, content).await?;

        return Ok(Json(UploadResponse {
            message: "File uploaded successfully".to_string(),
            filename: saved.name,
            size: format_size(saved.size),
            category: saved.category,
        }));
    }

    state.logger.warn("No file uploaded");
    Err(AppError::NoFileProvided)
}

/// A body cut off by the transport limit is reported as an oversized file.
fn multipart_error(err: MultipartError, max_size: u64) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::Validation(ValidationError::FileTooLarge {
            size: max_size.saturating_add(1),
            max_size,
        })
    } else {
        AppError::BadRequest(format!("Failed to read multipart body: {}", err.body_text()))
    }
}

pub async fn download_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response> {
    let opened = state.file_manager.open_file(&filename).await?;

    let content_type = mime_guess::from_path(&filename).first_or_octet_stream();

    let mut headers = HeaderMap::new();
    insert_header(&mut headers, header::CONTENT_TYPE, content_type.as_ref());
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(opened.size));
    headers.insert(
        header::CONTENT_DISPOSITION,
        content_disposition("attachment", &format!("\"{}\"", filename.replace('"', "\\\""))),
    );

    let body = Body::from_stream(ReaderStream::new(opened.into_reader()));

    Ok((StatusCode::OK, headers, body).into_response())
}

pub async fn preview_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    request_headers: HeaderMap,
) -> Result<Response> {
    let (kind, opened) = state.file_manager.open_preview(&filename).await?;
    let size = opened.size;

    let mut headers = preview_headers(kind, &filename);

    let Some(range_header) = request_headers.get(header::RANGE) else {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
        let body = Body::from_stream(ReaderStream::new(opened.into_reader()));
        return Ok((StatusCode::OK, headers, body).into_response());
    };

    let unsatisfiable = |reason: &str| {
        state
            .logger
            .warn(&format!("Invalid range for {}: {}", filename, reason));
        AppError::MalformedRange { size }
    };

    let range_header = range_header
        .to_str()
        .map_err(|_| unsatisfiable("header is not visible ASCII"))?;
    let range = parse_range(range_header, size)
        .map_err(|e| unsatisfiable(&e.to_string()))?
        .first()
        .copied()
        .ok_or_else(|| unsatisfiable("no ranges"))?;

    state.logger.debug(&format!(
        "Serving range {} of {} ({} bytes)",
        range, filename, size
    ));

    insert_header(&mut headers, header::CONTENT_RANGE, &range.content_range(size));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(range.size()));

    let reader = opened.into_range_reader(range).await?;
    let body = Body::from_stream(ReaderStream::new(reader));

    Ok((StatusCode::PARTIAL_CONTENT, headers, body).into_response())
}

/// Preflight for preview requests; answered without touching the file.
pub async fn preview_options() -> impl IntoResponse {
    (StatusCode::OK, preview_cors_headers())
}

pub async fn list_files(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListPage>> {
    let request = state.file_manager.page_request(&params);
    let page = state.file_manager.list_files(&request).await?;
    Ok(Json(page))
}

pub async fn delete_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<MessageResponse>> {
    state.file_manager.delete_file(&filename).await?;

    Ok(Json(MessageResponse {
        message: "File deleted successfully".to_string(),
    }))
}

fn preview_cors_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(PREVIEW_ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(PREVIEW_ALLOW_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static(PREVIEW_EXPOSE_HEADERS),
    );
    headers
}

fn preview_headers(kind: PreviewKind, filename: &str) -> HeaderMap {
    let mut headers = preview_cors_headers();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(kind.content_type()),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(kind.cache_control()),
    );

    if kind.is_epub() {
        headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        headers.insert(
            header::CONTENT_DISPOSITION,
            content_disposition("inline", filename),
        );
    }

    headers
}

/// Falls back to the bare disposition type when the filename cannot be
/// carried in a header value.
fn content_disposition(disposition: &'static str, filename: &str) -> HeaderValue {
    HeaderValue::from_bytes(format!("{}; filename={}", disposition, filename).as_bytes())
        .unwrap_or_else(|_| HeaderValue::from_static(disposition))
}

fn insert_header(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::{FileManager, FileManagerConfig, FileValidationConfig};
    use crate::handlers::routes::create_routes;
    use crate::logging::MemoryLogger;
    use axum::{body::to_bytes, http::Request, Router};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "X-PAN-TEST-BOUNDARY";

    async fn create_test_app(validation: FileValidationConfig) -> (Router, Arc<MemoryLogger>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = FileManagerConfig::new(
            temp_dir.path().join("uploads"),
            temp_dir.path().join("tmp"),
        );
        config.validation = validation;

        let logger = Arc::new(MemoryLogger::new());
        let file_manager = FileManager::new(config, logger.clone());
        file_manager.initialize().await.unwrap();

        let state = AppState::new(file_manager, logger.clone());
        (create_routes().with_state(state), logger, temp_dir)
    }

    fn multipart_request(field: &str, filename: Option<&str>, data: &[u8]) -> Request<Body> {
        let disposition = match filename {
            Some(filename) => format!("form-data; name=\"{}\"; filename=\"{}\"", field, filename),
            None => format!("form-data; name=\"{}\"", field),
        };

        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(format!("Content-Disposition: {}\r\n", disposition).as_bytes());
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/files/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_upload_file() {
        let (app, _logger, temp_dir) = create_test_app(FileValidationConfig::default()).await;

        let response = app
            .oneshot(multipart_request("file", Some("hello.txt"), b"hello world"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["message"], "File uploaded successfully");
        assert_eq!(json["filename"], "hello.txt");
        assert_eq!(json["size"], "11 B");
        assert_eq!(json["type"], "document");

        let stored = std::fs::read(temp_dir.path().join("uploads/hello.txt")).unwrap();
        assert_eq!(stored, b"hello world");
    }

    #[tokio::test]
    async fn test_upload_without_file_field() {
        let (app, logger, _temp_dir) = create_test_app(FileValidationConfig::default()).await;

        let response = app
            .oneshot(multipart_request("attachment", Some("hello.txt"), b"data"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["error"], "No file uploaded");
        assert_eq!(json["status"], 400);
        assert_eq!(logger.entries_at(tracing::Level::WARN), vec!["No file uploaded".to_string()]);
    }

    #[tokio::test]
    async fn test_upload_field_without_filename() {
        let (app, _logger, _temp_dir) = create_test_app(FileValidationConfig::default()).await;

        let response = app
            .oneshot(multipart_request("file", None, b"data"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "No file uploaded");
    }

    #[tokio::test]
    async fn test_upload_rejects_invalid_type_and_size() {
        let (app, _logger, temp_dir) =
            create_test_app(FileValidationConfig::new(4, [".txt"])).await;

        let response = app
            .clone()
            .oneshot(multipart_request("file", Some("tool.exe"), b"MZ"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(multipart_request("file", Some("big.txt"), b"too many bytes"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert!(json["error"].as_str().unwrap().contains("exceeds maximum limit"));

        assert!(!temp_dir.path().join("uploads/big.txt").exists());
    }

    #[tokio::test]
    async fn test_upload_rejects_traversal_name() {
        let (app, _logger, temp_dir) = create_test_app(FileValidationConfig::default()).await;

        let response = app
            .oneshot(multipart_request("file", Some("../evil.txt"), b"x"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Invalid filename");
        assert!(!temp_dir.path().join("evil.txt").exists());
    }

    #[tokio::test]
    async fn test_download_file() {
        let (app, _logger, temp_dir) = create_test_app(FileValidationConfig::default()).await;
        std::fs::write(temp_dir.path().join("uploads/report.pdf"), b"%PDF-1.7 body").unwrap();

        let response = app.oneshot(get("/api/files/download/report.pdf")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(headers[header::CONTENT_LENGTH], "13");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"report.pdf\""
        );

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"%PDF-1.7 body");
    }

    #[tokio::test]
    async fn test_download_missing_file() {
        let (app, _logger, _temp_dir) = create_test_app(FileValidationConfig::default()).await;

        let response = app.oneshot(get("/api/files/download/missing.txt")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = json_body(response).await;
        assert_eq!(json["error"], "File not found");
        assert_eq!(json["status"], 404);
    }

    #[tokio::test]
    async fn test_preview_full_file() {
        let (app, _logger, temp_dir) = create_test_app(FileValidationConfig::default()).await;
        std::fs::write(temp_dir.path().join("uploads/photo.png"), vec![7u8; 64]).unwrap();

        let response = app.oneshot(get("/api/files/preview/photo.png")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "image/png");
        assert_eq!(headers[header::CONTENT_LENGTH], "64");
        assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=3600");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(
            headers[header::ACCESS_CONTROL_EXPOSE_HEADERS],
            "Content-Range, Content-Length"
        );
        assert!(headers.get(header::CONTENT_DISPOSITION).is_none());

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.len(), 64);
    }

    #[tokio::test]
    async fn test_preview_partial_content() {
        let (app, _logger, temp_dir) = create_test_app(FileValidationConfig::default()).await;
        let data: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(temp_dir.path().join("uploads/doc.pdf"), &data).unwrap();

        let request = Request::builder()
            .uri("/api/files/preview/doc.pdf")
            .header(header::RANGE, "bytes=100-199")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 100-199/1000");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "100");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], &data[100..200]);
    }

    #[tokio::test]
    async fn test_preview_serves_first_of_multiple_ranges() {
        let (app, _logger, temp_dir) = create_test_app(FileValidationConfig::default()).await;
        std::fs::write(temp_dir.path().join("uploads/doc.pdf"), b"0123456789").unwrap();

        let request = Request::builder()
            .uri("/api/files/preview/doc.pdf")
            .header(header::RANGE, "bytes=50-60, -3, 0-1")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 7-9/10");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"789");
    }

    #[tokio::test]
    async fn test_preview_unsatisfiable_range() {
        let (app, logger, temp_dir) = create_test_app(FileValidationConfig::default()).await;
        std::fs::write(temp_dir.path().join("uploads/doc.pdf"), vec![0u8; 1000]).unwrap();

        for range in ["bytes=2000-3000", "notbytes=0-10"] {
            let request = Request::builder()
                .uri("/api/files/preview/doc.pdf")
                .header(header::RANGE, range)
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();

            assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE, "{}", range);
            assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */1000");
            let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            assert!(body.is_empty());
        }

        assert_eq!(logger.entries_at(tracing::Level::WARN).len(), 2);
    }

    #[tokio::test]
    async fn test_preview_epub_headers() {
        let (app, _logger, temp_dir) = create_test_app(FileValidationConfig::default()).await;
        std::fs::write(temp_dir.path().join("uploads/novel.epub"), b"PK\x03\x04").unwrap();

        let response = app.oneshot(get("/api/files/preview/novel.epub")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "application/epub+zip");
        assert_eq!(headers[header::ACCEPT_RANGES], "bytes");
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "inline; filename=novel.epub"
        );
    }

    #[tokio::test]
    async fn test_preview_unsupported_and_missing() {
        let (app, _logger, temp_dir) = create_test_app(FileValidationConfig::default()).await;
        std::fs::write(temp_dir.path().join("uploads/notes.txt"), b"plain").unwrap();

        let response = app
            .clone()
            .oneshot(get("/api/files/preview/notes.txt"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await["error"],
            "File format not supported for preview"
        );

        let response = app.oneshot(get("/api/files/preview/absent.txt")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_preview_options_skips_lookup() {
        let (app, _logger, _temp_dir) = create_test_app(FileValidationConfig::default()).await;

        let request = Request::builder()
            .method("OPTIONS")
            .uri("/api/files/preview/does-not-exist.pdf")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS],
            "GET, OPTIONS, HEAD"
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_list_files() {
        let (app, _logger, temp_dir) = create_test_app(FileValidationConfig::default()).await;
        for name in ["b.png", "a.txt", "Report.PDF"] {
            std::fs::write(temp_dir.path().join("uploads").join(name), b"1234").unwrap();
        }

        let response = app
            .clone()
            .oneshot(get("/api/files/list"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["total"], 3);
        assert_eq!(json["page"], 1);
        assert_eq!(json["pageSize"], 10);
        assert_eq!(json["files"][0]["name"], "Report.PDF");
        assert_eq!(json["files"][1]["name"], "a.txt");
        assert_eq!(json["files"][1]["size"], "4 B");
        assert_eq!(json["files"][2]["type"], "image");

        let response = app
            .oneshot(get("/api/files/list?page=x&pageSize=2&search=REPORT"))
            .await
            .unwrap();
        let json = json_body(response).await;
        assert_eq!(json["total"], 1);
        assert_eq!(json["page"], 1);
        assert_eq!(json["pageSize"], 2);
        assert_eq!(json["files"][0]["name"], "Report.PDF");
    }

    #[tokio::test]
    async fn test_delete_file() {
        let (app, _logger, temp_dir) = create_test_app(FileValidationConfig::default()).await;
        std::fs::write(temp_dir.path().join("uploads/old.zip"), b"PK").unwrap();

        let request = || {
            Request::builder()
                .method("DELETE")
                .uri("/api/files/delete/old.zip")
                .body(Body::empty())
                .unwrap()
        };

        let response = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["message"], "File deleted successfully");
        assert!(!temp_dir.path().join("uploads/old.zip").exists());

        let response = app.oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_encoded_traversal_is_rejected() {
        let (app, _logger, temp_dir) = create_test_app(FileValidationConfig::default()).await;
        std::fs::write(temp_dir.path().join("secret.txt"), b"secret").unwrap();

        let response = app
            .oneshot(get("/api/files/download/..%2Fsecret.txt"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Invalid filename");
    }
}
