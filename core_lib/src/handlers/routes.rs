//! Route table for the file service

use crate::{handlers::files, AppState};
use axum::{
    routing::{delete, get, post},
    Router,
};

pub const API_PREFIX: &str = "/api/files";

pub fn create_routes() -> Router<AppState> {
    Router::new().nest(API_PREFIX, file_routes())
}

fn file_routes() -> Router<AppState> {
    Router::new()
        .route("/upload", post(files::upload_file))
        .route("/download/:filename", get(files::download_file))
        .route(
            "/preview/:filename",
            get(files::preview_file).options(files::preview_options),
        )
        .route("/list", get(files::list_files))
        .route("/delete/:filename", delete(files::delete_file))
}
