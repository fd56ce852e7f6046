//! Core library containing the file store, route handlers and server loop
//! for the file service.

pub mod config;
pub mod error;
pub mod files;
pub mod handlers;
pub mod logging;
pub mod middleware;

pub use config::AppConfig;
pub use error::{AppError, Result};
pub use files::{FileManager, FileManagerConfig, FileValidator};
pub use handlers::routes::create_routes;
pub use logging::{Logger, MemoryLogger, SharedLogger, TracingLogger};
pub use middleware::cors::cors_layer;
pub use middleware::logging::logging_layer;

use axum::{extract::DefaultBodyLimit, Router};
use std::net::SocketAddr;
use tokio::signal;
use tracing::info;

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub file_manager: FileManager,
    pub logger: SharedLogger,
}

impl AppState {
    pub fn new(file_manager: FileManager, logger: SharedLogger) -> Self {
        Self {
            file_manager,
            logger,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let body_limit = state
        .file_manager
        .max_file_size()
        .saturating_add(MULTIPART_OVERHEAD);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    Router::new()
        .merge(create_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer())
        .layer(logging_layer())
        .with_state(state)
}

pub async fn run_server(app: Router, addr: SocketAddr) -> Result<()> {
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let app = app.into_make_service_with_connect_info::<SocketAddr>();

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
