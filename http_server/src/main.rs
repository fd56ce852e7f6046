//! Main entry point for the file service binary

use anyhow::Result;
use pan_core::{
    config::LoggingConfig, create_app, logging::parse_level, run_server, AppConfig, AppState,
    FileManager, FileManagerConfig, TracingLogger,
};
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    init_tracing(&config.logging);

    info!("Configuration loaded successfully");
    info!("Server will bind to: {}", config.bind_address());

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address: {}", e))?;

    let logger = TracingLogger::shared("file_manager");
    let file_manager = FileManager::new(FileManagerConfig::from(&config.files), logger.clone());

    if let Err(e) = file_manager.initialize().await {
        logger.fatal(&format!(
            "Failed to create upload directory {}: {}",
            config.files.upload_dir.display(),
            e
        ));
    }

    info!(
        "Serving files from {} (max upload {} MB)",
        config.files.upload_dir.display(),
        config.files.max_file_size_mb
    );

    let state = AppState::new(file_manager, logger);
    let app = create_app(state);

    run_server(app, addr).await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = parse_level(&config.level).to_string().to_lowercase();
        format!(
            "pan_core={level},{}={level},tower_http=debug",
            env!("CARGO_CRATE_NAME").replace('-', "_"),
        )
        .into()
    });

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    let is_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or_else(|_| config.format == "json");

    if is_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.pretty())
            .init();
    }
}
