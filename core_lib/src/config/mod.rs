pub mod settings;

pub use settings::{AppConfig, FileConfig, LoggingConfig, ServerConfig};
