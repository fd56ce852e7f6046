//! Injectable logging capability.
//!
//! Components receive an `Arc<dyn Logger>` at construction instead of
//! reaching for a global. The only process-wide state is the `tracing`
//! subscriber installed by the binary at startup.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::Level;

pub trait Logger: Send + Sync {
    fn debug(&self, message: &str);
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);

    /// Logs and terminates the process with exit status 1.
    fn fatal(&self, message: &str) -> ! {
        self.error(message);
        std::process::exit(1)
    }
}

pub type SharedLogger = Arc<dyn Logger>;

/// Parse a configured verbosity; unknown values fall back to `info`.
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Forwards to `tracing`, tagging every event with the owning component.
#[derive(Debug, Clone)]
pub struct TracingLogger {
    component: &'static str,
}

impl TracingLogger {
    pub fn new(component: &'static str) -> Self {
        Self { component }
    }

    pub fn shared(component: &'static str) -> SharedLogger {
        Arc::new(Self::new(component))
    }
}

impl Logger for TracingLogger {
    fn debug(&self, message: &str) {
        tracing::debug!(component = self.component, "{}", message);
    }

    fn info(&self, message: &str) {
        tracing::info!(component = self.component, "{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!(component = self.component, "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(component = self.component, "{}", message);
    }

    fn fatal(&self, message: &str) -> ! {
        tracing::error!(component = self.component, fatal = true, "{}", message);
        std::process::exit(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: Level,
    pub message: String,
}

/// Keeps every entry in memory; used by tests to assert on what was logged.
///
/// Test double only: `fatal` panics instead of exiting the process.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    pub fn entries_at(&self, level: Level) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|entry| entry.level == level)
            .map(|entry| entry.message.clone())
            .collect()
    }

    fn record(&self, level: Level, message: &str) {
        self.entries.lock().push(LogEntry {
            level,
            message: message.to_string(),
        });
    }
}

impl Logger for MemoryLogger {
    fn debug(&self, message: &str) {
        self.record(Level::DEBUG, message);
    }

    fn info(&self, message: &str) {
        self.record(Level::INFO, message);
    }

    fn warn(&self, message: &str) {
        self.record(Level::WARN, message);
    }

    fn error(&self, message: &str) {
        self.record(Level::ERROR, message);
    }

    fn fatal(&self, message: &str) -> ! {
        self.record(Level::ERROR, message);
        panic!("fatal: {}", message)
    }
}
