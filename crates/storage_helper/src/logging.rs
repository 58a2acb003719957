//! Diagnostic logging for storage operations.
//!
//! # Responsibility
//! - Provide the toggleable `StorageLogger` handle used by the facade and
//!   every built-in backend.
//! - Bootstrap a stdout `log` backend exactly once per process.
//!
//! # Invariants
//! - Logging never alters control flow; a disabled logger drops lines.
//! - The process-wide handle is created on first use and enabled by default.
//! - Logging initialization must not panic.
//! - Re-initialization with a different level is rejected.

use flexi_logger::{Logger, LoggerHandle, WriteMode};
use log::{error, info, warn};
use once_cell::sync::{Lazy, OnceCell};
use std::fmt::{self, Arguments};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// `log` target used by the default sink.
pub const LOG_TARGET: &str = "storage_helper";
const MAX_LOGGED_KEY_CHARS: usize = 96;

static LOGGING_STATE: OnceCell<LoggingState> = OnceCell::new();
static SHARED_LOGGER: Lazy<StorageLogger> =
    Lazy::new(|| StorageLogger::new(Arc::new(LogCrateSink)));

struct LoggingState {
    level: &'static str,
    _logger: LoggerHandle,
}

/// Severity of one diagnostic line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// Destination for formatted diagnostic lines.
pub trait LogSink: Send + Sync {
    fn write_line(&self, level: LogLevel, line: &str);
}

/// Forwards lines to the `log` facade under [`LOG_TARGET`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCrateSink;

impl LogSink for LogCrateSink {
    fn write_line(&self, level: LogLevel, line: &str) {
        match level {
            LogLevel::Info => info!(target: LOG_TARGET, "{line}"),
            LogLevel::Warning => warn!(target: LOG_TARGET, "{line}"),
            LogLevel::Error => error!(target: LOG_TARGET, "{line}"),
        }
    }
}

struct LoggerState {
    enabled: AtomicBool,
    sink: Arc<dyn LogSink>,
}

/// Cloneable handle to a toggleable diagnostic logger.
///
/// Clones share the enabled flag and sink, so toggling one handle toggles
/// every component holding a clone.
#[derive(Clone)]
pub struct StorageLogger {
    state: Arc<LoggerState>,
}

impl StorageLogger {
    /// Builds an isolated logger writing to `sink`, enabled.
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            state: Arc::new(LoggerState {
                enabled: AtomicBool::new(true),
                sink,
            }),
        }
    }

    /// Returns the process-wide logger, creating it on first use.
    pub fn shared() -> Self {
        SHARED_LOGGER.clone()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.state.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enabled.load(Ordering::SeqCst)
    }

    /// Formats and emits one line when enabled.
    pub fn log(&self, level: LogLevel, args: Arguments<'_>) {
        if !self.is_enabled() {
            return;
        }
        let line = sanitize_message(&args.to_string(), usize::MAX);
        self.state.sink.write_line(level, &line);
    }

    pub fn info(&self, args: Arguments<'_>) {
        self.log(LogLevel::Info, args);
    }

    pub fn warning(&self, args: Arguments<'_>) {
        self.log(LogLevel::Warning, args);
    }

    pub fn error(&self, args: Arguments<'_>) {
        self.log(LogLevel::Error, args);
    }
}

impl fmt::Debug for StorageLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageLogger")
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}

/// Initializes a stdout `log` backend at `level`.
///
/// Returns `Ok(())` when logging is active, or a human-readable error string
/// when initialization fails.
///
/// # Invariants
/// - Calling this function repeatedly with the same `level` is idempotent.
/// - Calling this function with a different `level` is rejected.
/// - Initialization never panics.
pub fn init_logging(level: &str) -> Result<(), String> {
    let normalized_level = normalize_level(level)?;

    let state = LOGGING_STATE.get_or_try_init(|| -> Result<LoggingState, String> {
        let logger = Logger::try_with_str(normalized_level)
            .map_err(|err| format!("invalid log level `{normalized_level}`: {err}"))?
            .log_to_stdout()
            .format_for_stdout(flexi_logger::detailed_format)
            .write_mode(WriteMode::Direct)
            .start()
            .map_err(|err| format!("failed to start logger: {err}"))?;

        info!(
            target: LOG_TARGET,
            "event=logging_init module=logging status=ok level={} version={}",
            normalized_level,
            env!("CARGO_PKG_VERSION")
        );

        Ok(LoggingState {
            level: normalized_level,
            _logger: logger,
        })
    })?;

    if state.level != normalized_level {
        return Err(format!(
            "logging already initialized with level `{}`; refusing to switch to `{}`",
            state.level, normalized_level
        ));
    }

    Ok(())
}

/// Returns the active `log` backend level, or `None` before [`init_logging`].
pub fn logging_status() -> Option<&'static str> {
    LOGGING_STATE.get().map(|state| state.level)
}

/// Returns the default log level for current build mode.
///
/// - `debug` builds -> `debug`
/// - `release` builds -> `info`
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

/// Renders a storage key for a log line.
pub(crate) fn display_key(key: &str) -> String {
    sanitize_message(key, MAX_LOGGED_KEY_CHARS)
}

fn normalize_level(level: &str) -> Result<&'static str, String> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(format!(
            "unsupported log level `{other}`; expected trace|debug|info|warn|error"
        )),
    }
}

fn sanitize_message(value: &str, max_chars: usize) -> String {
    let normalized = value.replace(['\n', '\r'], " ");
    if max_chars == usize::MAX {
        return normalized;
    }
    let mut truncated = normalized.chars().take(max_chars).collect::<String>();
    if normalized.chars().count() > max_chars {
        truncated.push_str("...");
    }
    truncated
}
