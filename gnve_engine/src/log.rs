//! Logging port for GNVE
//!
//! This module provides the engine's logging model:
//! - Customizable sinks via the Logger trait
//! - Severity levels (Trace, Debug, Info, Warn, Error)
//! - Colored console output by default
//! - An in-memory ring sink the diagnostic overlay can display
//! - File and line information for detailed ERROR logs
//!
//! There is no global logger. A [`Log`] handle is created once at startup and
//! passed to every component constructor that needs to report status.

use chrono::{DateTime, Local};
use colored::*;
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

/// Logger trait for custom logging implementations
///
/// Implement this trait to create custom sinks (file logging, network logging, etc.)
///
/// # Example
///
/// ```no_run
/// use gnve_engine::log::{Logger, LogEntry};
///
/// struct FileLogger {
///     file: std::fs::File,
/// }
///
/// impl Logger for FileLogger {
///     fn log(&self, entry: &LogEntry) {
///         // Write to file...
///     }
/// }
/// ```
pub trait Logger: Send + Sync {
    /// Log an entry
    fn log(&self, entry: &LogEntry);
}

/// Log entry containing all information about a log message
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Severity level (Trace, Debug, Info, Warn, Error)
    pub severity: LogSeverity,

    /// Timestamp when the log was created
    pub timestamp: SystemTime,

    /// Source module (e.g., "gnve::swapchain", "gnve::import")
    pub source: String,

    /// Log message
    pub message: String,

    /// Source file (only for detailed ERROR logs)
    pub file: Option<&'static str>,

    /// Source line (only for detailed ERROR logs)
    pub line: Option<u32>,
}

impl LogEntry {
    /// Plain-text rendering used by sinks that do not colorize
    pub fn format_plain(&self) -> String {
        let datetime: DateTime<Local> = self.timestamp.into();
        let timestamp = datetime.format("%H:%M:%S%.3f");
        match (self.file, self.line) {
            (Some(file), Some(line)) => format!(
                "[{}] [{}] [{}] {} ({}:{})",
                timestamp, self.severity, self.source, self.message, file, line
            ),
            _ => format!(
                "[{}] [{}] [{}] {}",
                timestamp, self.severity, self.source, self.message
            ),
        }
    }
}

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogSeverity {
    /// Very verbose debug information (typically disabled in release)
    Trace,

    /// Development/debugging information
    Debug,

    /// Important informational messages
    Info,

    /// Warning messages (potential issues)
    Warn,

    /// Error messages (critical issues with file:line details)
    Error,
}

impl fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogSeverity::Trace => "TRACE",
            LogSeverity::Debug => "DEBUG",
            LogSeverity::Info => "INFO ",
            LogSeverity::Warn => "WARN ",
            LogSeverity::Error => "ERROR",
        };
        f.write_str(name)
    }
}

impl FromStr for LogSeverity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogSeverity::Trace),
            "debug" => Ok(LogSeverity::Debug),
            "info" => Ok(LogSeverity::Info),
            "warn" | "warning" => Ok(LogSeverity::Warn),
            "error" => Ok(LogSeverity::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// Default logger implementation using colored console output
///
/// Format:
/// - Normal: `[timestamp] [SEVERITY] [source] message`
/// - Error: `[timestamp] [ERROR] [source] message (file:line)`
pub struct DefaultLogger;

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        // Format timestamp as YYYY-MM-DD HH:MM:SS.mmm
        let datetime: DateTime<Local> = entry.timestamp.into();
        let timestamp = datetime.format("%Y-%m-%d %H:%M:%S%.3f").to_string();

        let severity_str = match entry.severity {
            LogSeverity::Trace => "TRACE".bright_black(),
            LogSeverity::Debug => "DEBUG".cyan(),
            LogSeverity::Info => "INFO ".green(),
            LogSeverity::Warn => "WARN ".yellow(),
            LogSeverity::Error => "ERROR".red().bold(),
        };

        let source = entry.source.bright_blue();

        if let (Some(file), Some(line)) = (entry.file, entry.line) {
            eprintln!(
                "[{}] [{}] [{}] {} ({}:{})",
                timestamp, severity_str, source, entry.message, file, line
            );
        } else {
            println!("[{}] [{}] [{}] {}", timestamp, severity_str, source, entry.message);
        }
    }
}

/// Bounded in-memory sink, newest lines last
///
/// The oldest line is dropped once `max_lines` is reached.
pub struct MemoryLogger {
    lines: Mutex<VecDeque<String>>,
    max_lines: usize,
}

impl MemoryLogger {
    /// Default number of retained lines
    pub const DEFAULT_MAX_LINES: usize = 1024;

    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: Mutex::new(VecDeque::with_capacity(max_lines.min(Self::DEFAULT_MAX_LINES))),
            max_lines: max_lines.max(1),
        }
    }

    /// Snapshot of the retained lines
    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.iter().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.lines.lock().map(|lines| lines.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryLogger {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_LINES)
    }
}

impl Logger for MemoryLogger {
    fn log(&self, entry: &LogEntry) {
        if let Ok(mut lines) = self.lines.lock() {
            if lines.len() >= self.max_lines {
                lines.pop_front();
            }
            lines.push_back(entry.format_plain());
        }
    }
}

/// Forwards every entry to each child logger in order
pub struct FanoutLogger {
    sinks: Vec<Arc<dyn Logger>>,
}

impl FanoutLogger {
    pub fn new(sinks: Vec<Arc<dyn Logger>>) -> Self {
        Self { sinks }
    }
}

impl Logger for FanoutLogger {
    fn log(&self, entry: &LogEntry) {
        for sink in &self.sinks {
            sink.log(entry);
        }
    }
}

/// Discards everything
struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _entry: &LogEntry) {}
}

/// Logging port threaded through component constructors
///
/// Cheap to clone; all clones share the same sink.
#[derive(Clone)]
pub struct Log {
    logger: Arc<dyn Logger>,
    min_severity: LogSeverity,
}

impl Log {
    pub fn new(logger: Arc<dyn Logger>, min_severity: LogSeverity) -> Self {
        Self { logger, min_severity }
    }

    /// Colored console output at the given minimum severity
    pub fn console(min_severity: LogSeverity) -> Self {
        Self::new(Arc::new(DefaultLogger), min_severity)
    }

    /// A port that drops every message
    pub fn disabled() -> Self {
        Self::new(Arc::new(NullLogger), LogSeverity::Error)
    }

    pub fn min_severity(&self) -> LogSeverity {
        self.min_severity
    }

    /// Whether a message at `severity` would reach the sink
    pub fn enabled(&self, severity: LogSeverity) -> bool {
        severity >= self.min_severity
    }

    /// Log a message (used by the engine_* macros)
    pub fn log(&self, severity: LogSeverity, source: &str, message: String) {
        if !self.enabled(severity) {
            return;
        }
        self.logger.log(&LogEntry {
            severity,
            timestamp: SystemTime::now(),
            source: source.to_string(),
            message,
            file: None,
            line: None,
        });
    }

    /// Log a message with file:line information (used by engine_error!)
    pub fn log_detailed(
        &self,
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        if !self.enabled(severity) {
            return;
        }
        self.logger.log(&LogEntry {
            severity,
            timestamp: SystemTime::now(),
            source: source.to_string(),
            message,
            file: Some(file),
            line: Some(line),
        });
    }
}

impl fmt::Debug for Log {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Log")
            .field("min_severity", &self.min_severity)
            .finish_non_exhaustive()
    }
}

// ===== LOGGING MACROS =====

/// Log a TRACE message (very verbose, typically disabled)
///
/// ```ignore
/// engine_trace!(log, "gnve::frame", "Entering tick {}", n);
/// ```
#[macro_export]
macro_rules! engine_trace {
    ($log:expr, $source:expr, $($arg:tt)*) => {
        $log.log($crate::log::LogSeverity::Trace, $source, format!($($arg)*))
    };
}

/// Log a DEBUG message (development information)
#[macro_export]
macro_rules! engine_debug {
    ($log:expr, $source:expr, $($arg:tt)*) => {
        $log.log($crate::log::LogSeverity::Debug, $source, format!($($arg)*))
    };
}

/// Log an INFO message (important events)
#[macro_export]
macro_rules! engine_info {
    ($log:expr, $source:expr, $($arg:tt)*) => {
        $log.log($crate::log::LogSeverity::Info, $source, format!($($arg)*))
    };
}

/// Log a WARN message (potential issues)
#[macro_export]
macro_rules! engine_warn {
    ($log:expr, $source:expr, $($arg:tt)*) => {
        $log.log($crate::log::LogSeverity::Warn, $source, format!($($arg)*))
    };
}

/// Log an ERROR message with file:line information
#[macro_export]
macro_rules! engine_error {
    ($log:expr, $source:expr, $($arg:tt)*) => {
        $log.log_detailed(
            $crate::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!()
        )
    };
}

/// Log an ERROR and evaluate to an `Error::InvalidResource` with the same message
#[macro_export]
macro_rules! engine_err {
    ($log:expr, $source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $log.log_detailed(
            $crate::log::LogSeverity::Error,
            $source,
            message.clone(),
            file!(),
            line!()
        );
        $crate::Error::InvalidResource(message)
    }};
}

/// Log an ERROR and return `Err(Error::InvalidResource)` from the enclosing function
#[macro_export]
macro_rules! engine_bail {
    ($log:expr, $source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($log, $source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
