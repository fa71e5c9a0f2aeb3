//! Structured logging system for the network speed tester
//!
//! This module provides:
//! - Structured logging with multiple levels and contexts
//! - Correlated operations (one per measurement phase)
//! - Measurement event logging (probes, transfer failures, phase results)
//! - Error event logging for recovered collaborator failures
//! - JSON structured output in debug mode

use crate::client::HttpUtils;
use crate::error::{AppError, Result};
use crate::models::{Config, LatencyResult, PhaseKind, ThroughputResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinError;
use uuid::Uuid;

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    /// Trace level - most detailed
    Trace = 0,
    /// Debug level - detailed information for debugging
    Debug = 1,
    /// Info level - general application information
    Info = 2,
    /// Warning level - potentially harmful situations
    Warn = 3,
    /// Error level - error events but application can continue
    Error = 4,
    /// Fatal level - severe error events that cause application termination
    Fatal = 5,
}

impl LogLevel {
    /// Get log level name as string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }

    /// Get ANSI color code for console output
    pub fn color_code(&self) -> &'static str {
        match self {
            LogLevel::Trace => "\x1b[37m",    // White
            LogLevel::Debug => "\x1b[36m",    // Cyan
            LogLevel::Info => "\x1b[32m",     // Green
            LogLevel::Warn => "\x1b[33m",     // Yellow
            LogLevel::Error => "\x1b[31m",    // Red
            LogLevel::Fatal => "\x1b[35m",    // Magenta
        }
    }

    /// Reset ANSI color code
    pub fn reset_code() -> &'static str {
        "\x1b[0m"
    }
}

impl std::str::FromStr for LogLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            "FATAL" => Ok(LogLevel::Fatal),
            _ => Err(AppError::parse(format!("Invalid log level: {}", s))),
        }
    }
}

/// Log entry structure for structured logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Timestamp when log entry was created
    pub timestamp: DateTime<Utc>,
    /// Log level
    pub level: LogLevel,
    /// Log message
    pub message: String,
    /// Logger name/component
    pub logger: String,
    /// Correlation ID for tracking related events
    pub correlation_id: Option<String>,
    /// Additional structured fields
    pub fields: HashMap<String, serde_json::Value>,
    /// Thread ID if available
    pub thread_id: Option<String>,
}

/// Logger implementation with multiple output formats
pub struct Logger {
    /// Minimum log level to output
    min_level: LogLevel,
    /// Whether to use colored output
    use_color: bool,
    /// Output format
    format: LogFormat,
    /// Logger name
    name: String,
    /// Shared context storage
    context: Arc<RwLock<LogContext>>,
}

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    /// Human-readable console format
    Console,
    /// JSON format for structured logging
    Json,
    /// Compact single-line format
    Compact,
}

/// Shared logging context for correlation and session tracking
#[derive(Debug, Default)]
struct LogContext {
    /// Global correlation ID for the session
    session_id: Option<String>,
    /// Current operation correlation ID
    current_correlation_id: Option<String>,
    /// Additional context fields
    context_fields: HashMap<String, serde_json::Value>,
}

/// Specialized logger for measurement events
pub struct MeasurementLogger {
    logger: Logger,
}

/// Error event logger with enhanced context
pub struct ErrorEventLogger {
    logger: Logger,
}

impl Logger {
    /// Create a new logger
    pub fn new(name: String) -> Self {
        Self {
            min_level: LogLevel::Info,
            use_color: true,
            format: LogFormat::Console,
            name,
            context: Arc::new(RwLock::new(LogContext::default())),
        }
    }

    /// Create a logger with specific configuration
    pub fn with_config(name: String, config: &Config) -> Self {
        let min_level = if config.debug {
            LogLevel::Debug
        } else if config.verbose {
            LogLevel::Info
        } else {
            LogLevel::Warn
        };

        Self {
            min_level,
            use_color: config.enable_color,
            format: if config.debug { LogFormat::Json } else { LogFormat::Console },
            name,
            context: Arc::new(RwLock::new(LogContext::default())),
        }
    }

    /// Set minimum log level
    pub fn set_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    /// Set output format
    pub fn set_format(&mut self, format: LogFormat) {
        self.format = format;
    }

    /// Set session correlation ID
    pub async fn set_session_id(&self, session_id: String) {
        let mut context = self.context.write().await;
        context.session_id = Some(session_id);
    }

    /// Add context field for all subsequent log entries
    pub async fn add_context_field<T: Serialize>(&self, key: String, value: T) {
        if let Ok(json_value) = serde_json::to_value(value) {
            let mut context = self.context.write().await;
            context.context_fields.insert(key, json_value);
        }
    }

    /// Start a correlated operation
    pub async fn start_operation(&self, operation_name: &str) -> String {
        let correlation_id = Uuid::new_v4().to_string();
        {
            let mut context = self.context.write().await;
            context.current_correlation_id = Some(correlation_id.clone());
        }

        self.info(&format!("Started operation: {}", operation_name))
            .correlation_id(&correlation_id)
            .field("operation", operation_name)
            .field("operation_type", "start")
            .log()
            .await;

        correlation_id
    }

    /// End a correlated operation
    pub async fn end_operation(&self, correlation_id: &str, operation_name: &str, success: bool) {
        self.info(&format!("Completed operation: {} (success: {})", operation_name, success))
            .correlation_id(correlation_id)
            .field("operation", operation_name)
            .field("operation_type", "end")
            .field("success", success)
            .log()
            .await;

        // Clear current correlation ID if it matches
        let mut context = self.context.write().await;
        if context.current_correlation_id.as_deref() == Some(correlation_id) {
            context.current_correlation_id = None;
        }
    }

    /// Create a log entry builder
    pub fn log(&self, level: LogLevel, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder::new(self, level, message.to_string())
    }

    /// Convenience methods for different log levels
    pub fn debug(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Error, message)
    }

    /// Check if a log level would be output
    pub fn would_log(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    /// Write log entry to output
    async fn write_entry(&self, mut entry: LogEntry) {
        if entry.level < self.min_level {
            return;
        }

        let context = self.context.read().await;
        if let Some(session_id) = &context.session_id {
            entry.fields.insert("session_id".to_string(), serde_json::Value::String(session_id.clone()));
        }
        if entry.correlation_id.is_none() {
            entry.correlation_id = context.current_correlation_id.clone();
        }
        for (key, value) in &context.context_fields {
            entry.fields.insert(key.clone(), value.clone());
        }
        drop(context);

        let output = match self.format {
            LogFormat::Console => self.format_console(&entry),
            LogFormat::Json => self.format_json(&entry),
            LogFormat::Compact => self.format_compact(&entry),
        };

        // stdout carries results (including --json), so every log line goes to stderr
        let _ = writeln!(io::stderr(), "{}", output);
    }

    /// Format log entry for console output
    fn format_console(&self, entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f");
        let level_str = entry.level.as_str();

        let formatted_level = if self.use_color {
            format!("{}{:>5}{}", entry.level.color_code(), level_str, LogLevel::reset_code())
        } else {
            format!("{:>5}", level_str)
        };

        let mut output = format!("{} {} [{}] {}",
            timestamp,
            formatted_level,
            entry.logger,
            entry.message
        );

        if let Some(correlation_id) = &entry.correlation_id {
            let short: String = correlation_id.chars().take(8).collect();
            output.push_str(&format!(" [{}]", short));
        }

        if !entry.fields.is_empty() {
            let mut fields_str: Vec<String> = entry.fields.iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            fields_str.sort();
            output.push_str(&format!(" {{{}}}", fields_str.join(", ")));
        }

        output
    }

    /// Format log entry as JSON
    fn format_json(&self, entry: &LogEntry) -> String {
        match serde_json::to_string(entry) {
            Ok(json) => json,
            Err(_) => format!("{{\"error\": \"Failed to serialize log entry\", \"message\": \"{}\"}}", entry.message),
        }
    }

    /// Format log entry in compact format
    fn format_compact(&self, entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%H:%M:%S");
        format!("{} {} {}: {}",
            timestamp,
            entry.level.as_str().chars().next().unwrap_or('?'),
            entry.logger,
            entry.message
        )
    }
}

/// Builder pattern for creating log entries
pub struct LogEntryBuilder<'a> {
    logger: &'a Logger,
    entry: LogEntry,
}

impl<'a> LogEntryBuilder<'a> {
    fn new(logger: &'a Logger, level: LogLevel, message: String) -> Self {
        Self {
            logger,
            entry: LogEntry {
                timestamp: Utc::now(),
                level,
                message,
                logger: logger.name.clone(),
                correlation_id: None,
                fields: HashMap::new(),
                thread_id: std::thread::current().name().map(String::from),
            },
        }
    }

    /// Add a correlation ID
    pub fn correlation_id(mut self, id: &str) -> Self {
        self.entry.correlation_id = Some(id.to_string());
        self
    }

    /// Add a structured field
    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.entry.fields.insert(key.to_string(), json_value);
        }
        self
    }

    /// Add throughput phase figures
    pub fn throughput(self, result: &ThroughputResult) -> Self {
        self.field("bytes", result.bytes)
            .field("elapsed_seconds", result.elapsed_seconds)
            .field("mbps", result.mbps)
            .field("requests", result.requests)
            .field("failures", result.failures)
            .field("compensations", result.compensations)
            .field("compensated_bytes", result.compensated_bytes)
    }

    /// Add error information
    pub fn error_info(self, error: &AppError) -> Self {
        self.field("error_category", error.category())
            .field("error_recoverable", error.is_recoverable())
            .field("error_exit_code", error.exit_code())
    }

    /// Finalize and write the log entry
    pub async fn log(self) {
        self.logger.write_entry(self.entry).await;
    }
}

impl MeasurementLogger {
    /// Create a new measurement logger
    pub fn new(config: &Config) -> Self {
        Self {
            logger: Logger::with_config("MEASURE".to_string(), config),
        }
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Log one latency probe; failed probes carry the penalty value
    pub async fn log_probe(&self, index: usize, sample: Duration, error: Option<&AppError>) {
        let sample_ms = sample.as_secs_f64() * 1000.0;
        match error {
            None => {
                self.logger.debug(&format!("Probe {} round trip {:.2}ms", index + 1, sample_ms))
                    .field("probe", index + 1)
                    .field("sample_ms", sample_ms)
                    .log()
                    .await;
            }
            Some(err) => {
                self.logger.warn(&format!("Probe {} failed, using {:.0}ms penalty: {}", index + 1, sample_ms, err))
                    .field("probe", index + 1)
                    .field("sample_ms", sample_ms)
                    .error_info(err)
                    .log()
                    .await;
            }
        }
    }

    /// Log a failed transfer request inside a throughput phase
    pub async fn log_transfer_failure(&self, phase: PhaseKind, worker: usize, error: &AppError) {
        self.logger.warn(&format!("{} worker {} request failed: {}", phase, worker, error))
            .field("phase", phase.as_str())
            .field("worker", worker)
            .error_info(error)
            .log()
            .await;
    }

    /// Log an upload request whose remainder was added without acknowledgement
    pub async fn log_compensation(&self, worker: usize, shortfall: u64, aborted: bool) {
        self.logger.debug(&format!("Upload worker {} compensated {} bytes", worker, shortfall))
            .field("worker", worker)
            .field("shortfall_bytes", shortfall)
            .field("aborted", aborted)
            .log()
            .await;
    }

    /// Log a worker task that ended without returning its request counts
    pub async fn log_worker_lost(&self, phase: PhaseKind, error: &JoinError) {
        let cause = if error.is_panic() { "panicked" } else { "was cancelled" };
        self.logger.error(&format!("{} worker task {}, its request counts are lost", phase, cause))
            .field("phase", phase.as_str())
            .field("panicked", error.is_panic())
            .log()
            .await;
    }

    /// Log the reduced result of the ping phase
    pub async fn log_latency_complete(&self, result: &LatencyResult, samples: usize, failures: usize) {
        self.logger.info(&format!("Ping phase completed: {:.2}ms avg, {:.2}ms jitter", result.average_ms, result.jitter_ms))
            .field("phase", PhaseKind::Ping.as_str())
            .field("average_ms", result.average_ms)
            .field("jitter_ms", result.jitter_ms)
            .field("samples", samples)
            .field("failures", failures)
            .log()
            .await;
    }

    /// Log the final figures of a throughput phase
    pub async fn log_phase_complete(&self, phase: PhaseKind, result: &ThroughputResult) {
        self.logger.info(&format!("{} phase completed: {:.2} Mbps over {:.2}s", phase, result.mbps, result.elapsed_seconds))
            .field("phase", phase.as_str())
            .throughput(result)
            .log()
            .await;
    }
}

impl ErrorEventLogger {
    /// Create a new error event logger
    pub fn new(config: &Config) -> Self {
        Self {
            logger: Logger::with_config("ERR".to_string(), config),
        }
    }

    /// Log a collaborator failure that the run recovered from
    pub async fn log_recovered(&self, error: &AppError, fallback: &str) {
        self.logger.warn(&format!("Recovered from {} failure using: {}", error.category(), fallback))
            .error_info(error)
            .field("fallback", fallback)
            .field("message", error.to_string())
            .log()
            .await;
    }
}

/// Global logger factory and management
pub struct LoggerFactory {
    config: Config,
    session_id: String,
}

impl LoggerFactory {
    /// Create a new logger factory
    pub fn new(config: Config) -> Self {
        Self {
            config,
            session_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create a logger with a specific name
    pub async fn create_logger(&self, name: &str) -> Logger {
        let logger = Logger::with_config(name.to_string(), &self.config);
        logger.set_session_id(self.session_id.clone()).await;
        logger
    }

    /// Create a measurement logger; every entry carries the server host
    pub async fn create_measurement_logger(&self) -> MeasurementLogger {
        let logger = MeasurementLogger::new(&self.config);
        logger.logger.set_session_id(self.session_id.clone()).await;
        if let Ok(host) = HttpUtils::extract_domain(&self.config.server_url) {
            logger.logger.add_context_field("server".to_string(), host).await;
        }
        logger
    }

    /// Create an error event logger
    pub async fn create_error_logger(&self) -> ErrorEventLogger {
        let logger = ErrorEventLogger::new(&self.config);
        logger.logger.set_session_id(self.session_id.clone()).await;
        logger
    }

    /// Get session ID
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from_str("DEBUG").unwrap(), LogLevel::Debug);
        assert_eq!(LogLevel::from_str("info").unwrap(), LogLevel::Info);
        assert_eq!(LogLevel::from_str("warning").unwrap(), LogLevel::Warn);
        assert!(LogLevel::from_str("invalid").is_err());
    }

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Fatal);
    }

    #[tokio::test]
    async fn test_logger_creation() {
        let logger = Logger::new("TEST".to_string());
        assert_eq!(logger.name, "TEST");
        assert_eq!(logger.min_level, LogLevel::Info);
        assert!(logger.use_color);
    }

    #[tokio::test]
    async fn test_logger_with_config() {
        let config = Config {
            debug: true,
            verbose: true,
            enable_color: false,
            ..Default::default()
        };

        let logger = Logger::with_config("TEST".to_string(), &config);
        assert_eq!(logger.min_level, LogLevel::Debug);
        assert_eq!(logger.format, LogFormat::Json);
        assert!(!logger.use_color);

        let quiet = Logger::with_config("TEST".to_string(), &Config::default());
        assert_eq!(quiet.min_level, LogLevel::Warn);
        assert_eq!(quiet.format, LogFormat::Console);
    }

    #[tokio::test]
    async fn test_session_id_management() {
        let logger = Logger::new("TEST".to_string());
        logger.set_session_id("test-session".to_string()).await;

        let context = logger.context.read().await;
        assert_eq!(context.session_id.as_deref(), Some("test-session"));
    }

    #[tokio::test]
    async fn test_operation_correlation() {
        let logger = Logger::new("TEST".to_string());
        let correlation_id = logger.start_operation("download").await;
        assert!(!correlation_id.is_empty());
        assert_eq!(
            logger.context.read().await.current_correlation_id.as_deref(),
            Some(correlation_id.as_str())
        );

        logger.end_operation(&correlation_id, "download", true).await;
        assert!(logger.context.read().await.current_correlation_id.is_none());
    }

    #[tokio::test]
    async fn test_would_log() {
        let mut logger = Logger::new("TEST".to_string());
        logger.set_level(LogLevel::Warn);

        assert!(!logger.would_log(LogLevel::Debug));
        assert!(!logger.would_log(LogLevel::Info));
        assert!(logger.would_log(LogLevel::Warn));
        assert!(logger.would_log(LogLevel::Fatal));
    }

    #[test]
    fn test_log_formats() {
        let entry = LogEntry {
            timestamp: Utc::now(),
            level: LogLevel::Info,
            message: "Test message".to_string(),
            logger: "TEST".to_string(),
            correlation_id: Some("0123456789abcdef".to_string()),
            fields: {
                let mut map = HashMap::new();
                map.insert("phase".to_string(), serde_json::Value::String("upload".to_string()));
                map
            },
            thread_id: None,
        };

        let mut logger = Logger::new("TEST".to_string());
        logger.set_format(LogFormat::Compact);

        let console_output = logger.format_console(&entry);
        assert!(console_output.contains("INFO"));
        assert!(console_output.contains("Test message"));
        assert!(console_output.contains("[01234567]"));
        assert!(console_output.contains("phase=\"upload\""));

        let json_output = logger.format_json(&entry);
        assert!(json_output.starts_with('{'));
        assert!(json_output.ends_with('}'));

        let compact_output = logger.format_compact(&entry);
        assert!(compact_output.contains(" I "));
        assert!(compact_output.contains("Test message"));
    }

    #[tokio::test]
    async fn test_measurement_logging() {
        let config = Config::default();
        let logger = MeasurementLogger::new(&config);
        assert_eq!(logger.logger().name, "MEASURE");

        logger.log_probe(0, Duration::from_millis(12), None).await;
        logger.log_probe(1, Duration::from_millis(100), Some(&AppError::network("refused"))).await;
        logger.log_transfer_failure(PhaseKind::Download, 1, &AppError::http_request("status 503")).await;
        logger.log_compensation(2, 1024, true).await;
        logger.log_latency_complete(&LatencyResult::new(12.0, 1.0), 6, 1).await;
        logger.log_phase_complete(PhaseKind::Upload, &ThroughputResult::default()).await;
    }

    fn panicking_task() -> u64 {
        panic!("stream task bug")
    }

    #[tokio::test]
    async fn test_worker_lost_logging() {
        let logger = MeasurementLogger::new(&Config::default());
        let error = tokio::spawn(async { panicking_task() }).await.unwrap_err();
        assert!(error.is_panic());

        logger.log_worker_lost(PhaseKind::Download, &error).await;
    }

    #[tokio::test]
    async fn test_error_logging() {
        let config = Config::default();
        let err_logger = ErrorEventLogger::new(&config);
        let error = AppError::reporting("no id in response");

        assert_eq!(err_logger.logger.name, "ERR");
        err_logger.log_recovered(&error, "run finishes without share link").await;
    }

    #[tokio::test]
    async fn test_logger_factory() {
        let factory = LoggerFactory::new(Config::default());

        let logger = factory.create_logger("TEST").await;
        assert_eq!(logger.name, "TEST");
        let context = logger.context.read().await;
        assert_eq!(context.session_id.as_deref(), Some(factory.session_id()));
    }

    #[tokio::test]
    async fn test_measurement_logger_carries_server_host() {
        let config = Config {
            server_url: "https://speed.example.com:8443/speedtest/".to_string(),
            ..Default::default()
        };
        let factory = LoggerFactory::new(config);

        let logger = factory.create_measurement_logger().await;
        let context = logger.logger().context.read().await;
        assert_eq!(context.session_id.as_deref(), Some(factory.session_id()));
        assert_eq!(
            context.context_fields.get("server"),
            Some(&serde_json::Value::String("speed.example.com".to_string()))
        );
    }

    #[test]
    fn test_log_entry_serialization() {
        let entry = LogEntry {
            timestamp: Utc::now(),
            level: LogLevel::Warn,
            message: "Test".to_string(),
            logger: "TEST".to_string(),
            correlation_id: None,
            fields: HashMap::new(),
            thread_id: None,
        };

        let json = serde_json::to_string(&entry).unwrap();
        let deserialized: LogEntry = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.level, LogLevel::Warn);
        assert_eq!(deserialized.message, "Test");
    }
}
