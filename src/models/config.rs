//! Configuration data model and validation

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the speedtest backend
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Length of the download phase in seconds
    #[serde(default = "default_download_duration_secs")]
    pub download_duration_seconds: u64,

    /// Length of the upload phase in seconds
    #[serde(default = "default_upload_duration_secs")]
    pub upload_duration_seconds: u64,

    /// Concurrent download streams
    #[serde(default = "default_download_streams")]
    pub download_streams: usize,

    /// Concurrent upload streams
    #[serde(default = "default_upload_streams")]
    pub upload_streams: usize,

    /// Size of the payload each upload request carries
    #[serde(default = "default_upload_payload_bytes")]
    pub upload_payload_bytes: usize,

    /// Chunk hint (MB) passed to the download endpoint
    #[serde(default = "default_download_chunk_mb")]
    pub download_chunk_mb: u32,

    /// Number of timed latency probes
    #[serde(default = "default_ping_count")]
    pub ping_count: usize,

    /// Multiplier applied to measured throughput for protocol overhead
    #[serde(default = "default_overhead_factor")]
    pub overhead_factor: f64,

    /// Per-request timeout for latency probes and ISP/report calls
    #[serde(default = "default_timeout_secs")]
    pub timeout_seconds: u64,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Submit results to obtain a share link
    #[serde(default = "default_share_results")]
    pub share_results: bool,

    /// Print the final session as JSON
    #[serde(default)]
    pub json_output: bool,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            download_duration_seconds: default_download_duration_secs(),
            upload_duration_seconds: default_upload_duration_secs(),
            download_streams: default_download_streams(),
            upload_streams: default_upload_streams(),
            upload_payload_bytes: default_upload_payload_bytes(),
            download_chunk_mb: default_download_chunk_mb(),
            ping_count: default_ping_count(),
            overhead_factor: default_overhead_factor(),
            timeout_seconds: default_timeout_secs(),
            enable_color: default_enable_color(),
            share_results: default_share_results(),
            json_output: false,
            verbose: false,
            debug: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn download_duration(&self) -> Duration {
        Duration::from_secs(self.download_duration_seconds)
    }

    pub fn upload_duration(&self) -> Duration {
        Duration::from_secs(self.upload_duration_seconds)
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Result<()> {
        if self.server_url.is_empty() {
            return Err(AppError::config("Server URL cannot be empty"));
        }

        match url::Url::parse(&self.server_url) {
            Ok(parsed) => {
                if parsed.scheme() != "http" && parsed.scheme() != "https" {
                    return Err(AppError::config(format!(
                        "Server URL must use http or https: {}",
                        self.server_url
                    )));
                }
            }
            Err(e) => {
                return Err(AppError::config(format!("Invalid server URL '{}': {}", self.server_url, e)));
            }
        }

        if self.download_duration_seconds == 0 || self.download_duration_seconds > 120 {
            return Err(AppError::config("Download duration must be between 1 and 120 seconds"));
        }

        if self.upload_duration_seconds == 0 || self.upload_duration_seconds > 120 {
            return Err(AppError::config("Upload duration must be between 1 and 120 seconds"));
        }

        if self.download_streams == 0 || self.download_streams > 32 {
            return Err(AppError::config("Download streams must be between 1 and 32"));
        }

        if self.upload_streams == 0 || self.upload_streams > 32 {
            return Err(AppError::config("Upload streams must be between 1 and 32"));
        }

        if self.upload_payload_bytes < 1024 || self.upload_payload_bytes > 64 * 1024 * 1024 {
            return Err(AppError::config("Upload payload must be between 1 KiB and 64 MiB"));
        }

        if self.download_chunk_mb == 0 || self.download_chunk_mb > 1024 {
            return Err(AppError::config("Download chunk size must be between 1 and 1024 MB"));
        }

        if self.ping_count == 0 || self.ping_count > 100 {
            return Err(AppError::config("Ping count must be between 1 and 100"));
        }

        if !self.overhead_factor.is_finite() || self.overhead_factor < 1.0 || self.overhead_factor > 2.0 {
            return Err(AppError::config("Overhead factor must be between 1.0 and 2.0"));
        }

        if self.timeout_seconds == 0 {
            return Err(AppError::config("Timeout must be greater than 0"));
        }

        if self.timeout_seconds > 300 {
            return Err(AppError::config("Timeout cannot exceed 300 seconds"));
        }

        Ok(())
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(server) = std::env::var("SPEEDTEST_SERVER") {
            let server = server.trim();
            if !server.is_empty() {
                self.server_url = server.to_string();
            }
        }

        if let Some(value) = parse_env("DOWNLOAD_DURATION")? {
            self.download_duration_seconds = value;
        }

        if let Some(value) = parse_env("UPLOAD_DURATION")? {
            self.upload_duration_seconds = value;
        }

        if let Some(value) = parse_env("DOWNLOAD_STREAMS")? {
            self.download_streams = value;
        }

        if let Some(value) = parse_env("UPLOAD_STREAMS")? {
            self.upload_streams = value;
        }

        if let Some(value) = parse_env("UPLOAD_PAYLOAD_BYTES")? {
            self.upload_payload_bytes = value;
        }

        if let Some(value) = parse_env("DOWNLOAD_CHUNK_MB")? {
            self.download_chunk_mb = value;
        }

        if let Some(value) = parse_env("PING_COUNT")? {
            self.ping_count = value;
        }

        if let Some(value) = parse_env("OVERHEAD_FACTOR")? {
            self.overhead_factor = value;
        }

        if let Some(value) = parse_env("TIMEOUT_SECONDS")? {
            self.timeout_seconds = value;
        }

        if let Some(value) = parse_env("ENABLE_COLOR")? {
            self.enable_color = value;
        }

        if let Some(value) = parse_env("SHARE_RESULTS")? {
            self.share_results = value;
        }

        Ok(())
    }
}

fn parse_env<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, raw, e))),
        Err(_) => Ok(None),
    }
}

// Default value functions for serde
fn default_server_url() -> String {
    crate::defaults::DEFAULT_SERVER_URL.to_string()
}

fn default_download_duration_secs() -> u64 {
    crate::defaults::DEFAULT_DOWNLOAD_DURATION.as_secs()
}

fn default_upload_duration_secs() -> u64 {
    crate::defaults::DEFAULT_UPLOAD_DURATION.as_secs()
}

fn default_download_streams() -> usize {
    crate::defaults::DEFAULT_DOWNLOAD_STREAMS
}

fn default_upload_streams() -> usize {
    crate::defaults::DEFAULT_UPLOAD_STREAMS
}

fn default_upload_payload_bytes() -> usize {
    crate::defaults::DEFAULT_UPLOAD_PAYLOAD_BYTES
}

fn default_download_chunk_mb() -> u32 {
    crate::defaults::DEFAULT_DOWNLOAD_CHUNK_MB
}

fn default_ping_count() -> usize {
    crate::defaults::DEFAULT_PING_COUNT
}

fn default_overhead_factor() -> f64 {
    crate::defaults::DEFAULT_OVERHEAD_FACTOR
}

fn default_timeout_secs() -> u64 {
    crate::defaults::DEFAULT_TIMEOUT.as_secs()
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}

fn default_share_results() -> bool {
    crate::defaults::DEFAULT_SHARE_RESULTS
}
