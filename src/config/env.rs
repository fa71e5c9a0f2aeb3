//! Environment variable handling and .env file management

use crate::error::{AppError, Result};
use std::path::Path;

/// Supported variables as (name, description, example)
pub const SUPPORTED_ENV_VARS: &[(&str, &str, &str)] = &[
    ("SPEEDTEST_SERVER", "Base URL of the speedtest backend", "https://speed.example.com"),
    ("DOWNLOAD_DURATION", "Download phase length in seconds (1-120)", "15"),
    ("UPLOAD_DURATION", "Upload phase length in seconds (1-120)", "10"),
    ("DOWNLOAD_STREAMS", "Concurrent download streams (1-32)", "2"),
    ("UPLOAD_STREAMS", "Concurrent upload streams (1-32)", "4"),
    ("UPLOAD_PAYLOAD_BYTES", "Bytes per upload request (1 KiB - 64 MiB)", "2097152"),
    ("DOWNLOAD_CHUNK_MB", "Chunk hint for the download endpoint (1-1024)", "100"),
    ("PING_COUNT", "Number of timed latency probes (1-100)", "6"),
    ("OVERHEAD_FACTOR", "Protocol overhead multiplier (1.0-2.0)", "1.06"),
    ("TIMEOUT_SECONDS", "Request timeout in seconds (1-300)", "10"),
    ("ENABLE_COLOR", "Enable colored output", "true"),
    ("SHARE_RESULTS", "Submit results for a share link", "true"),
];

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load .env file if it exists
    pub fn load_env_file(debug: bool) -> Result<()> {
        if Path::new(".env").exists() {
            dotenv::from_filename(".env")?;

            if debug {
                eprintln!("Loaded configuration from .env file");
            }
        } else if debug {
            eprintln!("No .env file found, using defaults and CLI arguments");
        }

        Ok(())
    }

    /// Create example .env file content
    pub fn create_example_env_content() -> String {
        r#"# Network Speed Tester Configuration
#
# Values here are used as defaults and can be overridden by
# command-line arguments.

# Speedtest backend base URL
# SPEEDTEST_SERVER=http://localhost:8080

# Phase lengths in seconds
# DOWNLOAD_DURATION=15
# UPLOAD_DURATION=10

# Concurrent streams per phase
# DOWNLOAD_STREAMS=2
# UPLOAD_STREAMS=4

# Bytes carried by each upload request
# UPLOAD_PAYLOAD_BYTES=2097152

# Chunk hint (MB) requested from the download endpoint
# DOWNLOAD_CHUNK_MB=100

# Number of timed latency probes
# PING_COUNT=6

# Multiplier applied to measured throughput for protocol overhead
# OVERHEAD_FACTOR=1.06

# Request timeout in seconds
# TIMEOUT_SECONDS=10

# Enable colored output (true/false)
# ENABLE_COLOR=true

# Submit results to get a share link (true/false)
# SHARE_RESULTS=true

# Example configurations for different scenarios:
#
# Quick check over a slow link:
# DOWNLOAD_DURATION=5
# UPLOAD_DURATION=5
# UPLOAD_PAYLOAD_BYTES=262144
#
# Saturating a fast link:
# DOWNLOAD_STREAMS=6
# UPLOAD_STREAMS=6
"#
        .to_string()
    }

    /// Save example .env file to disk
    pub fn save_example_env_file(path: &Path) -> Result<()> {
        let content = Self::create_example_env_content();
        std::fs::write(path, content)
            .map_err(|e| AppError::config(format!("Failed to write example .env file: {}", e)))?;

        Ok(())
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        match key {
            "SPEEDTEST_SERVER" => {
                let parsed = url::Url::parse(value)
                    .map_err(|e| AppError::config(format!("Invalid SPEEDTEST_SERVER '{}': {}", value, e)))?;
                if parsed.scheme() != "http" && parsed.scheme() != "https" {
                    return Err(AppError::config(format!("SPEEDTEST_SERVER must use http or https: {}", value)));
                }
            }
            "DOWNLOAD_DURATION" | "UPLOAD_DURATION" => {
                check_range::<u64>(key, value, 1, 120)?;
            }
            "DOWNLOAD_STREAMS" | "UPLOAD_STREAMS" => {
                check_range::<usize>(key, value, 1, 32)?;
            }
            "UPLOAD_PAYLOAD_BYTES" => {
                check_range::<usize>(key, value, 1024, 64 * 1024 * 1024)?;
            }
            "DOWNLOAD_CHUNK_MB" => {
                check_range::<u32>(key, value, 1, 1024)?;
            }
            "PING_COUNT" => {
                check_range::<usize>(key, value, 1, 100)?;
            }
            "OVERHEAD_FACTOR" => {
                let factor: f64 = value
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid OVERHEAD_FACTOR value '{}': {}", value, e)))?;
                if !(1.0..=2.0).contains(&factor) {
                    return Err(AppError::config(format!("OVERHEAD_FACTOR must be between 1.0 and 2.0, got: {}", factor)));
                }
            }
            "TIMEOUT_SECONDS" => {
                check_range::<u64>(key, value, 1, 300)?;
            }
            "ENABLE_COLOR" | "SHARE_RESULTS" => {
                value
                    .parse::<bool>()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
            }
            _ => {
                // Unknown environment variable, ignore
            }
        }

        Ok(())
    }

    /// Get list of all supported environment variables with descriptions
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        SUPPORTED_ENV_VARS.to_vec()
    }

    /// Display environment variable help
    pub fn display_env_help() -> String {
        let mut help = String::new();
        help.push_str("Supported Environment Variables:\n\n");

        for (var, description, example) in SUPPORTED_ENV_VARS {
            help.push_str(&format!("  {:<22} {}\n", var, description));
            help.push_str(&format!("  {:<22} Example: {}\n\n", "", example));
        }

        help.push_str("Configuration Priority (highest to lowest):\n");
        help.push_str("  1. Command-line arguments\n");
        help.push_str("  2. Environment variables\n");
        help.push_str("  3. .env file values\n");
        help.push_str("  4. Default values\n");

        help
    }

    /// Validate all currently set environment variables
    pub fn validate_current_env() -> Vec<String> {
        SUPPORTED_ENV_VARS
            .iter()
            .filter_map(|(name, _, _)| {
                let value = std::env::var(name).ok()?;
                Self::validate_env_var(name, value.trim()).err()
            })
            .map(|e| format!("Warning: {}", e))
            .collect()
    }

    /// Check if a .env file exists at `path` and validate its contents
    pub fn check_env_file(path: &Path) -> Result<Option<Vec<String>>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("Failed to read .env file: {}", e)))?;

        let mut warnings = Vec::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                if let Err(e) = Self::validate_env_var(key.trim(), value.trim()) {
                    warnings.push(format!("Line '{}': {}", line, e));
                }
            }
        }

        Ok(Some(warnings))
    }
}

fn check_range<T>(key: &str, value: &str, min: T, max: T) -> Result<()>
where
    T: std::str::FromStr + PartialOrd + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    let parsed: T = value
        .parse()
        .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
    if parsed < min || parsed > max {
        return Err(AppError::config(format!("{} must be between {} and {}, got: {}", key, min, max, parsed)));
    }
    Ok(())
}
