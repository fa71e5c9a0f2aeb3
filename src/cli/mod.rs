//! Command-line interface

use clap::Parser;

/// Network Speed Tester - latency, jitter, download and upload bandwidth
/// against a speedtest backend
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "nst")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Base URL of the speedtest backend
    #[arg(short, long, value_name = "URL")]
    pub server: Option<String>,

    /// Length of the download phase in seconds
    #[arg(long, value_name = "SECS", value_parser = parse_phase_seconds)]
    pub download_duration: Option<u64>,

    /// Length of the upload phase in seconds
    #[arg(long, value_name = "SECS", value_parser = parse_phase_seconds)]
    pub upload_duration: Option<u64>,

    /// Concurrent download streams
    #[arg(long, value_name = "N")]
    pub download_streams: Option<usize>,

    /// Concurrent upload streams
    #[arg(long, value_name = "N")]
    pub upload_streams: Option<usize>,

    /// Size of each upload request body in bytes
    #[arg(long, value_name = "BYTES")]
    pub payload_bytes: Option<usize>,

    /// Number of timed latency probes
    #[arg(short = 'c', long, value_name = "N")]
    pub ping_count: Option<usize>,

    /// Request timeout in seconds
    #[arg(short, long, value_name = "SECS", value_parser = parse_duration)]
    pub timeout: Option<u64>,

    /// Force colored output
    #[arg(long)]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Do not submit results for a share link
    #[arg(long)]
    pub no_share: bool,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// Write an example .env file to the current directory and exit
    #[arg(long)]
    pub init_env: bool,
}

impl Cli {
    /// Validate CLI arguments for conflicts and requirements
    pub fn validate(&self) -> Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }

        if self.json && self.color {
            return Err("Cannot specify both --json and --color".to_string());
        }

        if let Some(server) = &self.server {
            let parsed = url::Url::parse(server).map_err(|e| format!("Invalid server URL '{}': {}", server, e))?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(format!("Server URL must use http or https: {}", server));
            }
        }

        Ok(())
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.json {
            false
        } else if self.color {
            true
        } else if self.no_color {
            false
        } else {
            supports_color()
        }
    }

    /// Get configuration summary for display
    pub fn get_config_summary(&self) -> String {
        let mut summary = String::new();

        summary.push_str("Command-line overrides:\n");
        if let Some(server) = &self.server {
            summary.push_str(&format!("  Server: {}\n", server));
        }
        if let Some(secs) = self.download_duration {
            summary.push_str(&format!("  Download duration: {}s\n", secs));
        }
        if let Some(secs) = self.upload_duration {
            summary.push_str(&format!("  Upload duration: {}s\n", secs));
        }
        if let Some(timeout) = self.timeout {
            summary.push_str(&format!("  Timeout: {}s\n", timeout));
        }
        summary.push_str(&format!("  Colored output: {}\n", self.use_colors()));
        summary.push_str(&format!("  Share results: {}\n", !self.no_share));
        summary.push_str(&format!("  JSON output: {}\n", self.json));

        summary
    }
}

/// Parse duration from seconds string
fn parse_duration(s: &str) -> Result<u64, String> {
    if s.starts_with('+') || s.starts_with("0x") || s.starts_with("0X") {
        return Err(format!("Invalid duration: {}", s));
    }

    s.parse::<u64>()
        .map_err(|_| format!("Invalid duration: {}", s))
        .and_then(|secs| {
            if secs == 0 {
                Err("Duration must be greater than 0".to_string())
            } else if secs > 300 {
                Err("Duration cannot exceed 300 seconds".to_string())
            } else {
                Ok(secs)
            }
        })
}

/// Phase lengths share the timeout's syntax with a tighter ceiling
fn parse_phase_seconds(s: &str) -> Result<u64, String> {
    let secs = parse_duration(s)?;
    if secs > 120 {
        return Err("Phase duration cannot exceed 120 seconds".to_string());
    }
    Ok(secs)
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    #[cfg(target_os = "windows")]
    {
        if std::env::var("ANSICON").is_ok() || std::env::var("ConEmuANSI").is_ok() {
            return true;
        }
    }

    #[cfg(unix)]
    {
        true
    }
    #[cfg(not(unix))]
    {
        false
    }
}
