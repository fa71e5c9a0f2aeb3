//! Configuration parsing from CLI arguments and environment variables

use crate::{
    cli::Cli,
    config::env::EnvManager,
    error::Result,
    models::Config,
};

/// Configuration parser that combines CLI arguments with environment variables
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    /// Create a new configuration parser with CLI arguments
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Parse and build the complete configuration
    pub fn parse(&self) -> Result<Config> {
        let mut config = Config::default();

        // .env values only fill variables not already set in the environment
        self.load_env_file()?;
        config.merge_from_env()?;

        self.apply_cli_overrides(&mut config);
        config.validate()?;

        Ok(config)
    }

    fn load_env_file(&self) -> Result<()> {
        EnvManager::load_env_file(self.cli.debug)
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(&self, config: &mut Config) {
        let cli = &self.cli;

        if let Some(server) = &cli.server {
            config.server_url = server.clone();
        }
        if let Some(secs) = cli.download_duration {
            config.download_duration_seconds = secs;
        }
        if let Some(secs) = cli.upload_duration {
            config.upload_duration_seconds = secs;
        }
        if let Some(streams) = cli.download_streams {
            config.download_streams = streams;
        }
        if let Some(streams) = cli.upload_streams {
            config.upload_streams = streams;
        }
        if let Some(bytes) = cli.payload_bytes {
            config.upload_payload_bytes = bytes;
        }
        if let Some(count) = cli.ping_count {
            config.ping_count = count;
        }
        if let Some(timeout) = cli.timeout {
            config.timeout_seconds = timeout;
        }

        if cli.no_color || cli.json {
            config.enable_color = false;
        } else if cli.color {
            config.enable_color = true;
        }

        if cli.no_share {
            config.share_results = false;
        }

        // CLI-only switches
        config.json_output = cli.json;
        config.verbose = cli.verbose;
        config.debug = cli.debug;

        if config.debug {
            eprintln!("Applied CLI overrides to configuration");
            eprintln!(
                "Final config: server={}, download={}s, upload={}s, timeout={}s, share={}",
                config.server_url,
                config.download_duration_seconds,
                config.upload_duration_seconds,
                config.timeout_seconds,
                config.share_results
            );
        }
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(config: &Config) -> String {
    let summary = [
        format!("Server: {}", config.server_url),
        format!(
            "Download: {}s, {} streams, {} MB chunks",
            config.download_duration_seconds, config.download_streams, config.download_chunk_mb
        ),
        format!(
            "Upload: {}s, {} streams, {} byte payload",
            config.upload_duration_seconds, config.upload_streams, config.upload_payload_bytes
        ),
        format!("Ping Count: {}", config.ping_count),
        format!("Overhead Factor: {}", config.overhead_factor),
        format!("Timeout: {}s", config.timeout_seconds),
        format!("Share Results: {}", config.share_results),
        format!("Color Output: {}", config.enable_color),
        format!("Verbose: {}", config.verbose),
        format!("Debug: {}", config.debug),
    ];

    summary.join("\n")
}

/// Serializes tests that touch process environment or the working directory
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::env::SUPPORTED_ENV_VARS;
    use clap::Parser;
    use std::env;

    fn clear_env() {
        for (name, _, _) in SUPPORTED_ENV_VARS {
            env::remove_var(name);
        }
    }

    #[test]
    fn test_config_parser_defaults() {
        let config = Config::default();

        assert_eq!(config.server_url, crate::defaults::DEFAULT_SERVER_URL);
        assert_eq!(config.timeout_seconds, crate::defaults::DEFAULT_TIMEOUT.as_secs());
        assert_eq!(config.download_duration_seconds, 15);
        assert_eq!(config.upload_duration_seconds, 10);
        assert!(config.share_results);
        assert!(!config.json_output);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cli_overrides() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let cli = Cli::parse_from([
            "nst", "--server", "https://speed.example.com", "--upload-duration", "5",
            "--timeout", "5", "--no-color", "--no-share", "--verbose",
        ]);
        let config = ConfigParser::new(cli).parse().unwrap();

        assert_eq!(config.server_url, "https://speed.example.com");
        assert_eq!(config.upload_duration_seconds, 5);
        assert_eq!(config.timeout_seconds, 5);
        assert!(!config.enable_color);
        assert!(!config.share_results);
        assert!(config.verbose);
    }

    #[test]
    fn test_cli_overrides_env_vars() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("PING_COUNT", "8");
        env::set_var("UPLOAD_STREAMS", "2");

        let cli = Cli::parse_from(["nst", "--ping-count", "12"]);
        let config = ConfigParser::new(cli).parse().unwrap();

        // CLI wins; untouched env values still apply
        assert_eq!(config.ping_count, 12);
        assert_eq!(config.upload_streams, 2);

        clear_env();
    }

    #[test]
    fn test_invalid_env_value_is_config_error() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("DOWNLOAD_STREAMS", "many");

        let result = ConfigParser::new(Cli::parse_from(["nst"])).parse();
        assert!(matches!(result, Err(crate::error::AppError::Config(_))));

        clear_env();
    }

    #[test]
    fn test_json_forces_plain_output() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let config = ConfigParser::new(Cli::parse_from(["nst", "--json"])).parse().unwrap();
        assert!(config.json_output);
        assert!(!config.enable_color);
    }

    #[test]
    fn test_config_summary() {
        let summary = display_config_summary(&Config::default());

        assert!(summary.contains("Server: http://localhost:8080"));
        assert!(summary.contains("Download: 15s, 2 streams"));
        assert!(summary.contains("Upload: 10s, 4 streams"));
        assert!(summary.contains("Timeout:"));
    }
}
