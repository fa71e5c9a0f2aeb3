//! Additional comprehensive tests for configuration parsing and validation

use super::{parser::ENV_LOCK, ConfigParser, EnvManager};
use crate::{cli::Cli, config::env::SUPPORTED_ENV_VARS, models::Config};
use clap::Parser;
use std::env;

fn clear_env() {
    for (name, _, _) in SUPPORTED_ENV_VARS {
        env::remove_var(name);
    }
}

/// Test edge cases in configuration bounds
mod config_edge_cases {
    use super::*;

    #[test]
    fn test_config_at_upper_bounds() {
        let config = Config {
            download_duration_seconds: 120,
            upload_duration_seconds: 120,
            download_streams: 32,
            upload_streams: 32,
            upload_payload_bytes: 64 * 1024 * 1024,
            ping_count: 100,
            overhead_factor: 2.0,
            timeout_seconds: 300,
            ..Config::default()
        };
        assert!(config.validate().is_ok());

        assert!(Config { ping_count: 101, ..config.clone() }.validate().is_err());
        assert!(Config { upload_streams: 33, ..config.clone() }.validate().is_err());
        assert!(Config { timeout_seconds: 301, ..config }.validate().is_err());
    }

    #[test]
    fn test_server_url_with_path_prefix() {
        let config = Config {
            server_url: "https://example.com/speedtest/".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unicode_server_host() {
        let config = Config {
            server_url: "https://xn--nxasmq6b.cn".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }
}

/// Test environment variable parsing edge cases
mod env_parsing_tests {
    use super::*;

    #[test]
    fn test_env_values_are_trimmed() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("SPEEDTEST_SERVER", "  https://speed.example.com  ");
        env::set_var("UPLOAD_DURATION", " 7 ");

        let mut config = Config::default();
        config.merge_from_env().unwrap();
        clear_env();

        assert_eq!(config.server_url, "https://speed.example.com");
        assert_eq!(config.upload_duration_seconds, 7);
    }

    #[test]
    fn test_blank_server_keeps_default() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("SPEEDTEST_SERVER", "   ");

        let mut config = Config::default();
        config.merge_from_env().unwrap();
        clear_env();

        assert_eq!(config.server_url, crate::defaults::DEFAULT_SERVER_URL);
    }

    #[test]
    fn test_boolean_env_values() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("SHARE_RESULTS", "false");
        env::set_var("ENABLE_COLOR", "false");

        let mut config = Config::default();
        config.merge_from_env().unwrap();
        clear_env();

        assert!(!config.share_results);
        assert!(!config.enable_color);
    }

    #[test]
    fn test_out_of_range_env_fails_final_validation() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("DOWNLOAD_DURATION", "500");

        let result = ConfigParser::new(Cli::parse_from(["nst"])).parse();
        clear_env();

        assert!(result.is_err());
    }

    #[test]
    fn test_cli_rescues_invalid_env_range() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("DOWNLOAD_DURATION", "500");

        let result = ConfigParser::new(Cli::parse_from(["nst", "--download-duration", "10"])).parse();
        clear_env();

        assert_eq!(result.unwrap().download_duration_seconds, 10);
    }
}

/// Layering of .env, process environment and CLI
mod layering_tests {
    use super::*;

    #[test]
    fn test_dotenv_file_fills_unset_variables() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "PING_COUNT=9\nUPLOAD_STREAMS=3\n").unwrap();
        env::set_var("UPLOAD_STREAMS", "5");

        let original = env::current_dir().unwrap();
        env::set_current_dir(dir.path()).unwrap();
        let result = ConfigParser::new(Cli::parse_from(["nst"])).parse();
        env::set_current_dir(original).unwrap();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.ping_count, 9);
        // Process environment wins over .env
        assert_eq!(config.upload_streams, 5);
    }

    #[test]
    fn test_color_flags() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("ENABLE_COLOR", "false");

        let forced = ConfigParser::new(Cli::parse_from(["nst", "--color"])).parse().unwrap();
        let unforced = ConfigParser::new(Cli::parse_from(["nst"])).parse().unwrap();
        clear_env();

        assert!(forced.enable_color);
        assert!(!unforced.enable_color);
    }

    #[test]
    fn test_example_env_content_is_all_comments() {
        let content = EnvManager::create_example_env_content();
        assert!(content
            .lines()
            .all(|line| line.trim().is_empty() || line.trim_start().starts_with('#')));
    }
}
