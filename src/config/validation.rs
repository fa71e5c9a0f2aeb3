//! Configuration validation utilities and rules
//!
//! `Config::validate` rejects settings that cannot run. The validator here
//! layers advisories on top: settings that run but are likely to skew the
//! measurement.

use crate::{
    client::HttpUtils,
    defaults,
    error::Result,
    models::Config,
};

/// Configuration validator with advisory rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate configuration, returning advisories for settings that will run
    pub fn validate_comprehensive(config: &Config) -> Result<Vec<ValidationWarning>> {
        config.validate()?;

        let mut warnings = Self::validate_server_url(&config.server_url);
        warnings.extend(Self::validate_phase_settings(config));
        warnings.extend(Self::validate_timeouts(config));

        Ok(warnings)
    }

    fn validate_server_url(server_url: &str) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        let Ok(parsed) = url::Url::parse(server_url) else {
            return warnings;
        };

        if !HttpUtils::is_https(server_url) {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!("Server '{}' uses plain HTTP; results will be shared unencrypted", server_url),
            ));
        }

        let private = matches!(parsed.host(), Some(url::Host::Ipv4(ip)) if ip.is_private());
        if HttpUtils::is_loopback(server_url) || private {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!("Server '{}' is on a local network; results will not reflect internet speed", server_url),
            ));
        }

        if parsed.query().is_some() {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!("Server '{}' includes a query string, which is ignored when building endpoints", server_url),
            ));
        }

        warnings
    }

    fn validate_phase_settings(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        for (phase, secs) in [
            ("Download", config.download_duration_seconds),
            ("Upload", config.upload_duration_seconds),
        ] {
            if secs < 5 {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!("{} phase of {}s may end before TCP ramps up (recommended: >= 5s)", phase, secs),
                ));
            }
        }

        for (phase, streams) in [("download", config.download_streams), ("upload", config.upload_streams)] {
            if streams > 8 {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Info,
                    format!("{} concurrent {} streams may overload slower backends", streams, phase),
                ));
            }
        }

        if (config.overhead_factor - defaults::DEFAULT_OVERHEAD_FACTOR).abs() > f64::EPSILON {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!(
                    "Overhead factor {} differs from the usual {}; rates will not match other clients",
                    config.overhead_factor,
                    defaults::DEFAULT_OVERHEAD_FACTOR
                ),
            ));
        }

        if config.ping_count < 3 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!("Ping count of {} gives an unreliable jitter figure (recommended: >= 3)", config.ping_count),
            ));
        }

        warnings
    }

    fn validate_timeouts(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if config.timeout_seconds < 3 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!("Timeout of {}s may be too short for the ISP lookup and result upload", config.timeout_seconds),
            ));
        } else if config.timeout_seconds > 60 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!("Long timeout of {}s will slow down failure detection", config.timeout_seconds),
            ));
        }

        warnings
    }
}

/// Validation warning levels
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationLevel {
    Info,
    Warning,
    Error,
}

impl ValidationLevel {
    /// Get display string for level
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

/// Configuration validation warning
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(level: ValidationLevel, message: String) -> Self {
        Self { level, message }
    }

    /// Format warning for display
    pub fn format(&self) -> String {
        format!("[{}] {}", self.level.as_str(), self.message)
    }
}

/// Convenience function for comprehensive configuration validation
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn public_config() -> Config {
        Config {
            server_url: "https://speed.example.com".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_clean_config_has_no_warnings() {
        assert!(validate_config(&public_config()).unwrap().is_empty());
    }

    #[test]
    fn test_default_server_is_flagged_local() {
        let warnings = validate_config(&Config::default()).unwrap();

        assert!(warnings.iter().any(|w| w.level == ValidationLevel::Warning && w.message.contains("local network")));
        assert!(warnings.iter().any(|w| w.message.contains("plain HTTP")));
    }

    #[test]
    fn test_private_address_is_local() {
        let config = Config {
            server_url: "https://192.168.1.10:8080".to_string(),
            ..Config::default()
        };
        let warnings = validate_config(&config).unwrap();
        assert!(warnings.iter().any(|w| w.message.contains("local network")));
        assert!(!warnings.iter().any(|w| w.message.contains("plain HTTP")));
    }

    #[test]
    fn test_loopback_hosts_are_local() {
        for server_url in ["https://[::1]:8443", "https://LOCALHOST", "https://127.0.0.2"] {
            let config = Config {
                server_url: server_url.to_string(),
                ..Config::default()
            };
            let warnings = validate_config(&config).unwrap();
            assert!(
                warnings.iter().any(|w| w.message.contains("local network")),
                "{} not flagged",
                server_url
            );
        }

        let public = Config {
            server_url: "https://10.example.com".to_string(),
            ..Config::default()
        };
        assert!(!validate_config(&public).unwrap().iter().any(|w| w.message.contains("local network")));
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let config = Config {
            ping_count: 0,
            ..public_config()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_short_phases_and_many_streams() {
        let config = Config {
            upload_duration_seconds: 2,
            download_streams: 12,
            ..public_config()
        };
        let warnings = validate_config(&config).unwrap();

        assert!(warnings.iter().any(|w| w.message.starts_with("Upload phase of 2s")));
        assert!(warnings.iter().any(|w| w.message.contains("12 concurrent download streams")));
        assert!(!warnings.iter().any(|w| w.message.starts_with("Download phase")));
    }

    #[test]
    fn test_overhead_and_timeout_advisories() {
        let config = Config {
            overhead_factor: 1.0,
            timeout_seconds: 90,
            ..public_config()
        };
        let warnings = validate_config(&config).unwrap();

        assert!(warnings.iter().any(|w| w.message.contains("Overhead factor 1")));
        assert!(warnings.iter().any(|w| w.message.contains("Long timeout of 90s")));
    }

    #[test]
    fn test_warning_format() {
        let warning = ValidationWarning::new(ValidationLevel::Warning, "slow".to_string());
        assert_eq!(warning.format(), "[WARNING] slow");
    }
}
