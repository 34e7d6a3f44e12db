//! Configuration validation utilities and rules

use crate::{
    error::Result,
    models::Config,
};
use colored::Colorize;

/// Configuration validator for settings that are legal but questionable
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate configuration and collect non-fatal warnings
    pub fn validate_comprehensive(config: &Config) -> Result<Vec<ValidationWarning>> {
        config.validate()?;

        let mut warnings = Vec::new();
        warnings.extend(Self::validate_sources(config));
        warnings.extend(Self::validate_measurement_settings(config));
        warnings.extend(Self::validate_network_settings(config));

        Ok(warnings)
    }

    fn validate_sources(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if let Some(ref directory_url) = config.directory_url {
            if let Ok(parsed) = url::Url::parse(directory_url) {
                if parsed.scheme() == "http" {
                    warnings.push(ValidationWarning::new(
                        ValidationLevel::Info,
                        format!("Directory URL '{}' uses plain HTTP", directory_url),
                    ));
                }

                if let Some(url::Host::Ipv4(ip)) = parsed.host() {
                    if ip.is_private() || ip.is_loopback() {
                        warnings.push(ValidationWarning::new(
                            ValidationLevel::Info,
                            format!("Directory URL '{}' targets a private/local network", directory_url),
                        ));
                    }
                }
            }
        }

        if let Some(ref path) = config.servers_file {
            if !path.exists() {
                let level = if config.directory_url.is_some() {
                    ValidationLevel::Warning
                } else {
                    ValidationLevel::Error
                };
                warnings.push(ValidationWarning::new(
                    level,
                    format!("Servers file '{}' does not exist", path.display()),
                ));
            }
        }

        warnings
    }

    fn validate_measurement_settings(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        let duration = config.max_duration_seconds as f64;

        if config.max_duration_seconds < 5 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Duration of {}s may end before throughput reaches a steady state (recommended: >= 5s)",
                    config.max_duration_seconds
                ),
            ));
        }

        if config.warmup_seconds >= duration {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Warmup of {}s is not shorter than the {}s duration; the whole run counts as steady state",
                    config.warmup_seconds, config.max_duration_seconds
                ),
            ));
        }

        let expected_samples = config.max_duration_seconds.saturating_mul(1000) / config.sample_interval_ms.max(1);
        if expected_samples < 5 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Sample interval of {}ms yields only {} samples per direction",
                    config.sample_interval_ms, expected_samples
                ),
            ));
        }

        if let Some(streams) = config.stream_count {
            if streams > 16 {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Info,
                    format!("{} streams per direction may saturate the local machine before the link", streams),
                ));
            }
        }

        if let Some(ceiling) = config.byte_ceiling_mb {
            if ceiling < 10 {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Info,
                    format!("Byte ceiling of {} MB will stop fast links within the warmup", ceiling),
                ));
            }
        }

        warnings
    }

    fn validate_network_settings(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if config.timeout_seconds < 3 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!("Timeout of {}s may be too short for distant servers", config.timeout_seconds),
            ));
        } else if config.timeout_seconds > 60 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!("Long timeout of {}s will slow down failure detection", config.timeout_seconds),
            ));
        }

        if config.candidate_count > 20 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!("Probing {} candidates will delay the start of the test", config.candidate_count),
            ));
        }

        if config.probe_attempts == 1 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                "A single probe attempt gives no jitter estimate".to_string(),
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

    /// Get color for terminal display
    pub fn color(&self) -> &'static str {
        match self {
            Self::Info => "blue",
            Self::Warning => "yellow",
            Self::Error => "red",
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
    /// Create a new validation warning
    pub fn new(level: ValidationLevel, message: String) -> Self {
        Self { level, message }
    }

    /// Format warning for display
    pub fn format(&self, use_color: bool) -> String {
        let tag = format!("[{}]", self.level.as_str());
        if use_color {
            format!("{} {}", tag.color(self.level.color()).bold(), self.message)
        } else {
            format!("{} {}", tag, self.message)
        }
    }
}

/// Convenience function for comprehensive configuration validation
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn messages(config: &Config) -> Vec<String> {
        ConfigValidator::validate_comprehensive(config)
            .unwrap()
            .into_iter()
            .map(|w| w.message)
            .collect()
    }

    #[test]
    fn test_validation_warning_format() {
        let warning = ValidationWarning::new(ValidationLevel::Warning, "Test warning message".to_string());

        assert_eq!(warning.format(false), "[WARNING] Test warning message");
        assert!(warning.format(true).contains("Test warning message"));
    }

    #[test]
    fn test_validation_levels() {
        assert_eq!(ValidationLevel::Info.as_str(), "INFO");
        assert_eq!(ValidationLevel::Warning.as_str(), "WARNING");
        assert_eq!(ValidationLevel::Error.as_str(), "ERROR");
        assert_eq!(ValidationLevel::Warning.color(), "yellow");
    }

    #[test]
    fn test_default_config_has_no_warnings() {
        assert!(messages(&Config::default()).is_empty());
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let config = Config {
            max_duration_seconds: 0,
            ..Config::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_short_duration_and_long_warmup() {
        let config = Config {
            max_duration_seconds: 2,
            warmup_seconds: 3.0,
            ..Config::default()
        };
        let messages = messages(&config);

        assert!(messages.iter().any(|m| m.contains("steady state (recommended")));
        assert!(messages.iter().any(|m| m.contains("Warmup of 3s")));
    }

    #[test]
    fn test_few_samples() {
        let config = Config {
            max_duration_seconds: 2,
            sample_interval_ms: 1000,
            ..Config::default()
        };
        assert!(messages(&config).iter().any(|m| m.contains("only 2 samples")));
    }

    #[test]
    fn test_timeout_boundaries() {
        let short = Config { timeout_seconds: 2, ..Config::default() };
        assert!(messages(&short).iter().any(|m| m.contains("too short")));

        let normal = Config { timeout_seconds: 3, ..Config::default() };
        assert!(!messages(&normal).iter().any(|m| m.contains("too short")));

        let long = Config { timeout_seconds: 61, ..Config::default() };
        assert!(messages(&long).iter().any(|m| m.contains("slow down failure")));
    }

    #[test]
    fn test_source_warnings() {
        let config = Config {
            directory_url: Some("http://127.0.0.1:8080/servers".to_string()),
            servers_file: Some(PathBuf::from("/nonexistent/servers.json")),
            ..Config::default()
        };
        let warnings = ConfigValidator::validate_comprehensive(&config).unwrap();

        assert!(warnings.iter().any(|w| w.message.contains("plain HTTP")));
        assert!(warnings.iter().any(|w| w.message.contains("private/local")));
        assert!(warnings
            .iter()
            .any(|w| w.level == ValidationLevel::Warning && w.message.contains("does not exist")));

        let file_only = Config {
            directory_url: None,
            servers_file: Some(PathBuf::from("/nonexistent/servers.json")),
            ..Config::default()
        };
        let warnings = ConfigValidator::validate_comprehensive(&file_only).unwrap();
        assert!(warnings.iter().any(|w| w.level == ValidationLevel::Error));
    }

    #[test]
    fn test_stream_and_ceiling_hints() {
        let config = Config {
            stream_count: Some(24),
            byte_ceiling_mb: Some(5),
            probe_attempts: 1,
            ..Config::default()
        };
        let messages = messages(&config);

        assert!(messages.iter().any(|m| m.contains("24 streams")));
        assert!(messages.iter().any(|m| m.contains("Byte ceiling of 5 MB")));
        assert!(messages.iter().any(|m| m.contains("no jitter estimate")));
    }
}
