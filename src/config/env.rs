//! Environment variable handling and .env file management

use crate::error::{AppError, Result};
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load .env file if it exists
    pub fn load_env_file(debug: bool) -> Result<()> {
        Self::load_env_file_from(Path::new(".env"), debug)
    }

    /// Load a specific env file if it exists; variables already set win
    pub fn load_env_file_from(path: &Path, debug: bool) -> Result<()> {
        if path.exists() {
            dotenv::from_path(path)
                .map_err(|e| AppError::config(format!("Failed to load {}: {}", path.display(), e)))?;

            if debug {
                eprintln!("Loaded configuration from {}", path.display());
            }
        } else if debug {
            eprintln!("No .env file found, using defaults and CLI arguments");
        }

        Ok(())
    }

    /// Create example .env file content
    pub fn create_example_env_content() -> String {
        r#"# QuickPing Configuration
#
# Values here are used as defaults and can be overridden by
# command-line arguments.

# Server directory URL (empty disables the remote directory)
# DIRECTORY_URL=https://www.speedtest.net/api/js/servers?engine=js&limit=10

# JSON server list consulted before the remote directory
# SERVERS_FILE=servers.json

# Pin a single server id
# SERVER_ID=48809

# Concurrent streams per direction (1-32)
# STREAM_COUNT=4

# Maximum seconds per direction
# MAX_DURATION_SECONDS=10

# Sampling interval in milliseconds
# SAMPLE_INTERVAL_MS=200

# Warmup excluded from the speed figure
# WARMUP_SECONDS=2
# WARMUP_FRACTION=0.1

# Delay between stream starts in milliseconds
# RAMP_UP_STAGGER_MS=100

# Stop a direction after this many megabytes
# BYTE_CEILING_MB=500

# Latency round trips per candidate and number of candidates
# PROBE_ATTEMPTS=3
# CANDIDATE_COUNT=5

# Request timeout in seconds
# TIMEOUT_SECONDS=10

# Enable colored output (true/false)
# ENABLE_COLOR=true
"#
        .to_string()
    }

    /// Save example .env file to disk
    pub fn save_example_env_file(path: &Path) -> Result<()> {
        std::fs::write(path, Self::create_example_env_content())
            .map_err(|e| AppError::config(format!("Failed to write example .env file: {}", e)))
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        match key {
            "DIRECTORY_URL" => {
                let value = value.trim();
                if !value.is_empty() {
                    let parsed = url::Url::parse(value)
                        .map_err(|e| AppError::config(format!("Invalid DIRECTORY_URL '{}': {}", value, e)))?;
                    if parsed.scheme() != "http" && parsed.scheme() != "https" {
                        return Err(AppError::config(format!("DIRECTORY_URL must use http or https: {}", value)));
                    }
                }
            }
            "SERVER_ID" => {
                value.parse::<u32>()
                    .map_err(|e| AppError::config(format!("Invalid SERVER_ID value '{}': {}", value, e)))?;
            }
            "STREAM_COUNT" => {
                let streams: usize = value.parse()
                    .map_err(|e| AppError::config(format!("Invalid STREAM_COUNT value '{}': {}", value, e)))?;
                if streams == 0 || streams > crate::defaults::MAX_STREAMS {
                    return Err(AppError::config(format!(
                        "STREAM_COUNT must be between 1 and {}, got: {}",
                        crate::defaults::MAX_STREAMS,
                        streams
                    )));
                }
            }
            "MAX_DURATION_SECONDS" | "TIMEOUT_SECONDS" => {
                let secs: u64 = value.parse()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
                if secs == 0 || secs > 300 {
                    return Err(AppError::config(format!("{} must be between 1 and 300, got: {}", key, secs)));
                }
            }
            "SAMPLE_INTERVAL_MS" | "RAMP_UP_STAGGER_MS" | "BYTE_CEILING_MB" => {
                value.parse::<u64>()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
            }
            "WARMUP_SECONDS" | "WARMUP_FRACTION" => {
                let parsed: f64 = value.parse()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
                if !parsed.is_finite() || parsed < 0.0 {
                    return Err(AppError::config(format!("{} must be a non-negative number, got: {}", key, value)));
                }
            }
            "PROBE_ATTEMPTS" => {
                let attempts: u32 = value.parse()
                    .map_err(|e| AppError::config(format!("Invalid PROBE_ATTEMPTS value '{}': {}", value, e)))?;
                if attempts == 0 || attempts > 20 {
                    return Err(AppError::config(format!("PROBE_ATTEMPTS must be between 1 and 20, got: {}", attempts)));
                }
            }
            "CANDIDATE_COUNT" => {
                let count: usize = value.parse()
                    .map_err(|e| AppError::config(format!("Invalid CANDIDATE_COUNT value '{}': {}", value, e)))?;
                if count == 0 {
                    return Err(AppError::config("CANDIDATE_COUNT must be greater than 0"));
                }
            }
            "ENABLE_COLOR" => {
                value.parse::<bool>()
                    .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", value, e)))?;
            }
            _ => {}
        }

        Ok(())
    }

    /// Get list of all supported environment variables with descriptions
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("DIRECTORY_URL", "Server directory URL, empty to disable", crate::defaults::DEFAULT_DIRECTORY_URL),
            ("SERVERS_FILE", "JSON server list read before the directory", "servers.json"),
            ("SERVER_ID", "Only test against this server id", "48809"),
            ("STREAM_COUNT", "Concurrent streams per direction (1-32)", "4"),
            ("MAX_DURATION_SECONDS", "Maximum seconds per direction (1-300)", "10"),
            ("SAMPLE_INTERVAL_MS", "Sampling interval in milliseconds", "200"),
            ("WARMUP_SECONDS", "Minimum warmup excluded from the result", "2"),
            ("WARMUP_FRACTION", "Minimum leading fraction of samples excluded", "0.1"),
            ("RAMP_UP_STAGGER_MS", "Delay between stream starts", "100"),
            ("BYTE_CEILING_MB", "Stop a direction after this many megabytes", "500"),
            ("PROBE_ATTEMPTS", "Latency round trips per server (1-20)", "3"),
            ("CANDIDATE_COUNT", "Nearest servers probed before selection", "5"),
            ("TIMEOUT_SECONDS", "Request timeout in seconds (1-300)", "10"),
            ("ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// Display environment variable help
    pub fn display_env_help() -> String {
        let mut help = String::new();
        help.push_str("Supported Environment Variables:\n\n");

        for (var, description, example) in Self::get_supported_env_vars() {
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
        Self::get_supported_env_vars()
            .into_iter()
            .filter_map(|(name, _, _)| {
                let value = std::env::var(name).ok()?;
                Self::validate_env_var(name, value.trim())
                    .err()
                    .map(|e| format!("Warning: {}", e))
            })
            .collect()
    }

    /// Check an env file and validate its contents
    pub fn check_env_file(path: &Path) -> Result<Option<Vec<String>>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("Failed to read {}: {}", path.display(), e)))?;

        let warnings = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| {
                let (key, value) = line.split_once('=')?;
                Self::validate_env_var(key.trim(), value.trim())
                    .err()
                    .map(|e| format!("Line '{}': {}", line, e))
            })
            .collect();

        Ok(Some(warnings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_example_content_lists_every_variable() {
        let content = EnvManager::create_example_env_content();
        for (name, _, _) in EnvManager::get_supported_env_vars() {
            assert!(content.contains(&format!("{}=", name)), "missing {}", name);
        }
    }

    #[test]
    fn test_save_example_file() {
        let temp_file = NamedTempFile::new().unwrap();
        EnvManager::save_example_env_file(temp_file.path()).unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.contains("QuickPing Configuration"));
    }

    #[test]
    fn test_validate_env_var() {
        assert!(EnvManager::validate_env_var("DIRECTORY_URL", "https://example.com/servers").is_ok());
        assert!(EnvManager::validate_env_var("DIRECTORY_URL", "").is_ok());
        assert!(EnvManager::validate_env_var("SERVER_ID", "48809").is_ok());
        assert!(EnvManager::validate_env_var("STREAM_COUNT", "8").is_ok());
        assert!(EnvManager::validate_env_var("MAX_DURATION_SECONDS", "15").is_ok());
        assert!(EnvManager::validate_env_var("WARMUP_FRACTION", "0.2").is_ok());
        assert!(EnvManager::validate_env_var("ENABLE_COLOR", "false").is_ok());
        assert!(EnvManager::validate_env_var("UNKNOWN_KEY", "anything").is_ok());

        assert!(EnvManager::validate_env_var("DIRECTORY_URL", "ftp://example.com").is_err());
        assert!(EnvManager::validate_env_var("SERVER_ID", "-1").is_err());
        assert!(EnvManager::validate_env_var("STREAM_COUNT", "0").is_err());
        assert!(EnvManager::validate_env_var("STREAM_COUNT", "64").is_err());
        assert!(EnvManager::validate_env_var("TIMEOUT_SECONDS", "301").is_err());
        assert!(EnvManager::validate_env_var("WARMUP_SECONDS", "-2").is_err());
        assert!(EnvManager::validate_env_var("PROBE_ATTEMPTS", "0").is_err());
        assert!(EnvManager::validate_env_var("ENABLE_COLOR", "maybe").is_err());
    }

    #[test]
    fn test_display_env_help() {
        let help = EnvManager::display_env_help();
        assert!(help.contains("Supported Environment Variables:"));
        assert!(help.contains("STREAM_COUNT"));
        assert!(help.contains("Configuration Priority"));
    }

    #[test]
    fn test_check_env_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "STREAM_COUNT=8").unwrap();
        writeln!(file, "TIMEOUT_SECONDS=0").unwrap();

        let warnings = EnvManager::check_env_file(file.path()).unwrap().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("TIMEOUT_SECONDS"));

        let missing = EnvManager::check_env_file(Path::new("/nonexistent/.env")).unwrap();
        assert!(missing.is_none());
    }
}
