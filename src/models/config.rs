//! Configuration data model and validation

use crate::defaults;
use crate::types::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Remote server directory; `None` disables the remote source
    #[serde(default = "default_directory_url")]
    pub directory_url: Option<String>,

    /// Static JSON server list read before the remote directory
    #[serde(default)]
    pub servers_file: Option<PathBuf>,

    /// Restrict the run to a single server id
    #[serde(default)]
    pub server_id: Option<u32>,

    /// Concurrent streams per direction; `None` lets the engine decide
    #[serde(default)]
    pub stream_count: Option<usize>,

    /// Upper bound on each direction's run time
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_seconds: u64,

    /// Sampling timer period
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    /// Minimum warmup excluded from the speed figure
    #[serde(default = "default_warmup_secs")]
    pub warmup_seconds: f64,

    /// Minimum leading fraction of samples excluded from the speed figure
    #[serde(default = "default_warmup_fraction")]
    pub warmup_fraction: f64,

    /// Delay between consecutive stream starts
    #[serde(default = "default_ramp_up_stagger_ms")]
    pub ramp_up_stagger_ms: u64,

    /// Stop a direction once this many megabytes moved
    #[serde(default)]
    pub byte_ceiling_mb: Option<u64>,

    /// Round trips per latency probe
    #[serde(default = "default_probe_attempts")]
    pub probe_attempts: u32,

    /// Nearest servers to probe before selecting
    #[serde(default = "default_candidate_count")]
    pub candidate_count: usize,

    /// Per-request timeout for directory and probe requests
    #[serde(default = "default_timeout_secs")]
    pub timeout_seconds: u64,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Print the report as JSON
    #[serde(default)]
    pub json: bool,

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
            directory_url: default_directory_url(),
            servers_file: None,
            server_id: None,
            stream_count: None,
            max_duration_seconds: default_max_duration_secs(),
            sample_interval_ms: default_sample_interval_ms(),
            warmup_seconds: default_warmup_secs(),
            warmup_fraction: default_warmup_fraction(),
            ramp_up_stagger_ms: default_ramp_up_stagger_ms(),
            byte_ceiling_mb: None,
            probe_attempts: default_probe_attempts(),
            candidate_count: default_candidate_count(),
            timeout_seconds: default_timeout_secs(),
            enable_color: default_enable_color(),
            json: false,
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

    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_seconds)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_secs_f64(self.warmup_seconds)
    }

    pub fn ramp_up_stagger(&self) -> Duration {
        Duration::from_millis(self.ramp_up_stagger_ms)
    }

    /// Byte ceiling in bytes
    pub fn byte_ceiling(&self) -> Option<u64> {
        self.byte_ceiling_mb.map(|mb| mb.saturating_mul(1024 * 1024))
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Result<()> {
        if self.directory_url.is_none() && self.servers_file.is_none() {
            return Err(AppError::config(
                "No server source configured: set a directory URL or a servers file",
            ));
        }

        if let Some(ref directory_url) = self.directory_url {
            match url::Url::parse(directory_url) {
                Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {}
                Ok(_) => {
                    return Err(AppError::config(format!(
                        "Directory URL must use http or https: {}",
                        directory_url
                    )))
                }
                Err(e) => {
                    return Err(AppError::config(format!(
                        "Invalid directory URL '{}': {}",
                        directory_url, e
                    )))
                }
            }
        }

        if let Some(streams) = self.stream_count {
            if streams == 0 {
                return Err(AppError::config("Stream count must be greater than 0"));
            }
            if streams > defaults::MAX_STREAMS {
                return Err(AppError::config(format!(
                    "Stream count cannot exceed {}",
                    defaults::MAX_STREAMS
                )));
            }
        }

        if self.max_duration_seconds == 0 {
            return Err(AppError::config("Duration must be greater than 0"));
        }

        if self.max_duration_seconds > 300 {
            return Err(AppError::config("Duration cannot exceed 300 seconds"));
        }

        if self.sample_interval_ms < 10 {
            return Err(AppError::config("Sample interval must be at least 10ms"));
        }

        if self.sample_interval_ms >= self.max_duration_seconds.saturating_mul(1000) {
            return Err(AppError::config("Sample interval must be shorter than the duration"));
        }

        if !self.warmup_seconds.is_finite() || self.warmup_seconds < 0.0 {
            return Err(AppError::config("Warmup must be a non-negative number of seconds"));
        }

        if !(0.0..1.0).contains(&self.warmup_fraction) {
            return Err(AppError::config("Warmup fraction must be in [0, 1)"));
        }

        if self.byte_ceiling_mb == Some(0) {
            return Err(AppError::config("Byte ceiling must be greater than 0"));
        }

        if self.probe_attempts == 0 {
            return Err(AppError::config("Probe attempts must be greater than 0"));
        }

        if self.probe_attempts > 20 {
            return Err(AppError::config("Probe attempts cannot exceed 20"));
        }

        if self.candidate_count == 0 {
            return Err(AppError::config("Candidate count must be greater than 0"));
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
        if let Ok(directory_url) = std::env::var("DIRECTORY_URL") {
            let trimmed = directory_url.trim();
            // An empty value disables the remote directory
            self.directory_url = if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            };
        }

        if let Ok(servers_file) = std::env::var("SERVERS_FILE") {
            if !servers_file.trim().is_empty() {
                self.servers_file = Some(PathBuf::from(servers_file.trim()));
            }
        }

        if let Some(server_id) = parse_env::<u32>("SERVER_ID")? {
            self.server_id = Some(server_id);
        }

        if let Some(streams) = parse_env::<usize>("STREAM_COUNT")? {
            self.stream_count = Some(streams);
        }

        if let Some(duration) = parse_env("MAX_DURATION_SECONDS")? {
            self.max_duration_seconds = duration;
        }

        if let Some(interval) = parse_env("SAMPLE_INTERVAL_MS")? {
            self.sample_interval_ms = interval;
        }

        if let Some(warmup) = parse_env("WARMUP_SECONDS")? {
            self.warmup_seconds = warmup;
        }

        if let Some(fraction) = parse_env("WARMUP_FRACTION")? {
            self.warmup_fraction = fraction;
        }

        if let Some(stagger) = parse_env("RAMP_UP_STAGGER_MS")? {
            self.ramp_up_stagger_ms = stagger;
        }

        if let Some(ceiling) = parse_env::<u64>("BYTE_CEILING_MB")? {
            self.byte_ceiling_mb = Some(ceiling);
        }

        if let Some(attempts) = parse_env("PROBE_ATTEMPTS")? {
            self.probe_attempts = attempts;
        }

        if let Some(candidates) = parse_env("CANDIDATE_COUNT")? {
            self.candidate_count = candidates;
        }

        if let Some(timeout) = parse_env("TIMEOUT_SECONDS")? {
            self.timeout_seconds = timeout;
        }

        if let Some(enable_color) = parse_env("ENABLE_COLOR")? {
            self.enable_color = enable_color;
        }

        Ok(())
    }
}

/// Read and parse an environment variable; unset or blank yields `None`
fn parse_env<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", name, raw, e))),
        _ => Ok(None),
    }
}

// Default value functions for serde
fn default_directory_url() -> Option<String> {
    Some(defaults::DEFAULT_DIRECTORY_URL.to_string())
}

fn default_max_duration_secs() -> u64 {
    defaults::DEFAULT_MAX_DURATION.as_secs()
}

fn default_sample_interval_ms() -> u64 {
    defaults::DEFAULT_SAMPLE_INTERVAL.as_millis() as u64
}

fn default_warmup_secs() -> f64 {
    defaults::DEFAULT_WARMUP.as_secs_f64()
}

fn default_warmup_fraction() -> f64 {
    defaults::DEFAULT_WARMUP_FRACTION
}

fn default_ramp_up_stagger_ms() -> u64 {
    defaults::DEFAULT_RAMP_UP_STAGGER.as_millis() as u64
}

fn default_probe_attempts() -> u32 {
    defaults::DEFAULT_PROBE_ATTEMPTS
}

fn default_candidate_count() -> usize {
    defaults::DEFAULT_CANDIDATE_COUNT
}

fn default_timeout_secs() -> u64 {
    defaults::DEFAULT_TIMEOUT.as_secs()
}

fn default_enable_color() -> bool {
    defaults::DEFAULT_ENABLE_COLOR
}
