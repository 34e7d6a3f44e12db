//! Configuration parsing from CLI arguments and environment variables

use crate::{
    cli::Cli,
    config::env::EnvManager,
    error::Result,
    models::Config,
};
use std::path::PathBuf;

/// Configuration parser that combines CLI arguments with environment variables
pub struct ConfigParser {
    cli: Cli,
    env_file: PathBuf,
}

impl ConfigParser {
    /// Create a new configuration parser with CLI arguments
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            env_file: PathBuf::from(".env"),
        }
    }

    /// Read environment defaults from another file instead of `./.env`
    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = path.into();
        self
    }

    /// Parse and build the complete configuration
    ///
    /// Precedence, lowest first: defaults, env file, process environment,
    /// command line.
    pub fn parse(&self) -> Result<Config> {
        let mut config = Config::default();

        // Values already in the process environment are not overwritten
        EnvManager::load_env_file_from(&self.env_file, self.cli.debug)?;

        config.merge_from_env()?;
        self.apply_cli_overrides(&mut config);
        config.validate()?;

        Ok(config)
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(&self, config: &mut Config) {
        let cli = &self.cli;

        if let Some(server_id) = cli.server_id {
            config.server_id = Some(server_id);
        }
        if let Some(streams) = cli.streams {
            config.stream_count = Some(streams);
        }
        if let Some(duration) = cli.duration {
            config.max_duration_seconds = duration;
        }
        if let Some(interval) = cli.sample_interval {
            config.sample_interval_ms = interval;
        }
        if let Some(ref url) = cli.directory_url {
            config.directory_url = Some(url.clone());
        }
        if let Some(ref path) = cli.servers_file {
            config.servers_file = Some(path.clone());
        }
        if let Some(timeout) = cli.timeout {
            config.timeout_seconds = timeout;
        }

        if cli.color {
            config.enable_color = true;
        }
        if cli.no_color || cli.json {
            config.enable_color = false;
        }

        // CLI-only switches
        config.json = cli.json;
        config.verbose = cli.verbose;
        config.debug = cli.debug;

        if config.debug {
            eprintln!("Applied CLI overrides to configuration");
            eprintln!(
                "Final config: streams={:?}, duration={}s, timeout={}s, enable_color={}",
                config.stream_count, config.max_duration_seconds, config.timeout_seconds, config.enable_color
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
    let mut summary = Vec::new();

    summary.push(format!(
        "Directory: {}",
        config.directory_url.as_deref().unwrap_or("(disabled)")
    ));
    if let Some(ref path) = config.servers_file {
        summary.push(format!("Servers file: {}", path.display()));
    }
    if let Some(id) = config.server_id {
        summary.push(format!("Server id: {}", id));
    }
    summary.push(format!(
        "Streams: {}",
        config
            .stream_count
            .map(|s| s.to_string())
            .unwrap_or_else(|| "auto".to_string())
    ));
    summary.push(format!("Max duration: {}s", config.max_duration_seconds));
    summary.push(format!("Sample interval: {}ms", config.sample_interval_ms));
    summary.push(format!(
        "Warmup: {}s / {:.0}%",
        config.warmup_seconds,
        config.warmup_fraction * 100.0
    ));
    if let Some(ceiling) = config.byte_ceiling_mb {
        summary.push(format!("Byte ceiling: {} MB", ceiling));
    }
    summary.push(format!(
        "Probe: {} attempts x {} candidates",
        config.probe_attempts, config.candidate_count
    ));
    summary.push(format!("Timeout: {}s", config.timeout_seconds));
    summary.push(format!("Color Output: {}", config.enable_color));
    summary.push(format!("Verbose: {}", config.verbose));
    summary.push(format!("Debug: {}", config.debug));

    summary.join("\n")
}
