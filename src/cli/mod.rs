//! Command-line interface

use clap::Parser;
use std::path::PathBuf;

const EXAMPLES: &str = "\
EXAMPLES:
    quickping                          Test against the best nearby server
    quickping --list                   Show available servers
    quickping --server-id 48809        Test against a specific server
    quickping --streams 8 --duration 15
    quickping --json > result.json";

/// QuickPing - internet throughput and latency measurement
#[derive(Parser, Debug, Clone)]
#[command(name = "quickping")]
#[command(version, about, long_about = None)]
#[command(after_help = EXAMPLES)]
pub struct Cli {
    /// Run against this server id only
    #[arg(long, value_name = "ID")]
    pub server_id: Option<u32>,

    /// List available servers and exit
    #[arg(long)]
    pub list: bool,

    /// Concurrent streams per direction (1-32)
    #[arg(long, value_parser = parse_streams)]
    pub streams: Option<usize>,

    /// Maximum seconds per direction
    #[arg(short, long, value_parser = parse_duration)]
    pub duration: Option<u64>,

    /// Sampling interval in milliseconds
    #[arg(long, value_name = "MS")]
    pub sample_interval: Option<u64>,

    /// Server directory URL
    #[arg(long, value_name = "URL")]
    pub directory_url: Option<String>,

    /// JSON server list to use before the remote directory
    #[arg(long, value_name = "PATH")]
    pub servers_file: Option<PathBuf>,

    /// Request timeout in seconds for directory and latency requests
    #[arg(short, long, value_parser = parse_duration)]
    pub timeout: Option<u64>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Force colored output
    #[arg(long)]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Validate CLI arguments for conflicts
    pub fn validate(&self) -> Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }
        if self.list && self.json {
            return Err("--list cannot be combined with --json".to_string());
        }
        Ok(())
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.color {
            true
        } else if self.no_color || self.json {
            false
        } else {
            supports_color()
        }
    }

    /// Get configuration summary for display
    pub fn get_config_summary(&self) -> String {
        let mut summary = String::new();

        summary.push_str("Command line:\n");
        if let Some(id) = self.server_id {
            summary.push_str(&format!("  Server id: {}\n", id));
        }
        if let Some(streams) = self.streams {
            summary.push_str(&format!("  Streams: {}\n", streams));
        }
        if let Some(duration) = self.duration {
            summary.push_str(&format!("  Duration: {}s\n", duration));
        }
        if let Some(timeout) = self.timeout {
            summary.push_str(&format!("  Timeout: {}s\n", timeout));
        }
        summary.push_str(&format!("  Colored output: {}\n", self.use_colors()));
        summary.push_str(&format!("  Verbose mode: {}\n", self.verbose));
        summary.push_str(&format!("  Debug mode: {}\n", self.debug));

        summary
    }
}

fn parse_streams(s: &str) -> Result<usize, String> {
    let streams: usize = s.parse().map_err(|_| format!("Invalid stream count: {}", s))?;
    if streams == 0 || streams > crate::defaults::MAX_STREAMS {
        Err(format!("Stream count must be between 1 and {}", crate::defaults::MAX_STREAMS))
    } else {
        Ok(streams)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing_defaults() {
        let cli = Cli::parse_from(["quickping"]);
        assert_eq!(cli.server_id, None);
        assert_eq!(cli.streams, None);
        assert_eq!(cli.duration, None);
        assert!(!cli.list);
        assert!(!cli.json);
        assert!(!cli.verbose);
        assert!(!cli.debug);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_cli_parsing_all_options() {
        let cli = Cli::parse_from([
            "quickping",
            "--server-id", "48809",
            "--streams", "8",
            "--duration", "15",
            "--sample-interval", "250",
            "--directory-url", "https://directory.example.net/servers",
            "--servers-file", "servers.json",
            "--timeout", "20",
            "--json",
            "--no-color",
            "--verbose",
            "--debug",
        ]);

        assert_eq!(cli.server_id, Some(48809));
        assert_eq!(cli.streams, Some(8));
        assert_eq!(cli.duration, Some(15));
        assert_eq!(cli.sample_interval, Some(250));
        assert_eq!(cli.directory_url.as_deref(), Some("https://directory.example.net/servers"));
        assert_eq!(cli.servers_file, Some(PathBuf::from("servers.json")));
        assert_eq!(cli.timeout, Some(20));
        assert!(cli.json);
        assert!(cli.no_color);
        assert!(cli.verbose);
        assert!(cli.debug);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Cli::try_parse_from(["quickping", "--streams", "0"]).is_err());
        assert!(Cli::try_parse_from(["quickping", "--streams", "33"]).is_err());
        assert!(Cli::try_parse_from(["quickping", "--duration", "0"]).is_err());
        assert!(Cli::try_parse_from(["quickping", "--server-id", "abc"]).is_err());
    }

    #[test]
    fn test_duration_parsing() {
        assert_eq!(parse_duration("1").unwrap(), 1);
        assert_eq!(parse_duration("300").unwrap(), 300);

        assert!(parse_duration("0").is_err());
        assert!(parse_duration("301").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10.5").is_err());
        assert!(parse_duration("+10").is_err());
        assert!(parse_duration("0x10").is_err());
        assert!(parse_duration("-5").is_err());
    }

    #[test]
    fn test_cli_validation() {
        let conflict = Cli::parse_from(["quickping", "--color", "--no-color"]);
        assert!(conflict.validate().unwrap_err().contains("--color and --no-color"));

        let list_json = Cli::parse_from(["quickping", "--list", "--json"]);
        assert!(list_json.validate().is_err());

        let list = Cli::parse_from(["quickping", "--list"]);
        assert!(list.validate().is_ok());
    }

    #[test]
    fn test_use_colors_method() {
        assert!(!Cli::parse_from(["quickping", "--no-color"]).use_colors());
        assert!(!Cli::parse_from(["quickping", "--json"]).use_colors());
        assert!(Cli::parse_from(["quickping", "--color"]).use_colors());
    }

    #[test]
    fn test_config_summary() {
        let cli = Cli::parse_from(["quickping", "--server-id", "7", "--duration", "20", "--verbose"]);
        let summary = cli.get_config_summary();
        assert!(summary.contains("Server id: 7"));
        assert!(summary.contains("Duration: 20s"));
        assert!(summary.contains("Verbose mode: true"));
    }
}
