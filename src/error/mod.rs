//! Error handling for the speed test engine

use crate::types::Phase;
use thiserror::Error;

/// Custom error types for the speed test engine
#[derive(Error, Debug)]
pub enum AppError {
    /// No server directory could be reached or none is configured
    #[error("Server directory unavailable: {0}")]
    DirectoryUnavailable(String),

    /// Every latency probe attempt against a server failed
    #[error("Server {server_id} unreachable: all {attempts} probe attempt(s) failed ({message})")]
    ProbeUnreachable {
        server_id: u32,
        attempts: u32,
        message: String,
    },

    /// Nothing left to choose from
    #[error("No servers available{}", .filter.map(|id| format!(" matching server id {}", id)).unwrap_or_default())]
    NoServersAvailable { filter: Option<u32> },

    /// Too few streams moved any data
    #[error("{phase} against server {server_id} failed: {successful}/{required} stream(s) transferred data ({message})")]
    TransferFailed {
        server_id: u32,
        phase: Phase,
        successful: usize,
        required: usize,
        message: String,
    },

    /// Structurally invalid measurement; indicates an engine bug
    #[error("Invalid measurement: {0}")]
    InvalidMeasurement(String),

    /// The caller cancelled the run
    #[error("Cancelled during {phase}")]
    Cancelled { phase: Phase },

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network connectivity errors
    #[error("Network error: {0}")]
    Network(String),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(String),

    /// Parsing errors (URLs, JSON, etc.)
    #[error("Parsing error: {0}")]
    Parse(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Create a new directory error
    pub fn directory<S: Into<String>>(message: S) -> Self {
        Self::DirectoryUnavailable(message.into())
    }

    /// Create a new probe error
    pub fn probe_unreachable<S: Into<String>>(server_id: u32, attempts: u32, message: S) -> Self {
        Self::ProbeUnreachable {
            server_id,
            attempts,
            message: message.into(),
        }
    }

    /// Create a new "nothing to select" error
    pub fn no_servers(filter: Option<u32>) -> Self {
        Self::NoServersAvailable { filter }
    }

    /// Create a new transfer failure
    pub fn transfer_failed<S: Into<String>>(
        server_id: u32,
        phase: Phase,
        successful: usize,
        required: usize,
        message: S,
    ) -> Self {
        Self::TransferFailed {
            server_id,
            phase,
            successful,
            required,
            message: message.into(),
        }
    }

    /// Create a new invalid measurement error
    pub fn invalid_measurement<S: Into<String>>(message: S) -> Self {
        Self::InvalidMeasurement(message.into())
    }

    /// Create a new cancellation error
    pub fn cancelled(phase: Phase) -> Self {
        Self::Cancelled { phase }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network(message.into())
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout(message.into())
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io(message.into())
    }

    /// Create a new parsing error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Get error category for logging and reporting
    pub fn category(&self) -> &'static str {
        match self {
            Self::DirectoryUnavailable(_) => "DIRECTORY",
            Self::ProbeUnreachable { .. } => "PROBE",
            Self::NoServersAvailable { .. } => "SELECT",
            Self::TransferFailed { .. } => "TRANSFER",
            Self::InvalidMeasurement(_) => "MEASUREMENT",
            Self::Cancelled { .. } => "CANCELLED",
            Self::Config(_) => "CONFIG",
            Self::Network(_) => "NETWORK",
            Self::Timeout(_) => "TIMEOUT",
            Self::Io(_) => "IO",
            Self::Parse(_) => "PARSE",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Phase of the run the error belongs to, when known
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::DirectoryUnavailable(_) => Some(Phase::Directory),
            Self::ProbeUnreachable { .. } | Self::NoServersAvailable { .. } => Some(Phase::Probe),
            Self::TransferFailed { phase, .. } | Self::Cancelled { phase } => Some(*phase),
            _ => None,
        }
    }

    /// Check if error is recoverable (can retry)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::DirectoryUnavailable(_)
            | Self::ProbeUnreachable { .. }
            | Self::TransferFailed { .. }
            | Self::Network(_)
            | Self::Timeout(_) => true,
            Self::NoServersAvailable { .. } | Self::Config(_) | Self::Parse(_) => false,
            Self::InvalidMeasurement(_) | Self::Cancelled { .. } | Self::Io(_) | Self::Internal(_) => false,
        }
    }

    /// Get user-friendly error message with suggestions
    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::DirectoryUnavailable(_) => {
                format!("{}\n\nSuggestion: Check your internet connection, or point --directory-url / --servers-file at a reachable server list.", self)
            }
            Self::ProbeUnreachable { .. } => {
                format!("{}\n\nSuggestion: The server may be down. Run with --list and pick another --server-id.", self)
            }
            Self::NoServersAvailable { filter: Some(_) } => {
                format!("{}\n\nSuggestion: Run with --list to see valid server ids.", self)
            }
            Self::NoServersAvailable { filter: None } => {
                format!("{}\n\nSuggestion: The server directory returned no usable entries. Try again later.", self)
            }
            Self::TransferFailed { .. } => {
                format!("{}\n\nSuggestion: The server may be overloaded. Try again or choose another --server-id.", self)
            }
            Self::InvalidMeasurement(_) => {
                format!("{}\n\nThis is likely a bug. Please report this issue with the error details.", self)
            }
            Self::Cancelled { .. } => {
                format!("{}\n\nThe run was stopped before any result was available.", self)
            }
            Self::Config(msg) => {
                format!("Configuration problem: {}\n\nSuggestion: Check the .env file, the environment variables listed in --help, or the flags you passed.", msg)
            }
            Self::Network(msg) => {
                format!("Network problem: {}\n\nSuggestion: Check your connection, or pick another server with --server-id.", msg)
            }
            Self::Timeout(msg) => {
                format!("Request timed out: {}\n\nSuggestion: Raise the per-request limit with --timeout or try a closer server.", msg)
            }
            Self::Io(msg) => {
                format!("File operation failed: {}\n\nSuggestion: Check file permissions and paths.", msg)
            }
            Self::Parse(msg) => {
                format!("Could not parse a value: {}\n\nSuggestion: Check numeric settings and the server list JSON.", msg)
            }
            Self::Internal(msg) => {
                format!("Internal error: {}\n\nThis is a bug. Please report it together with the --debug output.", msg)
            }
        }
    }

    /// Get exit code for this error type
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Parse(_) => 1,  // Invalid configuration/usage
            Self::DirectoryUnavailable(_) | Self::Network(_) => 2,  // Network issues
            Self::Timeout(_) => 3,
            Self::Io(_) => 5,
            Self::ProbeUnreachable { .. } | Self::NoServersAvailable { .. } => 6,
            Self::TransferFailed { .. } => 7,
            Self::Cancelled { .. } => 130,  // Matches the shell's SIGINT convention
            Self::InvalidMeasurement(_) | Self::Internal(_) => 99,
        }
    }

    /// Format error for console display with color coding
    pub fn format_for_console(&self, use_color: bool) -> String {
        let category = self.category();
        let message = self.to_string();

        if use_color {
            use colored::Colorize;
            match self {
                Self::Config(_) | Self::Parse(_) | Self::NoServersAvailable { .. } => {
                    format!("[{}] {}", category.red().bold(), message.red())
                }
                Self::DirectoryUnavailable(_) | Self::ProbeUnreachable { .. } | Self::Network(_) => {
                    format!("[{}] {}", category.yellow().bold(), message.yellow())
                }
                Self::Timeout(_) | Self::Cancelled { .. } => {
                    format!("[{}] {}", category.blue().bold(), message.blue())
                }
                Self::TransferFailed { .. } | Self::Io(_) => {
                    format!("[{}] {}", category.cyan().bold(), message.cyan())
                }
                Self::InvalidMeasurement(_) | Self::Internal(_) => {
                    format!("[{}] {}", category.bright_red().bold(), message.bright_red())
                }
            }
        } else {
            format!("[{}] {}", category, message)
        }
    }
}

// Standard library error conversions
impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<url::ParseError> for AppError {
    fn from(error: url::ParseError) -> Self {
        Self::parse(format!("URL parse error: {}", error))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::parse(format!("JSON parse error: {}", error))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::timeout(error.to_string())
        } else {
            Self::network(error.to_string())
        }
    }
}

impl From<dotenv::Error> for AppError {
    fn from(error: dotenv::Error) -> Self {
        Self::config(format!("Environment file error: {}", error))
    }
}

impl From<std::num::ParseIntError> for AppError {
    fn from(error: std::num::ParseIntError) -> Self {
        Self::parse(format!("Integer parse error: {}", error))
    }
}

impl From<std::num::ParseFloatError> for AppError {
    fn from(error: std::num::ParseFloatError) -> Self {
        Self::parse(format!("Float parse error: {}", error))
    }
}

impl From<std::str::ParseBoolError> for AppError {
    fn from(error: std::str::ParseBoolError) -> Self {
        Self::parse(format!("Boolean parse error: {}", error))
    }
}

/// Custom Result type for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Error reporter for structured error logging and user feedback
pub struct ErrorReporter {
    pub use_color: bool,
    pub verbose: bool,
}

impl ErrorReporter {
    /// Create a new error reporter
    pub fn new(use_color: bool, verbose: bool) -> Self {
        Self { use_color, verbose }
    }

    /// Render an error as the lines that would be printed
    pub fn render(&self, error: &AppError) -> String {
        let mut output = error.format_for_console(self.use_color);

        if self.verbose {
            output.push_str("\n\n");
            output.push_str(&error.user_friendly_message());

            if error.is_recoverable() {
                let hint = "This error might be temporary. You can try running the command again.";
                output.push_str("\n\n");
                if self.use_color {
                    use colored::Colorize;
                    output.push_str(&hint.green().to_string());
                } else {
                    output.push_str(hint);
                }
            }
        }

        output
    }

    /// Report an error to the user
    pub fn report_error(&self, error: &AppError) {
        eprintln!("{}", self.render(error));
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}
