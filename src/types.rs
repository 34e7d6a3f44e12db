//! Type definitions and aliases

use serde::{Deserialize, Serialize};
use std::fmt;

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Direction of a throughput transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Bytes flow from the server to us
    Download,
    /// Bytes flow from us to the server
    Upload,
}

impl Direction {
    /// Measurement phase this direction runs in
    pub fn phase(&self) -> Phase {
        match self {
            Direction::Download => Phase::Download,
            Direction::Upload => Phase::Upload,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Download => write!(f, "download"),
            Direction::Upload => write!(f, "upload"),
        }
    }
}

/// Stage of a speed test run, carried by errors for context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Directory,
    Probe,
    Download,
    Upload,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Directory => "directory",
            Phase::Probe => "probe",
            Phase::Download => "download",
            Phase::Upload => "upload",
        };
        f.write_str(name)
    }
}

/// Why a transfer stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// `max_duration` elapsed
    Deadline,
    /// The configured byte ceiling was reached
    ByteCeiling,
    /// The caller cancelled the run
    Cancelled,
    /// Every stream ended on its own (finished or failed)
    StreamsExhausted,
    /// The transfer never ran (e.g. upload skipped after cancellation)
    NotStarted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StopReason::Deadline => "deadline",
            StopReason::ByteCeiling => "byte ceiling",
            StopReason::Cancelled => "cancelled",
            StopReason::StreamsExhausted => "streams exhausted",
            StopReason::NotStarted => "not started",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_phase_mapping() {
        assert_eq!(Direction::Download.phase(), Phase::Download);
        assert_eq!(Direction::Upload.phase(), Phase::Upload);
    }

    #[test]
    fn test_serialized_names() {
        assert_eq!(serde_json::to_string(&Direction::Upload).unwrap(), "\"upload\"");
        assert_eq!(serde_json::to_string(&StopReason::ByteCeiling).unwrap(), "\"byte_ceiling\"");
        assert_eq!(Phase::Probe.to_string(), "probe");
    }
}
