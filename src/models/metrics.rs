//! Sample and transfer result data models

use crate::types::{Direction, StopReason};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One sampling window of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// End of the window, measured from the start of the transfer
    pub timestamp: Duration,
    /// Bytes moved across all streams inside the window
    pub bytes_transferred: u64,
    /// Window length; always greater than zero
    pub elapsed: Duration,
}

impl Sample {
    /// Start of the window, measured from the start of the transfer
    pub fn started_at(&self) -> Duration {
        self.timestamp.saturating_sub(self.elapsed)
    }

    /// Instantaneous rate over this window in bytes per second
    pub fn rate_bps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes_transferred as f64 / secs
        } else {
            0.0
        }
    }
}

/// Stream accounting for one transfer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSummary {
    /// Streams the engine was asked to open
    pub requested: usize,
    /// Streams that got past the ramp-up delay
    pub started: usize,
    /// Streams that moved at least one byte
    pub successful: usize,
    /// Streams that ended with an error
    pub failed: usize,
}

/// Outcome of one direction of a speed test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferResult {
    pub direction: Direction,
    /// Chronologically ordered, non-overlapping windows
    pub samples: Vec<Sample>,
    /// Steady-state speed in bytes per second
    pub computed_speed_bps: f64,
    /// Bytes moved during the whole run, warmup included
    pub total_bytes: u64,
    /// Wall time from the first stream start to the final sample
    pub duration: Duration,
    pub streams: StreamSummary,
    /// Some streams failed mid-transfer and were excluded from then on
    pub partial_failure: bool,
    /// The caller cancelled the run; the figures cover what was measured
    pub cancelled: bool,
    pub stop_reason: StopReason,
}

impl TransferResult {
    /// Placeholder for a direction that never ran
    pub fn not_started(direction: Direction, cancelled: bool) -> Self {
        Self {
            direction,
            samples: Vec::new(),
            computed_speed_bps: 0.0,
            total_bytes: 0,
            duration: Duration::ZERO,
            streams: StreamSummary::default(),
            partial_failure: false,
            cancelled,
            stop_reason: if cancelled { StopReason::Cancelled } else { StopReason::NotStarted },
        }
    }

    /// Speed in megabits per second
    pub fn speed_mbps(&self) -> f64 {
        self.computed_speed_bps * 8.0 / 1_000_000.0
    }

    /// Check the ordering and positivity invariants of the sample list
    pub fn samples_are_consistent(&self) -> bool {
        self.samples.iter().all(|s| s.elapsed > Duration::ZERO)
            && self
                .samples
                .windows(2)
                .all(|pair| pair[0].timestamp < pair[1].timestamp && pair[0].timestamp <= pair[1].started_at())
    }
}

/// Result of probing one server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyMeasurement {
    pub server_id: u32,
    /// Attempts made, successful or not
    pub attempts: u32,
    /// Successful round trips in attempt order
    pub round_trips_ms: Vec<f64>,
    pub median_ms: f64,
    /// Mean absolute difference between consecutive round trips
    pub jitter_ms: f64,
}

impl LatencyMeasurement {
    /// Attempts that did not produce a round trip
    pub fn failed_attempts(&self) -> u32 {
        self.attempts.saturating_sub(self.round_trips_ms.len() as u32)
    }
}
