//! Final report handed to consumers

use crate::models::{ServerRecord, TransferResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Base-1024 speed units
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SpeedUnit {
    #[serde(rename = "B/s")]
    BytesPerSec,
    #[serde(rename = "KB/s")]
    KilobytesPerSec,
    #[serde(rename = "MB/s")]
    MegabytesPerSec,
    #[serde(rename = "GB/s")]
    GigabytesPerSec,
}

impl SpeedUnit {
    /// Units from smallest to largest
    pub const ALL: [SpeedUnit; 4] = [
        SpeedUnit::BytesPerSec,
        SpeedUnit::KilobytesPerSec,
        SpeedUnit::MegabytesPerSec,
        SpeedUnit::GigabytesPerSec,
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            SpeedUnit::BytesPerSec => "B/s",
            SpeedUnit::KilobytesPerSec => "KB/s",
            SpeedUnit::MegabytesPerSec => "MB/s",
            SpeedUnit::GigabytesPerSec => "GB/s",
        }
    }
}

impl fmt::Display for SpeedUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A speed scaled for humans, with the raw figure kept alongside
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanSpeed {
    /// Unscaled, unrounded bytes per second
    pub bytes_per_sec: f64,
    /// Scaled, unrounded value in `unit`
    pub value: f64,
    pub unit: SpeedUnit,
    /// `value` rounded to two decimals followed by the unit symbol
    pub display: String,
}

impl HumanSpeed {
    /// Scale `bytes_per_sec` to the largest unit that keeps the value at or above 1
    pub fn from_bytes_per_sec(bytes_per_sec: f64) -> Self {
        let mut value = bytes_per_sec;
        let mut index = 0;
        while value >= 1024.0 && index < SpeedUnit::ALL.len() - 1 {
            value /= 1024.0;
            index += 1;
        }
        let unit = SpeedUnit::ALL[index];

        Self {
            bytes_per_sec,
            value,
            unit,
            display: format!("{:.2} {}", value, unit),
        }
    }
}

impl fmt::Display for HumanSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

/// Complete result of one speed test run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedTestReport {
    pub server: ServerRecord,
    pub download: TransferResult,
    pub upload: TransferResult,
    /// Median probe round trip, unrounded
    pub ping_ms: f64,
    pub jitter_ms: Option<f64>,
    pub download_speed: HumanSpeed,
    pub upload_speed: HumanSpeed,
    /// Either direction was cut short by the caller
    pub cancelled: bool,
    /// Either direction lost streams mid-transfer
    pub partial_failure: bool,
    pub timestamp: DateTime<Utc>,
}

impl SpeedTestReport {
    /// Ping rounded for display
    pub fn ping_display(&self) -> String {
        format!("{:.2} ms", self.ping_ms)
    }

    /// Jitter rounded for display, if measured
    pub fn jitter_display(&self) -> Option<String> {
        self.jitter_ms.map(|jitter| format!("{:.2} ms", jitter))
    }
}
