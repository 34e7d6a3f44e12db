//! Reduction of transfer results into the final report

use crate::{
    error::{AppError, Result},
    models::{HumanSpeed, ServerRecord, SpeedTestReport, TransferResult},
    types::Direction,
};
use chrono::{DateTime, Utc};

/// Builds [`SpeedTestReport`]s
///
/// Aggregation is pure: no I/O and no clock. Identical inputs always give
/// an identical report.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAggregator;

impl ResultAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Validate the measurements and assemble the report
    pub fn aggregate(
        &self,
        server: ServerRecord,
        download: TransferResult,
        upload: TransferResult,
        ping_ms: f64,
        jitter_ms: Option<f64>,
        timestamp: DateTime<Utc>,
    ) -> Result<SpeedTestReport> {
        check_non_negative("ping", ping_ms)?;
        if let Some(jitter) = jitter_ms {
            check_non_negative("jitter", jitter)?;
        }
        check_transfer(&download, Direction::Download)?;
        check_transfer(&upload, Direction::Upload)?;

        Ok(SpeedTestReport {
            download_speed: HumanSpeed::from_bytes_per_sec(download.computed_speed_bps),
            upload_speed: HumanSpeed::from_bytes_per_sec(upload.computed_speed_bps),
            cancelled: download.cancelled || upload.cancelled,
            partial_failure: download.partial_failure || upload.partial_failure,
            server,
            download,
            upload,
            ping_ms,
            jitter_ms,
            timestamp,
        })
    }
}

fn check_non_negative(what: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(AppError::invalid_measurement(format!("{} is {}", what, value)))
    }
}

fn check_transfer(result: &TransferResult, expected: Direction) -> Result<()> {
    if result.direction != expected {
        return Err(AppError::invalid_measurement(format!(
            "expected a {} result, got {}",
            expected, result.direction
        )));
    }
    check_non_negative(&format!("{} speed", expected), result.computed_speed_bps)?;
    if !result.samples_are_consistent() {
        return Err(AppError::invalid_measurement(format!(
            "{} samples are out of order or empty-windowed",
            expected
        )));
    }
    let sampled: u64 = result.samples.iter().map(|s| s.bytes_transferred).sum();
    if sampled > result.total_bytes {
        return Err(AppError::invalid_measurement(format!(
            "{} samples account for {} bytes but only {} moved",
            expected, sampled, result.total_bytes
        )));
    }
    Ok(())
}
