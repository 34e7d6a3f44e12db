//! Statistics over probe round trips and transfer samples
//!
//! Everything here is pure: the probe and the throughput engine collect raw
//! numbers and hand them over for reduction.

use crate::models::Sample;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How much of the start of a transfer to exclude from the speed figure
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WarmupPolicy {
    /// Samples ending at or before this offset are warmup
    pub min_duration: Duration,
    /// Leading fraction of the samples that is warmup
    pub fraction: f64,
}

impl Default for WarmupPolicy {
    fn default() -> Self {
        Self {
            min_duration: crate::defaults::DEFAULT_WARMUP,
            fraction: crate::defaults::DEFAULT_WARMUP_FRACTION,
        }
    }
}

impl WarmupPolicy {
    /// Number of leading samples to discard; whichever rule trims more wins
    pub fn trim_count(&self, samples: &[Sample]) -> usize {
        let by_time = samples
            .iter()
            .take_while(|s| s.timestamp <= self.min_duration)
            .count();
        let by_fraction = (samples.len() as f64 * self.fraction.clamp(0.0, 1.0)).ceil() as usize;
        by_time.max(by_fraction).min(samples.len())
    }
}

/// Speed derived from the post-warmup part of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SteadyState {
    /// Leading samples excluded as warmup
    pub trimmed: usize,
    /// Samples the speed was computed from
    pub window_samples: usize,
    pub window_bytes: u64,
    pub window_elapsed: Duration,
    /// Bytes per second over the window
    pub speed_bps: f64,
}

/// Compute the steady-state speed of a sample sequence
///
/// Speed is total bytes over total elapsed time inside the window, not the
/// mean of per-sample rates. When warmup would swallow every sample the
/// whole sequence is used instead, so short runs still report a figure.
pub fn steady_state(samples: &[Sample], warmup: &WarmupPolicy) -> SteadyState {
    let mut trimmed = warmup.trim_count(samples);
    if trimmed >= samples.len() {
        trimmed = 0;
    }
    let window = &samples[trimmed..];

    let window_bytes: u64 = window.iter().map(|s| s.bytes_transferred).sum();
    let window_elapsed: Duration = window.iter().map(|s| s.elapsed).sum();
    let secs = window_elapsed.as_secs_f64();
    let speed_bps = if secs > 0.0 { window_bytes as f64 / secs } else { 0.0 };

    SteadyState {
        trimmed,
        window_samples: window.len(),
        window_bytes,
        window_elapsed,
        speed_bps,
    }
}

/// Median of the values; `None` for an empty slice
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Arithmetic mean; `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Mean absolute difference between consecutive values, in input order
pub fn jitter(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let diffs: Vec<f64> = values.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    mean(&diffs).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn constant_samples(count: usize, interval_ms: u64, bytes: u64) -> Vec<Sample> {
        (1..=count as u64)
            .map(|i| Sample {
                timestamp: Duration::from_millis(i * interval_ms),
                bytes_transferred: bytes,
                elapsed: Duration::from_millis(interval_ms),
            })
            .collect()
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[5.0]), Some(5.0));
        assert_eq!(median(&[30.0, 10.0, 20.0]), Some(20.0));
        assert_eq!(median(&[40.0, 10.0, 20.0, 30.0]), Some(25.0));
    }

    #[test]
    fn test_jitter() {
        assert_eq!(jitter(&[]), 0.0);
        assert_eq!(jitter(&[12.0]), 0.0);
        assert_eq!(jitter(&[10.0, 14.0, 12.0]), 3.0);
    }

    #[test]
    fn test_trim_takes_larger_rule() {
        let policy = WarmupPolicy {
            min_duration: Duration::from_secs(2),
            fraction: 0.10,
        };
        // 50 samples at 200ms: 2s covers 10 samples, 10% covers 5
        assert_eq!(policy.trim_count(&constant_samples(50, 200, 1)), 10);
        // 300 samples at 200ms: 10% covers 30
        assert_eq!(policy.trim_count(&constant_samples(300, 200, 1)), 30);
    }

    #[test]
    fn test_ramp_up_excluded_from_speed() {
        let mut samples = constant_samples(50, 200, 2_000_000);
        // Slow start in the first second
        for sample in samples.iter_mut().take(5) {
            sample.bytes_transferred = 100_000;
        }
        let state = steady_state(&samples, &WarmupPolicy::default());
        assert_eq!(state.trimmed, 10);
        assert_eq!(state.window_samples, 40);
        assert!((state.speed_bps - 10_000_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_short_run_uses_all_samples() {
        let samples = constant_samples(4, 200, 1_000);
        let state = steady_state(&samples, &WarmupPolicy::default());
        assert_eq!(state.trimmed, 0);
        assert_eq!(state.window_samples, 4);
        assert!((state.speed_bps - 5_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_samples() {
        let state = steady_state(&[], &WarmupPolicy::default());
        assert_eq!(state.speed_bps, 0.0);
        assert_eq!(state.window_samples, 0);
    }

    #[test]
    fn test_bytes_over_time_not_mean_of_rates() {
        let samples = vec![
            Sample { timestamp: Duration::from_millis(3000), bytes_transferred: 1_000, elapsed: Duration::from_millis(1000) },
            Sample { timestamp: Duration::from_millis(3050), bytes_transferred: 1_000, elapsed: Duration::from_millis(50) },
        ];
        let policy = WarmupPolicy { min_duration: Duration::ZERO, fraction: 0.0 };
        let state = steady_state(&samples, &policy);
        // 2000 bytes over 1.05s, the short window does not dominate
        assert!((state.speed_bps - 2_000.0 / 1.05).abs() < 1e-9);
    }

    proptest! {
        /// A constant rate survives trimming unchanged
        #[test]
        fn constant_rate_is_recovered(count in 1usize..400, interval_ms in 10u64..1000, bytes in 1u64..10_000_000) {
            let samples = constant_samples(count, interval_ms, bytes);
            let state = steady_state(&samples, &WarmupPolicy::default());
            let expected = bytes as f64 / (interval_ms as f64 / 1000.0);
            prop_assert!((state.speed_bps - expected).abs() / expected < 1e-9);
        }

        /// Median always lies between min and max
        #[test]
        fn median_between_min_max(values in proptest::collection::vec(0.0f64..10_000.0, 1..100)) {
            let m = median(&values).unwrap();
            let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(m >= min && m <= max);
        }
    }
}
