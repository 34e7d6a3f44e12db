//! Throughput engine
//!
//! Drives concurrent transfer streams in one direction against one server,
//! samples the shared byte counters on a fixed interval and reduces the
//! samples to a steady-state speed.
//!
//! Task layout for one run:
//!
//! - one task per stream, started `index * ramp_up_stagger` after the run
//!   begins, writing only its own counter slot;
//! - a sampler task, the only reader that aggregates across slots;
//! - a watchdog task that raises the stop signal at `max_duration` or when
//!   the caller cancels.
//!
//! Stopping is cooperative. Streams get `cancel_grace` to wind down after
//! the stop signal and are aborted after that.

pub mod cancel;
pub mod stream;
pub mod synthetic;
pub mod transport;

pub use cancel::CancellationToken;
pub use stream::{StreamContext, StreamCounters};
pub use synthetic::SyntheticTransport;
pub use transport::{HttpTransport, StreamTransport};

use crate::{
    defaults,
    error::{AppError, Result},
    logging::{LogLevel, Logger},
    models::{Config, Sample, StreamSummary, TransferResult},
    stats::{self, WarmupPolicy},
    types::{Direction, StopReason},
};
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{Instant, MissedTickBehavior};

/// Progress notifications for a consumer rendering a live view
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A sample was recorded
    Sample {
        direction: Direction,
        sample: Sample,
        /// Bytes moved so far in this direction
        total_bytes: u64,
    },
    /// A direction finished
    Finished {
        direction: Direction,
        speed_bps: f64,
        stop_reason: StopReason,
    },
}

/// Tuning for one engine run
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub streams: usize,
    pub max_duration: Duration,
    /// Stop once this many bytes moved across all streams
    pub byte_ceiling: Option<u64>,
    pub sample_interval: Duration,
    pub warmup: WarmupPolicy,
    pub ramp_up_stagger: Duration,
    /// Shortest final partial sample that is kept
    pub min_final_sample: Duration,
    pub min_successful_streams: usize,
    /// Time streams get to stop on their own before being aborted
    pub cancel_grace: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            streams: defaults::DEFAULT_STREAMS,
            max_duration: defaults::DEFAULT_MAX_DURATION,
            byte_ceiling: None,
            sample_interval: defaults::DEFAULT_SAMPLE_INTERVAL,
            warmup: WarmupPolicy::default(),
            ramp_up_stagger: defaults::DEFAULT_RAMP_UP_STAGGER,
            min_final_sample: defaults::DEFAULT_MIN_FINAL_SAMPLE,
            min_successful_streams: 1,
            cancel_grace: defaults::DEFAULT_CANCEL_GRACE,
        }
    }
}

impl EngineConfig {
    pub fn with_streams(mut self, streams: usize) -> Self {
        self.streams = streams;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.streams == 0 || self.streams > defaults::MAX_STREAMS {
            return Err(AppError::config(format!(
                "Stream count must be between 1 and {}",
                defaults::MAX_STREAMS
            )));
        }
        if self.max_duration.is_zero() {
            return Err(AppError::config("Duration must be greater than 0"));
        }
        if self.sample_interval.is_zero() {
            return Err(AppError::config("Sample interval must be greater than 0"));
        }
        if self.min_successful_streams > self.streams {
            return Err(AppError::config(format!(
                "Cannot require {} successful streams out of {}",
                self.min_successful_streams, self.streams
            )));
        }
        if self.byte_ceiling == Some(0) {
            return Err(AppError::config("Byte ceiling must be greater than 0"));
        }
        Ok(())
    }
}

impl From<&Config> for EngineConfig {
    fn from(config: &Config) -> Self {
        Self {
            streams: config.stream_count.unwrap_or(defaults::DEFAULT_STREAMS),
            max_duration: config.max_duration(),
            byte_ceiling: config.byte_ceiling(),
            sample_interval: config.sample_interval(),
            warmup: WarmupPolicy {
                min_duration: config.warmup(),
                fraction: config.warmup_fraction,
            },
            ramp_up_stagger: config.ramp_up_stagger(),
            ..Self::default()
        }
    }
}

/// Recommended stream count given a previously measured speed
///
/// Fast links need more parallel connections to saturate.
pub fn streams_for_history(previous_bps: Option<f64>) -> usize {
    const MBIT: f64 = 1_000_000.0 / 8.0;
    match previous_bps {
        Some(bps) if bps > 500.0 * MBIT => 16,
        Some(bps) if bps > 100.0 * MBIT => 8,
        _ => defaults::DEFAULT_STREAMS,
    }
}

enum StreamOutcome {
    /// Stop arrived during the ramp-up delay
    NotStarted,
    Finished,
    Failed(AppError),
}

/// Runs transfers and measures their throughput
pub struct ThroughputEngine {
    config: EngineConfig,
    logger: Logger,
}

impl ThroughputEngine {
    pub fn new(config: EngineConfig, logger: Logger) -> Self {
        Self {
            config,
            logger: logger.named("ENGINE"),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one direction to completion
    ///
    /// Cancellation through `cancel` is not an error: the result carries
    /// `cancelled = true` and whatever was measured up to that point.
    pub async fn run(
        &self,
        direction: Direction,
        transport: Arc<dyn StreamTransport>,
        cancel: &CancellationToken,
        events: Option<UnboundedSender<ProgressEvent>>,
    ) -> Result<TransferResult> {
        self.config.validate()?;
        if cancel.is_cancelled() {
            return Ok(TransferResult::not_started(direction, true));
        }

        let config = &self.config;
        let operation = format!("{} transfer", direction);
        let correlation_id = self.logger.start_operation(&operation).await;

        let counters = Arc::new(StreamCounters::new(config.streams));
        let stop = CancellationToken::new();
        let settled = CancellationToken::new();
        let ceiling_hit = Arc::new(AtomicBool::new(false));
        let started = Arc::new(AtomicUsize::new(0));
        let start = Instant::now();

        let sampler = Sampler {
            direction,
            counters: counters.clone(),
            start,
            interval: config.sample_interval,
            min_final_sample: config.min_final_sample,
            stop: stop.clone(),
            settled: settled.clone(),
            events: events.clone(),
            logger: self.logger.clone(),
        };
        let sampler = tokio::spawn(sampler.run());
        let watchdog = tokio::spawn(watchdog(config.max_duration, cancel.clone(), stop.clone()));

        let mut handles = Vec::with_capacity(config.streams);
        for index in 0..config.streams {
            let ctx = StreamContext::new(
                index,
                counters.clone(),
                stop.clone(),
                config.byte_ceiling,
                ceiling_hit.clone(),
            );
            let transport = transport.clone();
            let started = started.clone();
            let delay = config.ramp_up_stagger * index as u32;

            handles.push(tokio::spawn(async move {
                if !delay.is_zero() {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = ctx.stopped() => return StreamOutcome::NotStarted,
                    }
                }
                if ctx.should_stop() {
                    return StreamOutcome::NotStarted;
                }
                started.fetch_add(1, Ordering::AcqRel);
                match transport.run_stream(direction, ctx).await {
                    Ok(()) => StreamOutcome::Finished,
                    Err(error) => StreamOutcome::Failed(error),
                }
            }));
        }
        let aborts: Vec<_> = handles.iter().map(|handle| handle.abort_handle()).collect();
        let mut streams = std::pin::pin!(join_all(handles));

        let finished_early = tokio::select! {
            outcomes = &mut streams => Some(outcomes),
            _ = stop.cancelled() => None,
        };
        let outcomes = match finished_early {
            Some(outcomes) => outcomes,
            None => match tokio::time::timeout(config.cancel_grace, &mut streams).await {
                Ok(outcomes) => outcomes,
                Err(_) => {
                    self.logger
                        .warn(&format!("Streams still busy {:?} after stop; aborting", config.cancel_grace))
                        .correlation_id(&correlation_id)
                        .log()
                        .await;
                    for abort in &aborts {
                        abort.abort();
                    }
                    streams.await
                }
            },
        };

        // Every stream has ended: wake the watchdog and let the sampler close
        stop.cancel();
        settled.cancel();

        let watchdog_reason = watchdog.await.unwrap_or(None);
        let (samples, finished_at) = sampler
            .await
            .map_err(|e| AppError::internal(format!("Sampler task failed: {}", e)))?;

        let stop_reason = match watchdog_reason {
            Some(reason) => reason,
            None if ceiling_hit.load(Ordering::Acquire) => StopReason::ByteCeiling,
            None => StopReason::StreamsExhausted,
        };
        let cancelled = stop_reason == StopReason::Cancelled;

        let mut summary = StreamSummary {
            requested: config.streams,
            started: started.load(Ordering::Acquire),
            successful: (0..counters.len()).filter(|&slot| counters.get(slot) > 0).count(),
            failed: 0,
        };
        let mut first_error: Option<AppError> = None;
        for (index, outcome) in outcomes.into_iter().enumerate() {
            let error = match outcome {
                Ok(StreamOutcome::Failed(error)) => error,
                Ok(StreamOutcome::Finished) | Ok(StreamOutcome::NotStarted) => continue,
                Err(join_error) if join_error.is_cancelled() => continue,
                Err(join_error) => AppError::internal(format!("Stream task panicked: {}", join_error)),
            };
            summary.failed += 1;
            self.logger
                .warn(&format!("{} stream {} failed", direction, index))
                .correlation_id(&correlation_id)
                .field("stream", index)
                .field("bytes", counters.get(index))
                .error_info(&error)
                .log()
                .await;
            first_error.get_or_insert(error);
        }

        if summary.successful < config.min_successful_streams && !cancelled {
            self.logger.end_operation(&correlation_id, &operation, false).await;
            let message = first_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no data transferred".to_string());
            return Err(AppError::transfer_failed(
                transport.server_id(),
                direction.phase(),
                summary.successful,
                config.min_successful_streams,
                message,
            ));
        }

        let steady = stats::steady_state(&samples, &config.warmup);
        let result = TransferResult {
            direction,
            samples,
            computed_speed_bps: steady.speed_bps,
            total_bytes: counters.total(),
            duration: finished_at,
            streams: summary,
            partial_failure: summary.failed > 0,
            cancelled,
            stop_reason,
        };

        self.logger
            .info(&format!("{} finished: {}", direction, stop_reason))
            .correlation_id(&correlation_id)
            .transfer(&result)
            .field("warmup_samples", steady.trimmed)
            .log()
            .await;
        self.logger.end_operation(&correlation_id, &operation, true).await;

        if let Some(events) = &events {
            let _ = events.send(ProgressEvent::Finished {
                direction,
                speed_bps: result.computed_speed_bps,
                stop_reason,
            });
        }

        Ok(result)
    }
}

/// Raise `stop` at the deadline or on caller cancellation
///
/// Returns the reason, or `None` when something else raised `stop` first.
async fn watchdog(
    max_duration: Duration,
    cancel: CancellationToken,
    stop: CancellationToken,
) -> Option<StopReason> {
    let reason = tokio::select! {
        biased;
        _ = cancel.cancelled() => Some(StopReason::Cancelled),
        _ = stop.cancelled() => None,
        _ = tokio::time::sleep(max_duration) => Some(StopReason::Deadline),
    };
    stop.cancel();
    reason
}

struct Sampler {
    direction: Direction,
    counters: Arc<StreamCounters>,
    start: Instant,
    interval: Duration,
    min_final_sample: Duration,
    stop: CancellationToken,
    settled: CancellationToken,
    events: Option<UnboundedSender<ProgressEvent>>,
    logger: Logger,
}

impl Sampler {
    /// Sample until stopped, then take the final partial sample once the
    /// streams have settled. Returns the samples and the end of the run.
    async fn run(self) -> (Vec<Sample>, Duration) {
        let mut ticker = tokio::time::interval_at(self.start + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut samples = Vec::new();
        let mut previous_total = 0u64;
        let mut previous_at = Duration::ZERO;

        loop {
            tokio::select! {
                biased;
                _ = self.stop.cancelled() => break,
                _ = ticker.tick() => {
                    let at = self.start.elapsed();
                    self.record(&mut samples, &mut previous_total, &mut previous_at, at).await;
                }
            }
        }

        self.settled.cancelled().await;
        let finished_at = self.start.elapsed();
        let window = finished_at.saturating_sub(previous_at);
        let unsampled = self.counters.total().saturating_sub(previous_total);
        // A short tail is the only measurement when the run stopped before the first tick
        if window >= self.min_final_sample || (samples.is_empty() && unsampled > 0) {
            self.record(&mut samples, &mut previous_total, &mut previous_at, finished_at).await;
        } else if !window.is_zero() {
            self.logger
                .debug(&format!("Dropped final {} sample of {:?}", self.direction, window))
                .field("bytes", unsampled)
                .log()
                .await;
        }

        (samples, finished_at)
    }

    async fn record(
        &self,
        samples: &mut Vec<Sample>,
        previous_total: &mut u64,
        previous_at: &mut Duration,
        at: Duration,
    ) {
        let elapsed = at.saturating_sub(*previous_at);
        if elapsed.is_zero() {
            return;
        }
        let total = self.counters.total();
        let sample = Sample {
            timestamp: at,
            bytes_transferred: total.saturating_sub(*previous_total),
            elapsed,
        };
        *previous_total = total;
        *previous_at = at;
        samples.push(sample);

        if self.logger.would_log(LogLevel::Trace) {
            self.logger
                .trace(&format!("{} sample", self.direction))
                .sample(&sample)
                .field("total_bytes", total)
                .log()
                .await;
        }

        if let Some(events) = &self.events {
            let _ = events.send(ProgressEvent::Sample {
                direction: self.direction,
                sample,
                total_bytes: total,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::server::sample_server;
    use async_trait::async_trait;
    use tokio::sync::mpsc;
    use wiremock::{
        matchers::{method, path, path_regex},
        Mock, MockServer, ResponseTemplate,
    };

    fn engine(config: EngineConfig) -> ThroughputEngine {
        ThroughputEngine::new(config, Logger::new("TEST"))
    }

    fn per_stream(total_bps: u64, streams: usize) -> Arc<SyntheticTransport> {
        Arc::new(SyntheticTransport::constant_rate(total_bps / streams as u64))
    }

    #[tokio::test(start_paused = true)]
    async fn test_constant_rate_converges() {
        // 4 streams, 10 s, 200 ms sampling, 10 MB/s aggregate
        let result = engine(EngineConfig::default())
            .run(Direction::Download, per_stream(10_000_000, 4), &CancellationToken::new(), None)
            .await
            .unwrap();

        assert!((49..=51).contains(&result.samples.len()), "samples: {}", result.samples.len());
        assert!(
            (9_950_000.0..=10_050_000.0).contains(&result.computed_speed_bps),
            "speed: {}",
            result.computed_speed_bps
        );
        assert_eq!(result.stop_reason, StopReason::Deadline);
        assert_eq!(result.streams.requested, 4);
        assert_eq!(result.streams.started, 4);
        assert_eq!(result.streams.successful, 4);
        assert!(!result.cancelled);
        assert!(!result.partial_failure);
        assert!(result.samples_are_consistent());
        assert!(result.total_bytes >= result.samples.iter().map(|s| s.bytes_transferred).sum::<u64>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_samples_are_strictly_ordered() {
        let config = EngineConfig {
            max_duration: Duration::from_millis(2_130),
            sample_interval: Duration::from_millis(100),
            ..EngineConfig::default()
        };
        let result = engine(config)
            .run(Direction::Upload, per_stream(4_000_000, 4), &CancellationToken::new(), None)
            .await
            .unwrap();

        assert!(result.samples_are_consistent());
        for pair in result.samples.windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
            assert_eq!(pair[0].timestamp, pair[1].started_at());
        }
        // 21 ticks plus a 30 ms tail, which is below the final-sample minimum
        assert_eq!(result.samples.len(), 21);
    }

    #[tokio::test(start_paused = true)]
    async fn test_byte_ceiling_stops_early() {
        let config = EngineConfig {
            byte_ceiling: Some(5_000_000),
            ..EngineConfig::default()
        };
        let result = engine(config)
            .run(Direction::Download, per_stream(10_000_000, 4), &CancellationToken::new(), None)
            .await
            .unwrap();

        assert_eq!(result.stop_reason, StopReason::ByteCeiling);
        assert!(result.total_bytes >= 5_000_000);
        assert!(result.total_bytes < 5_200_000);
        assert!(result.duration < Duration::from_secs(1));
        assert!(result.computed_speed_bps > 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_returns_partial_result() {
        let cancel = CancellationToken::new();
        {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(3)).await;
                cancel.cancel();
            });
        }

        let result = engine(EngineConfig::default())
            .run(Direction::Download, per_stream(10_000_000, 4), &cancel, None)
            .await
            .unwrap();

        assert!(result.cancelled);
        assert_eq!(result.stop_reason, StopReason::Cancelled);
        assert!(result.computed_speed_bps > 0.0);
        assert!(result.duration <= Duration::from_millis(3_100));
        assert!(result.samples_are_consistent());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_within_first_interval_keeps_speed() {
        let cancel = CancellationToken::new();
        {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(40)).await;
                cancel.cancel();
            });
        }

        let result = engine(EngineConfig::default())
            .run(Direction::Download, per_stream(10_000_000, 4), &cancel, None)
            .await
            .unwrap();

        assert!(result.cancelled);
        assert!(result.total_bytes > 0);
        // Shorter than the final-sample minimum, but the only window there is
        assert_eq!(result.samples.len(), 1);
        assert_eq!(result.samples[0].bytes_transferred, result.total_bytes);
        assert!(result.computed_speed_bps > 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_byte_ceiling_keeps_speed() {
        let config = EngineConfig {
            byte_ceiling: Some(1_000_000),
            ..EngineConfig::default()
        };
        let result = engine(config)
            .run(Direction::Download, per_stream(200_000_000, 4), &CancellationToken::new(), None)
            .await
            .unwrap();

        assert_eq!(result.stop_reason, StopReason::ByteCeiling);
        assert!(result.total_bytes >= 1_000_000);
        assert!(result.duration < Duration::from_millis(50));
        assert_eq!(result.samples.len(), 1);
        assert!(result.computed_speed_bps > 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_streams_start_staggered() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let config = EngineConfig {
            max_duration: Duration::from_millis(2_500),
            ramp_up_stagger: Duration::from_secs(1),
            ..EngineConfig::default()
        };
        // 1 MB/s per stream, 10 kB every 10 ms
        let result = engine(config)
            .run(Direction::Download, per_stream(4_000_000, 4), &CancellationToken::new(), Some(tx))
            .await
            .unwrap();

        let mut samples = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ProgressEvent::Sample { sample, .. } = event {
                samples.push(sample);
            }
        }
        // Only stream 0 runs before 1 s, streams 0 and 1 before 2 s
        let first = samples[0].bytes_transferred;
        assert!((190_000..=200_000).contains(&first), "first sample: {}", first);
        let second_second = samples[6].bytes_transferred;
        assert!((380_000..=420_000).contains(&second_second), "sample 7: {}", second_second);

        // Stream 3 was due at 3 s, after the deadline
        assert_eq!(result.streams.requested, 4);
        assert_eq!(result.streams.started, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_second_stream_is_due() {
        let config = EngineConfig {
            max_duration: Duration::from_millis(900),
            ramp_up_stagger: Duration::from_secs(1),
            ..EngineConfig::default()
        };
        let result = engine(config)
            .run(Direction::Upload, per_stream(4_000_000, 4), &CancellationToken::new(), None)
            .await
            .unwrap();

        assert_eq!(result.streams.started, 1);
        assert_eq!(result.streams.successful, 1);
        assert!(!result.partial_failure);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = engine(EngineConfig::default())
            .run(Direction::Upload, per_stream(10_000_000, 4), &cancel, None)
            .await
            .unwrap();

        assert!(result.cancelled);
        assert!(result.samples.is_empty());
        assert_eq!(result.total_bytes, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_streams_failing() {
        let transport = Arc::new(SyntheticTransport::failing().with_server_id(4242));
        let error = engine(EngineConfig::default())
            .run(Direction::Download, transport, &CancellationToken::new(), None)
            .await
            .unwrap_err();

        match error {
            AppError::TransferFailed { server_id, phase, successful, required, ref message } => {
                assert_eq!(server_id, 4242);
                assert_eq!(phase, crate::types::Phase::Download);
                assert_eq!(successful, 0);
                assert_eq!(required, 1);
                assert!(message.contains("reset by peer"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_failure_is_tolerated() {
        let transport = Arc::new(
            SyntheticTransport::constant_rate(2_500_000).fail_stream_after(1, 1_000_000),
        );
        let result = engine(EngineConfig::default())
            .run(Direction::Download, transport, &CancellationToken::new(), None)
            .await
            .unwrap();

        assert!(result.partial_failure);
        assert_eq!(result.streams.failed, 1);
        assert_eq!(result.streams.successful, 4);
        // Three streams remain for the steady-state window
        assert!(
            (7_450_000.0..=7_550_000.0).contains(&result.computed_speed_bps),
            "speed: {}",
            result.computed_speed_bps
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_streams_exhausted() {
        let transport = Arc::new(SyntheticTransport::constant_rate(1_000_000).budget(500_000));
        let result = engine(EngineConfig::default())
            .run(Direction::Upload, transport, &CancellationToken::new(), None)
            .await
            .unwrap();

        assert_eq!(result.stop_reason, StopReason::StreamsExhausted);
        assert_eq!(result.total_bytes, 4 * 500_000);
        assert!(result.duration < Duration::from_secs(1));
    }

    /// Records some bytes, then ignores the stop signal
    struct StuckTransport;

    #[async_trait]
    impl StreamTransport for StuckTransport {
        fn server_id(&self) -> u32 {
            7
        }

        async fn run_stream(&self, _direction: Direction, ctx: StreamContext) -> Result<()> {
            ctx.record(1_000);
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresponsive_streams_are_aborted() {
        let config = EngineConfig {
            max_duration: Duration::from_secs(2),
            ..EngineConfig::default()
        };
        let result = engine(config)
            .run(Direction::Download, Arc::new(StuckTransport), &CancellationToken::new(), None)
            .await
            .unwrap();

        assert_eq!(result.stop_reason, StopReason::Deadline);
        assert_eq!(result.total_bytes, 4_000);
        assert_eq!(result.streams.failed, 0);
        assert!(result.duration >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let config = EngineConfig {
            max_duration: Duration::from_secs(1),
            ..EngineConfig::default()
        };
        let result = engine(config)
            .run(Direction::Download, per_stream(1_000_000, 4), &CancellationToken::new(), Some(tx))
            .await
            .unwrap();

        let mut sample_events = 0;
        let mut finished = None;
        while let Ok(event) = rx.try_recv() {
            match event {
                ProgressEvent::Sample { direction, .. } => {
                    assert_eq!(direction, Direction::Download);
                    sample_events += 1;
                }
                ProgressEvent::Finished { speed_bps, stop_reason, .. } => {
                    finished = Some((speed_bps, stop_reason));
                }
            }
        }
        assert_eq!(sample_events, result.samples.len());
        assert_eq!(finished, Some((result.computed_speed_bps, StopReason::Deadline)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_trace_logging_per_sample() {
        let mut logger = Logger::new("TRACE");
        logger.set_level(LogLevel::Trace);
        assert!(logger.would_log(LogLevel::Trace));
        let config = EngineConfig {
            max_duration: Duration::from_secs(1),
            ..EngineConfig::default()
        };
        let result = ThroughputEngine::new(config, logger)
            .run(Direction::Upload, per_stream(1_000_000, 4), &CancellationToken::new(), None)
            .await
            .unwrap();
        assert_eq!(result.samples.len(), 5);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let result = engine(EngineConfig::default().with_streams(0))
            .run(Direction::Download, per_stream(1_000, 1), &CancellationToken::new(), None)
            .await;
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_streams_for_history() {
        assert_eq!(streams_for_history(None), 4);
        assert_eq!(streams_for_history(Some(5_000_000.0)), 4);
        assert_eq!(streams_for_history(Some(20_000_000.0)), 8);
        assert_eq!(streams_for_history(Some(100_000_000.0)), 16);
    }

    #[test]
    fn test_engine_config_from_config() {
        let config = Config {
            stream_count: Some(6),
            max_duration_seconds: 15,
            sample_interval_ms: 250,
            warmup_seconds: 1.5,
            warmup_fraction: 0.2,
            byte_ceiling_mb: Some(100),
            ..Config::default()
        };
        let engine = EngineConfig::from(&config);
        assert_eq!(engine.streams, 6);
        assert_eq!(engine.max_duration, Duration::from_secs(15));
        assert_eq!(engine.sample_interval, Duration::from_millis(250));
        assert_eq!(engine.warmup.min_duration, Duration::from_millis(1_500));
        assert_eq!(engine.warmup.fraction, 0.2);
        assert_eq!(engine.byte_ceiling, Some(100 * 1024 * 1024));
        assert_eq!(engine.min_successful_streams, 1);
    }

    fn http_config() -> EngineConfig {
        EngineConfig {
            streams: 2,
            max_duration: Duration::from_millis(500),
            sample_interval: Duration::from_millis(50),
            ramp_up_stagger: Duration::ZERO,
            warmup: WarmupPolicy {
                min_duration: Duration::ZERO,
                fraction: 0.0,
            },
            ..EngineConfig::default()
        }
    }

    fn mock_server_record(mock: &MockServer) -> crate::models::ServerRecord {
        let mut server = sample_server(31, 1.0);
        server.url = format!("{}/speedtest/upload.php", mock.uri());
        server
    }

    #[tokio::test]
    async fn test_http_download() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/speedtest/random\d+x\d+\.jpg$"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 256 * 1024]))
            .mount(&mock)
            .await;

        let transport = HttpTransport::new(reqwest::Client::new(), mock_server_record(&mock));
        let result = engine(http_config())
            .run(Direction::Download, Arc::new(transport), &CancellationToken::new(), None)
            .await
            .unwrap();

        assert_eq!(result.streams.successful, 2);
        assert!(result.total_bytes >= 256 * 1024);
        assert!(result.computed_speed_bps > 0.0);
    }

    #[tokio::test]
    async fn test_http_upload() {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/speedtest/upload.php"))
            .respond_with(ResponseTemplate::new(200).set_body_string("size=65536"))
            .mount(&mock)
            .await;

        let transport =
            HttpTransport::with_payload_size(reqwest::Client::new(), mock_server_record(&mock), 256 * 1024);
        let result = engine(http_config())
            .run(Direction::Upload, Arc::new(transport), &CancellationToken::new(), None)
            .await
            .unwrap();

        assert_eq!(result.streams.successful, 2);
        assert!(result.total_bytes > 0);
    }

    #[tokio::test]
    async fn test_http_download_error_status() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock)
            .await;

        let transport = HttpTransport::new(reqwest::Client::new(), mock_server_record(&mock));
        let error = engine(http_config())
            .run(Direction::Download, Arc::new(transport), &CancellationToken::new(), None)
            .await
            .unwrap_err();

        assert!(matches!(error, AppError::TransferFailed { server_id: 31, successful: 0, .. }));
    }
}
