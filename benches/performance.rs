//! Performance benchmarks for the speed and aggregation math
//!
//! These run on every sampler tick or once per report, so they should stay
//! far below the sampling interval even for long runs.

use chrono::{TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use quickping::{
    models::{Sample, StreamSummary},
    stats::{jitter, median, steady_state, WarmupPolicy},
    Direction, HumanSpeed, ResultAggregator, ServerRecord, StopReason, TransferResult,
};
use std::hint::black_box;
use std::time::Duration;

/// Samples of a run that ramps up over the first second
fn create_samples(count: usize) -> Vec<Sample> {
    (1..=count as u64)
        .map(|i| Sample {
            timestamp: Duration::from_millis(i * 200),
            bytes_transferred: 1_000_000u64.min(i * 150_000) + (i % 7) * 1_000,
            elapsed: Duration::from_millis(200),
        })
        .collect()
}

fn create_transfer(direction: Direction, count: usize) -> TransferResult {
    let samples = create_samples(count);
    let total_bytes = samples.iter().map(|s| s.bytes_transferred).sum();
    TransferResult {
        direction,
        computed_speed_bps: steady_state(&samples, &WarmupPolicy::default()).speed_bps,
        samples,
        total_bytes,
        duration: Duration::from_millis(count as u64 * 200),
        streams: StreamSummary {
            requested: 8,
            started: 8,
            successful: 8,
            failed: 0,
        },
        partial_failure: false,
        cancelled: false,
        stop_reason: StopReason::Deadline,
    }
}

fn create_server() -> ServerRecord {
    ServerRecord {
        id: 1,
        host: "speed.example.net".to_string(),
        port: 8080,
        name: "Bench".to_string(),
        country: "Benchland".to_string(),
        sponsor: None,
        url: "http://speed.example.net:8080/speedtest/upload.php".to_string(),
        distance_km: 1.0,
        latency_ms: Some(5.0),
    }
}

fn bench_steady_state(c: &mut Criterion) {
    let mut group = c.benchmark_group("steady_state");
    let warmup = WarmupPolicy::default();

    for count in [50usize, 500, 5_000] {
        let samples = create_samples(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &samples, |b, samples| {
            b.iter(|| steady_state(black_box(samples), black_box(&warmup)))
        });
    }

    group.finish();
}

fn bench_latency_stats(c: &mut Criterion) {
    let round_trips: Vec<f64> = (0..100).map(|i| 10.0 + (i % 13) as f64 * 0.7).collect();

    c.bench_function("median_100", |b| b.iter(|| median(black_box(&round_trips))));
    c.bench_function("jitter_100", |b| b.iter(|| jitter(black_box(&round_trips))));
}

fn bench_aggregate(c: &mut Criterion) {
    let aggregator = ResultAggregator::new();
    let download = create_transfer(Direction::Download, 50);
    let upload = create_transfer(Direction::Upload, 50);
    let timestamp = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    c.bench_function("aggregate_report", |b| {
        b.iter(|| {
            aggregator.aggregate(
                create_server(),
                black_box(download.clone()),
                black_box(upload.clone()),
                12.5,
                Some(0.8),
                timestamp,
            )
        })
    });
}

fn bench_human_speed(c: &mut Criterion) {
    let speeds = [0.0, 512.0, 150_000.0, 12_500_000.0, 3_000_000_000.0];

    c.bench_function("human_speed", |b| {
        b.iter(|| {
            for speed in speeds {
                black_box(HumanSpeed::from_bytes_per_sec(black_box(speed)));
            }
        })
    });
}

criterion_group!(
    benches,
    bench_steady_state,
    bench_latency_stats,
    bench_aggregate,
    bench_human_speed
);
criterion_main!(benches);
