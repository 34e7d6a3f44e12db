//! QuickPing
//!
//! An internet throughput and latency measurement engine. The engine picks a
//! measurement server from a directory, probes candidate latency, drives
//! concurrent download and upload streams against the chosen server and
//! reduces the timed samples into a steady-state speed report.

pub mod aggregator;
pub mod app;
pub mod cli;
pub mod client;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod output;
pub mod probe;
pub mod selector;
pub mod stats;
pub mod types;

// Re-export commonly used types
pub use aggregator::ResultAggregator;
pub use directory::ServerDirectory;
pub use engine::{CancellationToken, EngineConfig, ProgressEvent, ThroughputEngine};
pub use error::{AppError, Result};
pub use executor::{run_speed_test, RunConfig, SpeedTestRunner};
pub use models::{Config, HumanSpeed, Sample, ServerRecord, SpeedTestReport, TransferResult};
pub use probe::LatencyProbe;
pub use selector::ServerSelector;
pub use types::{Direction, Phase, StopReason};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Build metadata set by `build.rs`
pub const BUILD_TIME: &str = env!("BUILD_TIME");
pub const GIT_COMMIT: &str = env!("GIT_COMMIT");
pub const TARGET_TRIPLE: &str = env!("TARGET_TRIPLE");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_DIRECTORY_URL: &str = "https://www.speedtest.net/api/js/servers?engine=js&limit=10";
    pub const DEFAULT_STREAMS: usize = 4;
    pub const MAX_STREAMS: usize = 32;
    pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(10);
    pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(200);
    pub const DEFAULT_WARMUP: Duration = Duration::from_secs(2);
    pub const DEFAULT_WARMUP_FRACTION: f64 = 0.10;
    pub const DEFAULT_RAMP_UP_STAGGER: Duration = Duration::from_millis(100);
    pub const DEFAULT_MIN_FINAL_SAMPLE: Duration = Duration::from_millis(50);
    pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(1);
    pub const DEFAULT_PROBE_ATTEMPTS: u32 = 3;
    pub const DEFAULT_CANDIDATE_COUNT: usize = 5;
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_ENABLE_COLOR: bool = true;
    /// Image sizes cycled through by download streams
    pub const DOWNLOAD_SIZES: &[u32] = &[350, 500, 750, 1000, 1500, 2000, 2500, 3000, 3500, 4000];
    /// Body size of a single upload request
    pub const UPLOAD_REQUEST_BYTES: usize = 4 * 1024 * 1024;
    /// Chunk size for upload bodies
    pub const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;
    /// Directory page size requested when looking up one server id
    pub const FILTERED_DIRECTORY_LIMIT: usize = 1000;
    /// Servers listed by `--list`
    pub const SERVER_LIST_LIMIT: usize = 10;
}
