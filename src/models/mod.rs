//! Data models and structures for the speed test engine

pub mod config;
pub mod metrics;
pub mod report;
pub mod server;

// Re-export main model types
pub use config::Config;
pub use metrics::{LatencyMeasurement, Sample, StreamSummary, TransferResult};
pub use report::{HumanSpeed, SpeedTestReport, SpeedUnit};
pub use server::ServerRecord;
