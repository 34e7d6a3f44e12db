//! Network-free transports driven by the tokio clock
//!
//! Used by tests and benchmarks; under a paused clock the engine run is
//! fully deterministic.

use super::{stream::StreamContext, transport::StreamTransport};
use crate::{
    error::{AppError, Result},
    types::Direction,
};
use async_trait::async_trait;
use std::time::Duration;

/// Moves a constant number of bytes per second on every stream
#[derive(Debug, Clone)]
pub struct SyntheticTransport {
    server_id: u32,
    bytes_per_sec: u64,
    tick: Duration,
    /// Bytes after which a stream ends on its own
    budget: Option<u64>,
    /// Bytes after which every stream fails
    fail_all_after: Option<u64>,
    /// Per-stream failure points: (stream index, bytes)
    stream_failures: Vec<(usize, u64)>,
}

impl SyntheticTransport {
    /// `bytes_per_sec` is the rate of each individual stream
    pub fn constant_rate(bytes_per_sec: u64) -> Self {
        Self {
            server_id: 0,
            bytes_per_sec,
            tick: Duration::from_millis(10),
            budget: None,
            fail_all_after: None,
            stream_failures: Vec::new(),
        }
    }

    /// Every stream fails before moving a byte
    pub fn failing() -> Self {
        Self::constant_rate(0).fail_all_after(0)
    }

    pub fn with_server_id(mut self, server_id: u32) -> Self {
        self.server_id = server_id;
        self
    }

    pub fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn budget(mut self, bytes: u64) -> Self {
        self.budget = Some(bytes);
        self
    }

    pub fn fail_all_after(mut self, bytes: u64) -> Self {
        self.fail_all_after = Some(bytes);
        self
    }

    pub fn fail_stream_after(mut self, index: usize, bytes: u64) -> Self {
        self.stream_failures.push((index, bytes));
        self
    }

    fn failure_point(&self, index: usize) -> Option<u64> {
        self.stream_failures
            .iter()
            .find(|(stream, _)| *stream == index)
            .map(|(_, bytes)| *bytes)
            .or(self.fail_all_after)
    }

    fn chunk(&self) -> u64 {
        (self.bytes_per_sec as f64 * self.tick.as_secs_f64()).round() as u64
    }
}

#[async_trait]
impl StreamTransport for SyntheticTransport {
    fn server_id(&self) -> u32 {
        self.server_id
    }

    async fn run_stream(&self, _direction: Direction, ctx: StreamContext) -> Result<()> {
        let chunk = self.chunk();
        let failure_point = self.failure_point(ctx.index());

        loop {
            if let Some(limit) = failure_point {
                if ctx.transferred() >= limit {
                    return Err(AppError::network(format!(
                        "stream {} reset by peer after {} bytes",
                        ctx.index(),
                        ctx.transferred()
                    )));
                }
            }
            if let Some(budget) = self.budget {
                if ctx.transferred() >= budget {
                    return Ok(());
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.tick) => {}
                _ = ctx.stopped() => return Ok(()),
            }
            if !ctx.record(chunk) {
                return Ok(());
            }
        }
    }
}
