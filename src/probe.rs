//! Round-trip latency probing of candidate servers

use crate::{
    client::{cache_buster, ensure_success, ClientFactory},
    error::{AppError, Result},
    logging::Logger,
    models::{LatencyMeasurement, ServerRecord},
    stats,
};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One request/response exchange with a server
#[async_trait]
pub trait RoundTrip: Send + Sync {
    /// Time a single exchange; errors count as a failed attempt
    async fn round_trip(&self, server: &ServerRecord) -> Result<Duration>;
}

/// Round trip over HTTP against the server's `latency.txt`
pub struct HttpRoundTrip {
    client: Client,
}

impl HttpRoundTrip {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RoundTrip for HttpRoundTrip {
    async fn round_trip(&self, server: &ServerRecord) -> Result<Duration> {
        let mut url = server.latency_url()?;
        url.query_pairs_mut().append_pair("x", &cache_buster());

        let started = Instant::now();
        let response = ensure_success(self.client.get(url).send().await?)?;
        // The exchange is complete once the (tiny) body has arrived
        response.bytes().await?;
        Ok(started.elapsed())
    }
}

/// Result of probing a batch of candidates
#[derive(Debug, Default)]
pub struct ProbeOutcome {
    /// Reachable candidates with `latency_ms` populated, in input order
    pub reachable: Vec<ServerRecord>,
    /// Measurements for the reachable candidates, same order
    pub measurements: Vec<LatencyMeasurement>,
    /// One error per unreachable candidate, in input order
    pub failures: Vec<AppError>,
}

/// Measures round-trip latency with repeated independent attempts
pub struct LatencyProbe {
    transport: Arc<dyn RoundTrip>,
    attempts: u32,
    logger: Logger,
}

impl LatencyProbe {
    pub fn new(transport: Arc<dyn RoundTrip>, logger: Logger) -> Self {
        Self {
            transport,
            attempts: crate::defaults::DEFAULT_PROBE_ATTEMPTS,
            logger: logger.named("PROBE"),
        }
    }

    /// Probe over HTTP using a control client from `clients`
    pub fn http(clients: &ClientFactory, logger: Logger) -> Result<Self> {
        let transport = HttpRoundTrip::new(clients.control_client()?);
        Ok(Self::new(Arc::new(transport), logger))
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Median round trip in milliseconds over the configured attempt count
    pub async fn probe(&self, server: &ServerRecord) -> Result<f64> {
        self.probe_with_attempts(server, self.attempts).await
    }

    /// Median round trip in milliseconds over `attempts` attempts
    pub async fn probe_with_attempts(&self, server: &ServerRecord, attempts: u32) -> Result<f64> {
        Ok(self.measure_with_attempts(server, attempts).await?.median_ms)
    }

    /// Full measurement over the configured attempt count
    pub async fn measure(&self, server: &ServerRecord) -> Result<LatencyMeasurement> {
        self.measure_with_attempts(server, self.attempts).await
    }

    async fn measure_with_attempts(&self, server: &ServerRecord, attempts: u32) -> Result<LatencyMeasurement> {
        let attempts = attempts.max(1);
        let mut round_trips_ms = Vec::with_capacity(attempts as usize);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.transport.round_trip(server).await {
                Ok(elapsed) => round_trips_ms.push(elapsed.as_secs_f64() * 1000.0),
                Err(error) => {
                    self.logger
                        .debug(&format!("Probe attempt {}/{} to server {} failed", attempt, attempts, server.id))
                        .field("server_id", server.id)
                        .error_info(&error)
                        .log()
                        .await;
                    last_error = Some(error);
                }
            }
        }

        let median_ms = match stats::median(&round_trips_ms) {
            Some(median) => median,
            None => {
                let message = last_error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "no response".to_string());
                return Err(AppError::probe_unreachable(server.id, attempts, message));
            }
        };

        let jitter_ms = stats::jitter(&round_trips_ms);
        Ok(LatencyMeasurement {
            server_id: server.id,
            attempts,
            round_trips_ms,
            median_ms,
            jitter_ms,
        })
    }

    /// Probe every candidate concurrently
    pub async fn probe_all(&self, candidates: &[ServerRecord]) -> ProbeOutcome {
        let results = join_all(candidates.iter().map(|server| self.measure(server))).await;

        let mut outcome = ProbeOutcome::default();
        for (server, result) in candidates.iter().zip(results) {
            match result {
                Ok(measurement) => {
                    self.logger
                        .info(&format!("Server {} answered in {:.2} ms", server.id, measurement.median_ms))
                        .field("server_id", server.id)
                        .field("median_ms", measurement.median_ms)
                        .field("jitter_ms", measurement.jitter_ms)
                        .log()
                        .await;
                    outcome.reachable.push(server.with_latency(measurement.median_ms));
                    outcome.measurements.push(measurement);
                }
                Err(error) => {
                    self.logger
                        .warn(&format!("Server {} unreachable", server.id))
                        .error_info(&error)
                        .log()
                        .await;
                    outcome.failures.push(error);
                }
            }
        }
        outcome
    }
}
