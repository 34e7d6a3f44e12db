//! Speed test execution
//!
//! The runner wires the components together for one complete run:
//! directory fetch, concurrent latency probing of the nearest candidates,
//! server selection, the download and upload transfers, and aggregation.
//! Every phase observes the caller's cancellation token.

use crate::{
    aggregator::ResultAggregator,
    client::ClientFactory,
    defaults,
    directory::{nearest, DirectorySource, ServerDirectory},
    engine::{
        streams_for_history, CancellationToken, EngineConfig, HttpTransport, ProgressEvent,
        StreamTransport, ThroughputEngine,
    },
    error::{AppError, Result},
    logging::Logger,
    models::{Config, ServerRecord, SpeedTestReport, TransferResult},
    probe::LatencyProbe,
    selector::ServerSelector,
    types::{Direction, Phase},
};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

/// Builds the stream transport for the selected server
pub type TransportFactory =
    Arc<dyn Fn(&ServerRecord) -> Result<Arc<dyn StreamTransport>> + Send + Sync>;

/// Everything one run needs
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Directory sources in lookup order
    pub sources: Vec<DirectorySource>,
    /// Restrict the run to this server id
    pub server_id: Option<u32>,
    /// Nearest servers probed before selecting
    pub candidate_count: usize,
    pub probe_attempts: u32,
    /// Per-request timeout for directory and probe requests
    pub timeout: Duration,
    /// Engine settings; `engine.streams` applies to the download
    pub engine: EngineConfig,
    /// Upload stream count; `None` derives it from the download speed
    pub upload_streams: Option<usize>,
    pub cancel: CancellationToken,
    pub events: Option<UnboundedSender<ProgressEvent>>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for RunConfig {
    fn from(config: &Config) -> Self {
        let mut sources = Vec::new();
        if let Some(path) = &config.servers_file {
            sources.push(DirectorySource::File(path.clone()));
        }
        if let Some(url) = &config.directory_url {
            sources.push(DirectorySource::Remote(url.clone()));
        }

        Self {
            sources,
            server_id: config.server_id,
            candidate_count: config.candidate_count,
            probe_attempts: config.probe_attempts,
            timeout: config.timeout(),
            engine: EngineConfig::from(config),
            upload_streams: config.stream_count,
            cancel: CancellationToken::new(),
            events: None,
        }
    }
}

/// Runs complete speed tests
pub struct SpeedTestRunner {
    config: RunConfig,
    directory: ServerDirectory,
    probe: LatencyProbe,
    selector: ServerSelector,
    aggregator: ResultAggregator,
    transports: TransportFactory,
    logger: Logger,
}

impl SpeedTestRunner {
    /// Runner talking HTTP to the configured directory and servers
    pub fn new(config: RunConfig, logger: Logger) -> Result<Self> {
        let clients = ClientFactory::new(config.timeout);
        let directory = ServerDirectory::new(config.sources.clone(), &clients, logger.clone())?;
        let probe = LatencyProbe::http(&clients, logger.clone())?.with_attempts(config.probe_attempts);
        let transports: TransportFactory = Arc::new(move |server: &ServerRecord| {
            let transport = HttpTransport::from_factory(&clients, server.clone())?;
            Ok(Arc::new(transport) as Arc<dyn StreamTransport>)
        });

        Ok(Self {
            config,
            directory,
            probe,
            selector: ServerSelector::new(),
            aggregator: ResultAggregator::new(),
            transports,
            logger: logger.named("RUNNER"),
        })
    }

    /// Replace the latency probe
    pub fn with_probe(mut self, probe: LatencyProbe) -> Self {
        self.probe = probe;
        self
    }

    /// Replace how stream transports are built
    pub fn with_transport_factory(mut self, transports: TransportFactory) -> Self {
        self.transports = transports;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run one complete speed test
    pub async fn run(&self) -> Result<SpeedTestReport> {
        let filter = self.config.server_id;

        let records = self
            .phase(Phase::Directory, self.directory.fetch(filter))
            .await??;
        if records.is_empty() {
            return Err(AppError::no_servers(filter));
        }

        let shortlist = nearest(&records, self.config.candidate_count.max(1));
        self.logger
            .info(&format!("Probing {} of {} server(s)", shortlist.len(), records.len()))
            .field("candidates", shortlist.iter().map(|r| r.id).collect::<Vec<_>>())
            .log()
            .await;

        let outcome = self.phase(Phase::Probe, self.probe.probe_all(&shortlist)).await?;
        if outcome.reachable.is_empty() {
            return Err(outcome
                .failures
                .into_iter()
                .next()
                .unwrap_or_else(|| AppError::no_servers(filter)));
        }

        let server = self.selector.select(&outcome.reachable)?;
        let measurement = outcome
            .measurements
            .into_iter()
            .find(|m| m.server_id == server.id)
            .ok_or_else(|| AppError::internal(format!("No latency measurement for server {}", server.id)))?;

        self.logger
            .info(&format!("Selected server {} {}", server.id, server.label()))
            .field("server_id", server.id)
            .field("host", server.address())
            .field("ping_ms", measurement.median_ms)
            .log()
            .await;

        let transport = (self.transports)(&server)?;
        let download = self.transfer(Direction::Download, self.config.engine.streams, &transport).await?;

        let upload = if download.cancelled {
            TransferResult::not_started(Direction::Upload, true)
        } else {
            let streams = self
                .config
                .upload_streams
                .unwrap_or_else(|| streams_for_history(Some(download.computed_speed_bps)));
            self.transfer(Direction::Upload, streams, &transport).await?
        };

        self.aggregator.aggregate(
            server,
            download,
            upload,
            measurement.median_ms,
            Some(measurement.jitter_ms),
            Utc::now(),
        )
    }

    /// First `limit` directory entries in directory order
    ///
    /// The listing ignores the server id filter.
    pub async fn available_servers(&self, limit: usize) -> Result<Vec<ServerRecord>> {
        let mut records = self.phase(Phase::Directory, self.directory.fetch(None)).await??;
        records.truncate(limit);
        Ok(records)
    }

    async fn transfer(
        &self,
        direction: Direction,
        streams: usize,
        transport: &Arc<dyn StreamTransport>,
    ) -> Result<TransferResult> {
        let config = self
            .config
            .engine
            .clone()
            .with_streams(streams.clamp(1, defaults::MAX_STREAMS));
        let engine = ThroughputEngine::new(config, self.logger.clone());
        engine
            .run(direction, transport.clone(), &self.config.cancel, self.config.events.clone())
            .await
    }

    /// Run `work` unless the caller cancels first
    async fn phase<T>(&self, phase: Phase, work: impl Future<Output = T>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.config.cancel.cancelled() => {
                self.logger
                    .warn(&format!("Cancelled during {}", phase))
                    .log()
                    .await;
                Err(AppError::cancelled(phase))
            }
            output = work => Ok(output),
        }
    }
}

/// Run one speed test with HTTP transports
pub async fn run_speed_test(config: RunConfig) -> Result<SpeedTestReport> {
    let logger = Logger::new("RUNNER");
    SpeedTestRunner::new(config, logger)?.run().await
}
