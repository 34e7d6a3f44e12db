//! Server directory: where candidate measurement servers come from
//!
//! A directory is an ordered list of sources. Each source yields a batch of
//! server records; the batches are flattened in declared order and the first
//! occurrence of an id wins.

use crate::{
    client::{ensure_success, ClientFactory},
    defaults,
    error::{AppError, Result},
    logging::Logger,
    models::ServerRecord,
};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;

/// One place server records can be loaded from
#[derive(Debug, Clone, PartialEq)]
pub enum DirectorySource {
    /// JSON server list served over HTTP(S)
    Remote(String),
    /// JSON server list on disk
    File(PathBuf),
    /// Records supplied in-process
    Static(Vec<ServerRecord>),
}

impl DirectorySource {
    fn describe(&self) -> String {
        match self {
            DirectorySource::Remote(url) => url.clone(),
            DirectorySource::File(path) => path.display().to_string(),
            DirectorySource::Static(records) => format!("static list ({} servers)", records.len()),
        }
    }
}

/// Numbers that some directories send as strings
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Loose {
    Number(f64),
    Text(String),
}

impl Loose {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Loose::Number(n) => Some(*n),
            Loose::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Server object as it appears on the wire
#[derive(Debug, Clone, Deserialize)]
struct RawServer {
    id: Loose,
    #[serde(default)]
    host: Option<String>,
    url: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    sponsor: Option<String>,
    #[serde(default)]
    distance: Option<Loose>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DirectoryPayload {
    List(Vec<RawServer>),
    Wrapped { servers: Vec<RawServer> },
}

impl DirectoryPayload {
    fn into_servers(self) -> Vec<RawServer> {
        match self {
            DirectoryPayload::List(servers) => servers,
            DirectoryPayload::Wrapped { servers } => servers,
        }
    }
}

impl RawServer {
    fn into_record(self) -> std::result::Result<ServerRecord, String> {
        let id = self
            .id
            .as_f64()
            .filter(|id| id.fract() == 0.0 && *id >= 0.0 && *id <= u32::MAX as f64)
            .ok_or_else(|| format!("invalid server id {:?}", self.id))? as u32;

        let url = url::Url::parse(&self.url).map_err(|e| format!("server {}: invalid url '{}': {}", id, self.url, e))?;

        let (host, port) = match self.host.as_deref().filter(|h| !h.trim().is_empty()) {
            Some(host) => split_host_port(host.trim())
                .or_else(|| url.port_or_known_default().map(|port| (host.trim().to_string(), port)))
                .ok_or_else(|| format!("server {}: invalid host '{}'", id, host))?,
            None => {
                let host = url.host_str().ok_or_else(|| format!("server {}: url has no host", id))?;
                let port = url
                    .port_or_known_default()
                    .ok_or_else(|| format!("server {}: url has no port", id))?;
                (host.to_string(), port)
            }
        };

        Ok(ServerRecord {
            id,
            host,
            port,
            name: self.name,
            country: self.country,
            sponsor: self.sponsor.filter(|s| !s.is_empty()),
            url: self.url,
            distance_km: self.distance.and_then(|d| d.as_f64()).unwrap_or(f64::MAX),
            latency_ms: None,
        })
    }
}

/// Split `name:port`, leaving bare names (and IPv6 literals) to the caller
fn split_host_port(host: &str) -> Option<(String, u16)> {
    if host.starts_with('[') {
        let (name, rest) = host[1..].split_once(']')?;
        let port = rest.strip_prefix(':')?.parse().ok()?;
        return Some((name.to_string(), port));
    }
    let (name, port) = host.rsplit_once(':')?;
    if name.contains(':') {
        return None;
    }
    Some((name.to_string(), port.parse().ok()?))
}

/// Ordered collection of server sources
pub struct ServerDirectory {
    sources: Vec<DirectorySource>,
    client: Client,
    logger: Logger,
}

impl ServerDirectory {
    /// Create a directory over the given sources
    ///
    /// Fails fast when no source is declared or the HTTP client cannot be
    /// built, instead of failing later during `fetch`.
    pub fn new(sources: Vec<DirectorySource>, clients: &ClientFactory, logger: Logger) -> Result<Self> {
        if sources.is_empty() {
            return Err(AppError::directory("no server directory source configured"));
        }
        let client = clients
            .control_client()
            .map_err(|e| AppError::directory(format!("HTTP support unavailable: {}", e)))?;

        Ok(Self {
            sources,
            client,
            logger: logger.named("DIRECTORY"),
        })
    }

    pub fn sources(&self) -> &[DirectorySource] {
        &self.sources
    }

    /// Fetch every source and return the flattened list, optionally filtered by id
    ///
    /// An empty result is not an error; callers must check for it.
    pub async fn fetch(&self, filter: Option<u32>) -> Result<Vec<ServerRecord>> {
        let mut batches = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let batch = self.load(source, filter).await?;
            self.logger
                .debug(&format!("Loaded {} server(s) from {}", batch.len(), source.describe()))
                .field("source", source.describe())
                .field("count", batch.len())
                .log()
                .await;
            batches.push(batch);
        }

        let mut seen = HashSet::new();
        let mut records: Vec<ServerRecord> = batches
            .into_iter()
            .flatten()
            .filter(|record| seen.insert(record.id))
            .collect();

        if let Some(id) = filter {
            records.retain(|record| record.id == id);
        }

        Ok(records)
    }

    async fn load(&self, source: &DirectorySource, filter: Option<u32>) -> Result<Vec<ServerRecord>> {
        match source {
            DirectorySource::Static(records) => Ok(records.clone()),
            DirectorySource::File(path) => {
                let body = tokio::fs::read_to_string(path).await.map_err(|e| {
                    AppError::directory(format!("cannot read server list {}: {}", path.display(), e))
                })?;
                self.parse(&body, source).await
            }
            DirectorySource::Remote(url) => {
                let url = &remote_url(url, filter);
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| AppError::directory(format!("{}: {}", url, e)))?;
                let response = ensure_success(response).map_err(|e| AppError::directory(e.to_string()))?;
                let body = response
                    .text()
                    .await
                    .map_err(|e| AppError::directory(format!("{}: {}", url, e)))?;
                self.parse(&body, source).await
            }
        }
    }

    async fn parse(&self, body: &str, source: &DirectorySource) -> Result<Vec<ServerRecord>> {
        let payload: DirectoryPayload = serde_json::from_str(body).map_err(|e| {
            AppError::directory(format!("malformed server list from {}: {}", source.describe(), e))
        })?;

        let mut records = Vec::new();
        for raw in payload.into_servers() {
            match raw.into_record() {
                Ok(record) => records.push(record),
                Err(reason) => {
                    self.logger
                        .warn(&format!("Skipping directory entry: {}", reason))
                        .field("source", source.describe())
                        .log()
                        .await;
                }
            }
        }
        Ok(records)
    }
}

/// URL to request from a remote directory
///
/// Directories page their answer with a `limit` parameter sorted by
/// distance. An id lookup has to see past the nearest few, so a filtered
/// fetch widens the limit to `defaults::FILTERED_DIRECTORY_LIMIT`.
fn remote_url(url: &str, filter: Option<u32>) -> String {
    if filter.is_none() {
        return url.to_string();
    }
    let Ok(mut parsed) = url::Url::parse(url) else {
        return url.to_string();
    };
    if !parsed.query_pairs().any(|(key, _)| key == "limit") {
        return url.to_string();
    }

    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(key, value)| {
            let value = if key == "limit" {
                defaults::FILTERED_DIRECTORY_LIMIT.to_string()
            } else {
                value.into_owned()
            };
            (key.into_owned(), value)
        })
        .collect();
    parsed.query_pairs_mut().clear().extend_pairs(pairs);
    parsed.to_string()
}

/// The `count` records closest to the client, stable on equal distance
pub fn nearest(records: &[ServerRecord], count: usize) -> Vec<ServerRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    sorted.truncate(count);
    sorted
}
