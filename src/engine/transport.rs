//! Stream transports: how one stream moves bytes

use super::stream::StreamContext;
use crate::{
    client::{cache_buster, ensure_success, ClientFactory},
    defaults::{DOWNLOAD_SIZES, UPLOAD_CHUNK_BYTES, UPLOAD_REQUEST_BYTES},
    error::Result,
    models::ServerRecord,
    types::Direction,
};
use async_trait::async_trait;
use futures::StreamExt;
use rand::Rng;
use reqwest::{header::CONTENT_TYPE, Body, Client};
use std::sync::Arc;

/// One concurrent transfer connection
///
/// Implementations move data until the context's stop signal is raised,
/// reporting every chunk through [`StreamContext::record`]. Returning
/// `Ok` means the stream ended cleanly; `Err` marks it failed.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Server the stream talks to, for error context
    fn server_id(&self) -> u32;

    async fn run_stream(&self, direction: Direction, ctx: StreamContext) -> Result<()>;
}

/// Transfers over the speedtest HTTP endpoints of one server
pub struct HttpTransport {
    client: Client,
    server: ServerRecord,
    payload: Arc<Vec<u8>>,
}

impl HttpTransport {
    pub fn new(client: Client, server: ServerRecord) -> Self {
        Self::with_payload_size(client, server, UPLOAD_REQUEST_BYTES)
    }

    /// Use an upload body of `payload_size` bytes per request
    pub fn with_payload_size(client: Client, server: ServerRecord, payload_size: usize) -> Self {
        Self {
            client,
            server,
            payload: Arc::new(random_payload(payload_size)),
        }
    }

    /// Transport with a transfer client built by `clients`
    pub fn from_factory(clients: &ClientFactory, server: ServerRecord) -> Result<Self> {
        Ok(Self::new(clients.transfer_client()?, server))
    }

    pub fn server(&self) -> &ServerRecord {
        &self.server
    }

    async fn download(&self, ctx: StreamContext) -> Result<()> {
        // Offset the size rotation so streams do not request in lockstep
        let mut round = ctx.index();

        while !ctx.should_stop() {
            let size = DOWNLOAD_SIZES[round % DOWNLOAD_SIZES.len()];
            round += 1;

            let mut url = self.server.download_url(size)?;
            url.query_pairs_mut().append_pair("x", &cache_buster());

            let response = tokio::select! {
                response = self.client.get(url).send() => ensure_success(response?)?,
                _ = ctx.stopped() => return Ok(()),
            };

            let mut body = response.bytes_stream();
            loop {
                let chunk = tokio::select! {
                    chunk = body.next() => chunk,
                    _ = ctx.stopped() => return Ok(()),
                };
                match chunk {
                    Some(chunk) => {
                        if !ctx.record(chunk?.len() as u64) {
                            return Ok(());
                        }
                    }
                    None => break,
                }
            }
        }
        Ok(())
    }

    async fn upload(&self, ctx: StreamContext) -> Result<()> {
        while !ctx.should_stop() {
            let mut url = self.server.upload_url()?;
            url.query_pairs_mut().append_pair("x", &cache_buster());

            let request = self
                .client
                .post(url)
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(upload_body(self.payload.clone(), ctx.clone()))
                .send();

            tokio::select! {
                response = request => {
                    ensure_success(response?)?;
                }
                _ = ctx.stopped() => return Ok(()),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StreamTransport for HttpTransport {
    fn server_id(&self) -> u32 {
        self.server.id
    }

    async fn run_stream(&self, direction: Direction, ctx: StreamContext) -> Result<()> {
        match direction {
            Direction::Download => self.download(ctx).await,
            Direction::Upload => self.upload(ctx).await,
        }
    }
}

/// Incompressible bytes for upload bodies
pub fn random_payload(size: usize) -> Vec<u8> {
    let mut payload = vec![0u8; size];
    rand::rng().fill(&mut payload[..]);
    payload
}

/// Streamed request body that accounts each chunk as it is handed over
///
/// The body ends early once the stop signal is raised.
fn upload_body(payload: Arc<Vec<u8>>, ctx: StreamContext) -> Body {
    let chunks = futures::stream::unfold(0usize, move |offset| {
        let payload = payload.clone();
        let ctx = ctx.clone();
        async move {
            if offset >= payload.len() || ctx.should_stop() {
                return None;
            }
            let end = (offset + UPLOAD_CHUNK_BYTES).min(payload.len());
            let chunk = payload[offset..end].to_vec();
            ctx.record(chunk.len() as u64);
            Some((Ok::<_, std::io::Error>(chunk), end))
        }
    });
    Body::wrap_stream(chunks)
}
