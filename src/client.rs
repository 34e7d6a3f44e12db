//! HTTP client construction shared by the directory, the probe and the streams

use crate::error::{AppError, Result};
use reqwest::{Client, Response};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// User agent sent with every request
pub fn user_agent() -> String {
    format!("{}/{}", crate::PKG_NAME, crate::VERSION)
}

/// Builds reqwest clients for the different request profiles
#[derive(Debug, Clone)]
pub struct ClientFactory {
    request_timeout: Duration,
    connect_timeout: Duration,
}

impl ClientFactory {
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            request_timeout,
            connect_timeout: request_timeout.min(Duration::from_secs(5)),
        }
    }

    /// Client for short request/response exchanges (directory, latency)
    pub fn control_client(&self) -> Result<Client> {
        Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(user_agent())
            .build()
            .map_err(|e| AppError::network(format!("Failed to create HTTP client: {}", e)))
    }

    /// Client for long-running transfers; the engine bounds their duration
    pub fn transfer_client(&self) -> Result<Client> {
        Client::builder()
            .connect_timeout(self.connect_timeout)
            .pool_max_idle_per_host(crate::defaults::MAX_STREAMS)
            .tcp_nodelay(true)
            .user_agent(user_agent())
            .build()
            .map_err(|e| AppError::network(format!("Failed to create HTTP client: {}", e)))
    }
}

impl Default for ClientFactory {
    fn default() -> Self {
        Self::new(crate::defaults::DEFAULT_TIMEOUT)
    }
}

/// Turn non-2xx responses into errors
pub fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(AppError::network(format!("{} returned HTTP {}", response.url(), status)))
    }
}

/// Unique query value that defeats intermediate caches
pub fn cache_buster() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let millis = chrono::Utc::now().timestamp_millis();
    format!("{}.{}", millis, COUNTER.fetch_add(1, Ordering::Relaxed))
}
