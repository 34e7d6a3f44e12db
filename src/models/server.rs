//! Measurement server records

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// A candidate measurement server as listed by the directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerRecord {
    /// Directory-assigned server id
    pub id: u32,
    /// Host name without the port
    pub host: String,
    /// TCP port of the measurement endpoint
    pub port: u16,
    /// City or site name
    pub name: String,
    /// Country name
    pub country: String,
    /// Hosting sponsor, if the directory lists one
    #[serde(default)]
    pub sponsor: Option<String>,
    /// Upload endpoint; every other endpoint is derived from it
    pub url: String,
    /// Distance from the client in kilometres
    pub distance_km: f64,
    /// Median round trip, filled in after probing
    #[serde(default)]
    pub latency_ms: Option<f64>,
}

impl ServerRecord {
    /// Copy of this record with the probed latency assigned
    pub fn with_latency(&self, latency_ms: f64) -> Self {
        Self {
            latency_ms: Some(latency_ms),
            ..self.clone()
        }
    }

    /// `host:port` form used for display
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `name (country)` form used for display
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.country)
    }

    /// Directory all measurement files live in, with a trailing slash
    pub fn base_url(&self) -> Result<Url> {
        let upload = Url::parse(&self.url)
            .map_err(|e| AppError::parse(format!("Invalid URL for server {}: {}", self.id, e)))?;
        upload
            .join("./")
            .map_err(|e| AppError::parse(format!("Invalid URL for server {}: {}", self.id, e)))
    }

    /// Endpoint answered by the latency probe
    pub fn latency_url(&self) -> Result<Url> {
        Ok(self.base_url()?.join("latency.txt")?)
    }

    /// Download image of `size`x`size` pixels
    pub fn download_url(&self, size: u32) -> Result<Url> {
        Ok(self.base_url()?.join(&format!("random{}x{}.jpg", size, size))?)
    }

    /// Endpoint accepting upload bodies
    pub fn upload_url(&self) -> Result<Url> {
        Url::parse(&self.url).map_err(AppError::from)
    }
}

#[cfg(test)]
pub(crate) fn sample_server(id: u32, distance_km: f64) -> ServerRecord {
    ServerRecord {
        id,
        host: format!("speed{}.example.net", id),
        port: 8080,
        name: format!("City {}", id),
        country: "Testland".to_string(),
        sponsor: None,
        url: format!("http://speed{}.example.net:8080/speedtest/upload.php", id),
        distance_km,
        latency_ms: None,
    }
}
