//! Health probing of the service's HTTP endpoint.
//!
//! A probe is a single bounded request. Retry cadence belongs to whoever calls
//! it periodically, so failures are reported as [`HealthStatus::Unhealthy`]
//! rather than retried here.

use crate::config::ConfigError;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Health status of a service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum HealthStatus {
    /// Service is healthy
    Healthy,
    /// Service is unhealthy, with the reason
    Unhealthy(String),
}

impl HealthStatus {
    /// Returns true for [`HealthStatus::Healthy`]
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// Something that can tell whether the service answers at an address
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Probe `host:port` once
    async fn check(&self, host: &str, port: u16) -> HealthStatus;
}

/// URL probed for `host:port`, bracketing IPv6 literals
pub fn probe_url(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("http://[{}]:{}/", host, port)
    } else {
        format!("http://{}:{}/", host, port)
    }
}

/// Decide health from an HTTP answer
///
/// Only a status below 400 with a non-empty body counts as healthy.
/// The client follows redirects, so a 3xx seen here is one it could not
/// follow (no `Location`, or the hop limit reached); the service still answered.
pub fn classify(status: u16, body: &str) -> HealthStatus {
    if status >= 400 {
        HealthStatus::Unhealthy(format!("HTTP status {}", status))
    } else if body.trim().is_empty() {
        HealthStatus::Unhealthy(format!("empty response body (HTTP status {})", status))
    } else {
        HealthStatus::Healthy
    }
}

/// Probes with a plain HTTP GET
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpProbe {
    /// Create a probe whose requests give up after `timeout`
    ///
    /// Probes go straight to the unit, never through a configured proxy.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .map_err(|e| {
                ConfigError::ValidationError(format!("cannot build HTTP client: {}", e))
            })?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn check(&self, host: &str, port: u16) -> HealthStatus {
        let url = probe_url(host, port);
        let start = Instant::now();

        let response = match self.client.get(&url).timeout(self.timeout).send().await {
            Ok(response) => response,
            Err(e) => {
                let reason = if e.is_timeout() {
                    format!("no response within {:?}", self.timeout)
                } else {
                    format!("request failed: {}", e)
                };
                warn!("Health check of {} failed: {}", url, reason);
                return HealthStatus::Unhealthy(reason);
            }
        };

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Health check of {} could not read body: {}", url, e);
                return HealthStatus::Unhealthy(format!("failed to read response: {}", e));
            }
        };

        let health = classify(status, &body);
        match &health {
            HealthStatus::Healthy => debug!("Health check of {} passed in {:?}", url, start.elapsed()),
            HealthStatus::Unhealthy(reason) => warn!("Health check of {} failed: {}", url, reason),
        }
        health
    }
}
