//! Health probes.
//!
//! A probe answers one question: did the dependency respond with a 2xx?
//! Errors, timeouts and non-2xx statuses all count as unhealthy and are
//! logged here; nothing propagates to callers.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio::time;

/// Fixed deadline for a single probe request.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(5_000);

#[async_trait]
pub trait HealthProbe: Send + Sync + fmt::Debug {
    /// Probe `target`, returning true for a healthy response.
    async fn check(&self, target: &str) -> bool;
}

/// Plain `GET` probe over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("breaker-guard-health-check")
            .pool_max_idle_per_host(0)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client for health probes");
                reqwest::Client::new()
            });
        Self { client, timeout }
    }
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn check(&self, target: &str) -> bool {
        let response_future = self.client.get(target).send();

        match time::timeout(self.timeout, response_future).await {
            Ok(Ok(response)) => {
                let success = response.status().is_success();
                if !success {
                    tracing::warn!(target = %target, status = %response.status(), "Health check failed: non-success status");
                }
                success
            }
            Ok(Err(e)) => {
                tracing::warn!(target = %target, error = %e, "Health check failed: connection error");
                false
            }
            Err(_) => {
                tracing::warn!(target = %target, timeout_ms = self.timeout.as_millis() as u64, "Health check failed: timeout");
                false
            }
        }
    }
}
