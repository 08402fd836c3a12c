use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::HealthProbe;
use crate::abstractions::time::Clock;
use crate::error::VigilResult;
use crate::types::{HealthSample, StatusSnapshot};

/// Health probe over the workload's HTTP surface
///
/// Transport errors, timeouts and undecodable bodies all become unhealthy
/// samples so the monitor never has to handle a probe error.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    base_url: String,
    clock: Arc<dyn Clock>,
}

impl HttpProbe {
    pub fn new(base_url: &str, timeout: Duration, clock: Arc<dyn Clock>) -> VigilResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            clock,
        })
    }

    /// Fetch the workload's status snapshot
    pub async fn status(&self) -> VigilResult<StatusSnapshot> {
        let snapshot = self
            .client
            .get(format!("{}/status", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json::<StatusSnapshot>()
            .await?;
        Ok(snapshot)
    }

    /// Ask the workload to inject a fault; returns the server's reply text
    pub async fn trigger(&self, kind: &str) -> VigilResult<String> {
        let body = self
            .client
            .get(format!("{}/trigger-incident", self.base_url))
            .query(&[("type", kind)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn probe(&self) -> HealthSample {
        let url = format!("{}/health", self.base_url);
        let resp = match self.client.get(&url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                debug!("Health probe transport error: {}", e);
                return HealthSample::unhealthy(
                    self.clock.now(),
                    format!("Health check failed: {}", e),
                    0,
                );
            }
        };

        let status_code = resp.status().as_u16();
        match resp.json::<HealthSample>().await {
            Ok(mut sample) => {
                sample.status_code = status_code;
                sample
            }
            Err(e) => {
                debug!("Health probe decode error: {}", e);
                HealthSample::unhealthy(
                    self.clock.now(),
                    "Failed to parse health response",
                    status_code,
                )
            }
        }
    }
}
