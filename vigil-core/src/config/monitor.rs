//! Health monitor configuration

use super::parse_duration_secs_from_env;
use crate::error::{VigilError, VigilResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Health sampling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Interval between health samples
    #[serde(with = "humantime_serde")]
    pub check_interval: Duration,

    /// Timeout for a single outbound probe
    #[serde(with = "humantime_serde")]
    pub probe_timeout: Duration,

    /// Capacity of the incident event channel
    pub channel_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(3),
            probe_timeout: Duration::from_secs(5),
            channel_capacity: 10,
        }
    }
}

impl MonitorConfig {
    pub fn apply_env(&mut self) {
        self.check_interval = parse_duration_secs_from_env("VIGIL_CHECK_INTERVAL_SECS", self.check_interval);
        self.probe_timeout = parse_duration_secs_from_env("VIGIL_PROBE_TIMEOUT_SECS", self.probe_timeout);
    }

    pub fn validate(&self) -> VigilResult<()> {
        if self.check_interval.is_zero() {
            return Err(VigilError::InvalidConfiguration {
                message: "monitor.check_interval must be non-zero".to_string(),
            });
        }
        if self.probe_timeout.is_zero() {
            return Err(VigilError::InvalidConfiguration {
                message: "monitor.probe_timeout must be non-zero".to_string(),
            });
        }
        if self.channel_capacity == 0 {
            return Err(VigilError::InvalidConfiguration {
                message: "monitor.channel_capacity must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
