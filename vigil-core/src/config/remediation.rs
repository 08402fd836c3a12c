//! Remediation and verification timing

use crate::error::{VigilError, VigilResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delays used while applying a remediation plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemediationConfig {
    /// Pause between stopping and starting the workload
    #[serde(with = "humantime_serde")]
    pub settle_delay: Duration,

    /// Pause after a successful start so the workload can come up
    #[serde(with = "humantime_serde")]
    pub post_start_delay: Duration,

    /// Wait between a diagnosed fix and its verification
    #[serde(with = "humantime_serde")]
    pub stabilization_delay: Duration,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(500),
            post_start_delay: Duration::from_secs(1),
            stabilization_delay: Duration::from_secs(2),
        }
    }
}

/// Post-fix confirmation probes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Number of consecutive passing probes required
    pub probes: u32,

    /// Spacing between probes
    #[serde(with = "humantime_serde")]
    pub probe_spacing: Duration,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            probes: 3,
            probe_spacing: Duration::from_secs(1),
        }
    }
}

impl VerificationConfig {
    pub fn validate(&self) -> VigilResult<()> {
        if self.probes == 0 {
            return Err(VigilError::InvalidConfiguration {
                message: "verification.probes must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
