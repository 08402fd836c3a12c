//! Configuration for the incident response pipeline
//!
//! Values are resolved in layers: built-in defaults, an optional TOML file,
//! then environment overrides. The binary applies CLI flags last.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{VigilError, VigilResult};

pub mod diagnosis;
pub mod monitor;
pub mod remediation;
pub mod workload;

pub use diagnosis::DiagnosisConfig;
pub use monitor::MonitorConfig;
pub use remediation::{RemediationConfig, VerificationConfig};
pub use workload::WorkloadConfig;

/// Persistent log location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("incident_memory.json"),
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VigilConfig {
    pub monitor: MonitorConfig,
    pub remediation: RemediationConfig,
    pub verification: VerificationConfig,
    pub workload: WorkloadConfig,
    pub diagnosis: DiagnosisConfig,
    pub storage: StorageConfig,
}

impl VigilConfig {
    /// Load defaults, an optional TOML file, then environment overrides
    pub fn load(path: Option<&Path>) -> VigilResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file; absent sections keep their defaults
    pub fn from_file(path: &Path) -> VigilResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            VigilError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Apply `VIGIL_*` (and `OPENAI_API_KEY`) environment overrides
    pub fn apply_env(&mut self) {
        self.monitor.apply_env();

        if let Ok(path) = std::env::var("VIGIL_STORE_PATH") {
            self.storage.path = PathBuf::from(path);
        }
        if let Ok(addr) = std::env::var("VIGIL_BIND_ADDRESS") {
            self.workload.bind_address = Some(addr);
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.is_empty() {
                self.diagnosis.api_key = Some(key);
            }
        }
    }

    pub fn validate(&self) -> VigilResult<()> {
        self.monitor.validate()?;
        self.verification.validate()?;
        Ok(())
    }

    /// Configuration with every delay shortened, for tests and demos
    pub fn fast() -> Self {
        let mut config = Self::default();
        config.monitor.check_interval = Duration::from_millis(50);
        config.monitor.probe_timeout = Duration::from_millis(500);
        config.remediation.settle_delay = Duration::from_millis(10);
        config.remediation.post_start_delay = Duration::from_millis(10);
        config.remediation.stabilization_delay = Duration::from_millis(20);
        config.verification.probe_spacing = Duration::from_millis(10);
        config.workload.bind_address = None;
        config
    }
}

pub(crate) fn parse_duration_secs_from_env(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}
