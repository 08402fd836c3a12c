//! Simulated workload configuration

use crate::types::config_keys;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Address the workload's HTTP surface binds to; `None` keeps it in-process
    pub bind_address: Option<String>,

    /// Maximum number of error log lines retained
    pub max_logs: usize,

    /// Configuration the workload boots with and remediation restores
    pub known_good: BTreeMap<String, String>,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            bind_address: Some("127.0.0.1:8080".to_string()),
            max_logs: 50,
            known_good: default_known_good(),
        }
    }
}

pub fn default_known_good() -> BTreeMap<String, String> {
    BTreeMap::from([
        (config_keys::DATABASE_URL.to_string(), "localhost:5432".to_string()),
        (config_keys::TIMEOUT.to_string(), "30s".to_string()),
        (config_keys::MAX_RETRIES.to_string(), "3".to_string()),
    ])
}

impl WorkloadConfig {
    /// Base URL for HTTP probes against the bound workload
    pub fn base_url(&self) -> Option<String> {
        self.bind_address.as_ref().map(|addr| format!("http://{}", addr))
    }
}
