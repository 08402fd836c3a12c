//! The managed workload and the ways the pipeline observes it
//!
//! [`Workload`] is the control surface remediation acts on; [`HealthProbe`]
//! is the observation surface the monitor and verification loop sample.
//! Probes are infallible by signature: any failure to reach or parse the
//! workload is itself reported as an unhealthy [`HealthSample`].

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

use crate::error::{VigilError, VigilResult};
use crate::types::{HealthSample, StatusSnapshot};

pub mod http_probe;
pub mod server;
pub mod simulated;

pub use http_probe::HttpProbe;
pub use simulated::SimulatedWorkload;

/// Control surface of the managed workload
#[async_trait]
pub trait Workload: Send + Sync {
    /// Typed snapshot of running state, configuration and recent logs
    async fn status(&self) -> StatusSnapshot;

    async fn start(&self) -> VigilResult<()>;

    async fn stop(&self) -> VigilResult<()>;

    async fn set_config(&self, key: &str, value: &str) -> VigilResult<()>;
}

/// Source of health samples
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self) -> HealthSample;
}

/// Faults the simulated workload can be driven into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Crash,
    Config,
    Resource,
    Dependency,
}

impl FaultKind {
    pub const ALL: [FaultKind; 4] = [
        FaultKind::Crash,
        FaultKind::Config,
        FaultKind::Resource,
        FaultKind::Dependency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::Crash => "crash",
            FaultKind::Config => "config",
            FaultKind::Resource => "resource",
            FaultKind::Dependency => "dependency",
        }
    }
}

impl FromStr for FaultKind {
    type Err = VigilError;

    fn from_str(s: &str) -> VigilResult<Self> {
        match s {
            "crash" | "SERVICE_DOWN" => Ok(FaultKind::Crash),
            "config" | "CONFIG_ERROR" => Ok(FaultKind::Config),
            "resource" | "RESOURCE_EXHAUSTION" => Ok(FaultKind::Resource),
            "dependency" | "DEPENDENCY_FAILURE" => Ok(FaultKind::Dependency),
            other => Err(VigilError::UnknownFault(other.to_string())),
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
