pub mod abstractions;
pub mod classification;
pub mod config;
pub mod diagnosis;
pub mod error;
pub mod fix_cache;
pub mod health_monitor;
pub mod orchestrator;
pub mod pipeline;
pub mod remediation_executor;
pub mod shutdown;
pub mod storage;
pub mod types;
pub mod verification;
pub mod workload;

pub use config::VigilConfig;
pub use error::{VigilError, VigilResult};
pub use types::{
    FixKind, HealthSample, Incident, IncidentClass, IncidentStatus, IncidentTrigger, Resolution,
    StatusSnapshot,
};
