use thiserror::Error;

use crate::types::IncidentStatus;

#[derive(Error, Debug)]
pub enum VigilError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Storage operation '{operation}' failed")]
    Storage {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Workload already running")]
    WorkloadAlreadyRunning,

    #[error("Workload not running")]
    WorkloadNotRunning,

    #[error("Failed to start workload: {reason}")]
    WorkloadStartFailed { reason: String },

    #[error("Unknown fault kind: {0}")]
    UnknownFault(String),

    #[error("Diagnosis source error: {0}")]
    DiagnosisError(String),

    #[error("Invalid diagnosis response: {reason}")]
    InvalidDiagnosis { reason: String },

    #[error("Unsupported fix kind: {0}")]
    UnsupportedFixKind(String),

    #[error("Invalid state transition for incident {incident_id}: {from} -> {to}")]
    InvalidTransition {
        incident_id: String,
        from: IncidentStatus,
        to: IncidentStatus,
    },

    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

pub type VigilResult<T> = std::result::Result<T, VigilError>;

impl VigilError {
    /// True when the error came from a shutdown request rather than a fault.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, VigilError::Cancelled { .. })
    }
}
