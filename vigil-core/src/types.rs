//! Core data model shared by the detection, remediation and learning pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{VigilError, VigilResult};

/// Well-known configuration keys on the managed workload
pub mod config_keys {
    pub const DATABASE_URL: &str = "database_url";
    pub const TIMEOUT: &str = "timeout";
    pub const MAX_RETRIES: &str = "max_retries";
}

/// A single observation of the workload's health
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSample {
    pub healthy: bool,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    #[serde(default)]
    pub status_code: u16,
}

impl HealthSample {
    pub fn healthy(timestamp: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            healthy: true,
            timestamp,
            message: message.into(),
            status_code: 200,
        }
    }

    pub fn unhealthy(timestamp: DateTime<Utc>, message: impl Into<String>, status_code: u16) -> Self {
        Self {
            healthy: false,
            timestamp,
            message: message.into(),
            status_code,
        }
    }
}

/// Taxonomy bucket assigned by classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentClass {
    ServiceDown,
    ConfigError,
    ResourceExhaustion,
    DependencyFailure,
}

impl IncidentClass {
    pub const ALL: [IncidentClass; 4] = [
        IncidentClass::ServiceDown,
        IncidentClass::ConfigError,
        IncidentClass::ResourceExhaustion,
        IncidentClass::DependencyFailure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentClass::ServiceDown => "SERVICE_DOWN",
            IncidentClass::ConfigError => "CONFIG_ERROR",
            IncidentClass::ResourceExhaustion => "RESOURCE_EXHAUSTION",
            IncidentClass::DependencyFailure => "DEPENDENCY_FAILURE",
        }
    }
}

impl Default for IncidentClass {
    fn default() -> Self {
        IncidentClass::ServiceDown
    }
}

impl fmt::Display for IncidentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of an incident
///
/// Statuses only ever move forward: `Detected → Analyzing → Fixing →
/// {Resolved | Failed}`. Stages may be skipped (a cached fix goes straight
/// from `Detected` to `Resolved`) but never revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentStatus {
    Detected,
    Analyzing,
    Fixing,
    Resolved,
    Failed,
}

impl IncidentStatus {
    fn rank(&self) -> u8 {
        match self {
            IncidentStatus::Detected => 0,
            IncidentStatus::Analyzing => 1,
            IncidentStatus::Fixing => 2,
            IncidentStatus::Resolved | IncidentStatus::Failed => 3,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, IncidentStatus::Resolved | IncidentStatus::Failed)
    }

    pub fn can_transition_to(&self, next: IncidentStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IncidentStatus::Detected => "DETECTED",
            IncidentStatus::Analyzing => "ANALYZING",
            IncidentStatus::Fixing => "FIXING",
            IncidentStatus::Resolved => "RESOLVED",
            IncidentStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Kind of remediation a plan applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixKind {
    Restart,
    Config,
    Code,
}

impl FixKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FixKind::Restart => "restart",
            FixKind::Config => "config",
            FixKind::Code => "code",
        }
    }
}

impl FromStr for FixKind {
    type Err = VigilError;

    fn from_str(s: &str) -> VigilResult<Self> {
        match s {
            "restart" => Ok(FixKind::Restart),
            "config" => Ok(FixKind::Config),
            "code" => Ok(FixKind::Code),
            other => Err(VigilError::UnsupportedFixKind(other.to_string())),
        }
    }
}

impl fmt::Display for FixKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an incident was (or was attempted to be) fixed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub fix_kind: FixKind,
    pub description: String,
    pub steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub success: bool,
}

/// A detected incident and everything learned while handling it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    pub class: IncidentClass,
    pub status: IncidentStatus,
    pub detected_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    #[serde(default)]
    pub used_cached_fix: bool,
}

impl Incident {
    /// New incident in `Detected`; the class is refined by classification.
    pub fn detected(trigger: &IncidentTrigger) -> Self {
        Self {
            id: trigger.incident_id.clone(),
            class: IncidentClass::default(),
            status: IncidentStatus::Detected,
            detected_at: trigger.detected_at,
            resolved_at: None,
            symptoms: Vec::new(),
            logs: Vec::new(),
            diagnosis: None,
            resolution: None,
            used_cached_fix: false,
        }
    }

    /// Move the incident forward, stamping `resolved_at` on resolution.
    pub fn advance(&mut self, next: IncidentStatus, now: DateTime<Utc>) -> VigilResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(VigilError::InvalidTransition {
                incident_id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next == IncidentStatus::Resolved {
            self.resolved_at = Some(now);
        }
        Ok(())
    }
}

/// Event emitted by the health monitor on a healthy → unhealthy edge
#[derive(Debug, Clone, PartialEq)]
pub struct IncidentTrigger {
    pub incident_id: String,
    pub detected_at: DateTime<Utc>,
    pub sample: HealthSample,
}

impl IncidentTrigger {
    pub fn new(sample: HealthSample) -> Self {
        Self {
            incident_id: uuid::Uuid::new_v4().to_string(),
            detected_at: sample.timestamp,
            sample,
        }
    }
}

/// Typed status snapshot exposed by the workload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub running: bool,
    pub healthy: bool,
    #[serde(default)]
    pub config: BTreeMap<String, String>,
    #[serde(default)]
    pub recent_logs: Vec<String>,
}

impl StatusSnapshot {
    pub fn dependency_url(&self) -> Option<&str> {
        self.config.get(config_keys::DATABASE_URL).map(String::as_str)
    }

    pub fn timeout(&self) -> Option<&str> {
        self.config.get(config_keys::TIMEOUT).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trigger() -> IncidentTrigger {
        IncidentTrigger::new(HealthSample::unhealthy(Utc::now(), "down", 503))
    }

    #[test]
    fn test_status_only_moves_forward() {
        let mut incident = Incident::detected(&trigger());
        let now = Utc::now();

        incident.advance(IncidentStatus::Analyzing, now).unwrap();
        incident.advance(IncidentStatus::Fixing, now).unwrap();
        assert!(incident.advance(IncidentStatus::Analyzing, now).is_err());

        incident.advance(IncidentStatus::Resolved, now).unwrap();
        assert_eq!(incident.resolved_at, Some(now));
        assert!(incident.advance(IncidentStatus::Failed, now).is_err());
    }

    #[test]
    fn test_cached_path_may_skip_stages() {
        let mut incident = Incident::detected(&trigger());
        assert!(incident.advance(IncidentStatus::Resolved, Utc::now()).is_ok());
    }

    #[test]
    fn test_self_transition_rejected() {
        let mut incident = Incident::detected(&trigger());
        let err = incident.advance(IncidentStatus::Detected, Utc::now()).unwrap_err();
        assert!(matches!(err, VigilError::InvalidTransition { .. }));
    }

    #[test]
    fn test_fix_kind_parsing() {
        assert_eq!("restart".parse::<FixKind>().unwrap(), FixKind::Restart);
        assert_eq!("code".parse::<FixKind>().unwrap(), FixKind::Code);
        assert!(matches!(
            "reboot".parse::<FixKind>(),
            Err(VigilError::UnsupportedFixKind(kind)) if kind == "reboot"
        ));
    }

    #[test]
    fn test_class_serializes_screaming_snake() {
        let json = serde_json::to_string(&IncidentClass::ResourceExhaustion).unwrap();
        assert_eq!(json, "\"RESOURCE_EXHAUSTION\"");
    }

    #[test]
    fn test_trigger_ids_are_unique() {
        assert_ne!(trigger().incident_id, trigger().incident_id);
    }
}
