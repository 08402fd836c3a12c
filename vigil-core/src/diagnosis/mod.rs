//! Diagnosis sources and remediation plans
//!
//! A [`DiagnosisSource`] turns an incident description into a raw
//! [`DiagnosisResponse`]. Responses are untrusted: [`DiagnosisResponse::validate`]
//! converts them into a typed [`RemediationPlan`] or rejects them, and any
//! rejection or source error falls back to the deterministic per-class plan
//! from [`fallback_plan`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{info, warn};

use crate::error::{VigilError, VigilResult};
use crate::types::{FixKind, Incident, IncidentClass, Resolution};

pub mod openai;
pub mod rule_based;

pub use openai::OpenAiDiagnosis;
pub use rule_based::RuleBasedDiagnosis;

/// Everything a diagnosis source gets to see about an incident
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosisRequest {
    pub incident_id: String,
    pub class: IncidentClass,
    pub detected_at: DateTime<Utc>,
    pub symptoms: Vec<String>,
    pub logs: Vec<String>,
    pub configuration: BTreeMap<String, String>,
}

impl DiagnosisRequest {
    pub fn for_incident(incident: &Incident, configuration: BTreeMap<String, String>) -> Self {
        Self {
            incident_id: incident.id.clone(),
            class: incident.class,
            detected_at: incident.detected_at,
            symptoms: incident.symptoms.clone(),
            logs: incident.logs.clone(),
            configuration,
        }
    }
}

/// Unvalidated reply from a diagnosis source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisResponse {
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub fix_type: String,
    #[serde(default)]
    pub fix_steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl DiagnosisResponse {
    /// Check the response against the plan contract
    pub fn validate(self) -> VigilResult<RemediationPlan> {
        if self.diagnosis.trim().is_empty() {
            return Err(invalid("missing diagnosis"));
        }
        if self.fix_type.trim().is_empty() {
            return Err(invalid("missing fix_type"));
        }
        let fix_kind = self.fix_type.trim().parse::<FixKind>()?;
        if self.fix_steps.is_empty() {
            return Err(invalid("missing fix_steps"));
        }
        if let Some(confidence) = self.confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(invalid(&format!("confidence {} outside [0, 1]", confidence)));
            }
        }

        Ok(RemediationPlan {
            diagnosis: self.diagnosis,
            fix_kind,
            steps: self.fix_steps,
            code: self.code.filter(|code| !code.trim().is_empty()),
            confidence: self.confidence,
        })
    }
}

fn invalid(reason: &str) -> VigilError {
    VigilError::InvalidDiagnosis {
        reason: reason.to_string(),
    }
}

/// A validated plan the executor can carry out
#[derive(Debug, Clone, PartialEq)]
pub struct RemediationPlan {
    pub diagnosis: String,
    pub fix_kind: FixKind,
    pub steps: Vec<String>,
    pub code: Option<String>,
    pub confidence: Option<f64>,
}

impl RemediationPlan {
    fn new(diagnosis: &str, fix_kind: FixKind, steps: &[&str], confidence: f64) -> Self {
        Self {
            diagnosis: diagnosis.to_string(),
            fix_kind,
            steps: steps.iter().map(|s| s.to_string()).collect(),
            code: None,
            confidence: Some(confidence),
        }
    }

    /// Record of this plan having been applied
    pub fn to_resolution(&self, success: bool) -> Resolution {
        Resolution {
            fix_kind: self.fix_kind,
            description: self.diagnosis.clone(),
            steps: self.steps.clone(),
            code: self.code.clone(),
            success,
        }
    }

    /// Plan that replays a previously learned fix
    pub fn from_resolution(resolution: &Resolution) -> Self {
        Self {
            diagnosis: resolution.description.clone(),
            fix_kind: resolution.fix_kind,
            steps: resolution.steps.clone(),
            code: resolution.code.clone(),
            confidence: None,
        }
    }
}

/// Where a plan came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanOrigin {
    Source,
    Fallback,
}

impl fmt::Display for PlanOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanOrigin::Source => f.write_str("diagnosis source"),
            PlanOrigin::Fallback => f.write_str("fallback rules"),
        }
    }
}

#[async_trait]
pub trait DiagnosisSource: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    async fn diagnose(&self, request: &DiagnosisRequest) -> VigilResult<DiagnosisResponse>;
}

/// Ask `source` for a plan, falling back to the per-class rules on any
/// error or invalid response. Never fails.
pub async fn select_plan(
    source: &dyn DiagnosisSource,
    request: &DiagnosisRequest,
) -> (RemediationPlan, PlanOrigin) {
    let response = match source.diagnose(request).await {
        Ok(response) => response,
        Err(e) => {
            warn!(
                incident_id = %request.incident_id,
                "Diagnosis via {} failed: {}; using fallback plan",
                source.name(),
                e
            );
            return (fallback_plan(request.class), PlanOrigin::Fallback);
        }
    };

    match response.validate() {
        Ok(plan) => {
            info!(
                incident_id = %request.incident_id,
                fix_kind = %plan.fix_kind,
                "Diagnosis via {}: {}",
                source.name(),
                plan.diagnosis
            );
            (plan, PlanOrigin::Source)
        }
        Err(e) => {
            warn!(
                incident_id = %request.incident_id,
                "Rejected response from {}: {}; using fallback plan",
                source.name(),
                e
            );
            (fallback_plan(request.class), PlanOrigin::Fallback)
        }
    }
}

/// Deterministic plan for each incident class
pub fn fallback_plan(class: IncidentClass) -> RemediationPlan {
    match class {
        IncidentClass::ServiceDown => RemediationPlan::new(
            "Service process has crashed or stopped responding",
            FixKind::Restart,
            &["Restart the service"],
            0.9,
        ),
        IncidentClass::ConfigError => RemediationPlan::new(
            "Configuration contains invalid values",
            FixKind::Config,
            &[
                "Restore database_url to 'localhost:5432'",
                "Reset timeout to '30s'",
                "Restart service to apply changes",
            ],
            0.85,
        ),
        IncidentClass::DependencyFailure => RemediationPlan::new(
            "Cannot connect to database, dependency unreachable",
            FixKind::Config,
            &[
                "Update database_url to valid host",
                "Verify database is running",
                "Restart service to reconnect",
            ],
            0.8,
        ),
        IncidentClass::ResourceExhaustion => RemediationPlan::new(
            "Resource exhaustion detected, port may be blocked or memory full",
            FixKind::Restart,
            &[
                "Stop the service",
                "Clear any blocked resources",
                "Restart service on clean port",
            ],
            0.75,
        ),
    }
}
