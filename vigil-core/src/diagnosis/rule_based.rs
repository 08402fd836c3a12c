use async_trait::async_trait;
use tracing::debug;

use super::{fallback_plan, DiagnosisRequest, DiagnosisResponse, DiagnosisSource};
use crate::error::VigilResult;

/// Offline diagnosis source that answers with the per-class fallback plan
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedDiagnosis;

impl RuleBasedDiagnosis {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DiagnosisSource for RuleBasedDiagnosis {
    fn name(&self) -> &str {
        "rules"
    }

    async fn diagnose(&self, request: &DiagnosisRequest) -> VigilResult<DiagnosisResponse> {
        debug!(incident_id = %request.incident_id, class = %request.class, "Rule-based diagnosis");
        let plan = fallback_plan(request.class);
        Ok(DiagnosisResponse {
            diagnosis: plan.diagnosis,
            fix_type: plan.fix_kind.to_string(),
            fix_steps: plan.steps,
            code: plan.code,
            confidence: plan.confidence,
        })
    }
}
