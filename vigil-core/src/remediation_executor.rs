//! Applies remediation plans to the managed workload
//!
//! Every fix ends in a restart: config fixes restore recognized settings
//! first, code fixes surface the proposed patch for review first. A restart
//! is stop, settle, start, then a short post-start pause; a failing stop
//! (typically "not running") is tolerated, a failing start is not.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{info, warn};

use crate::abstractions::time::Clock;
use crate::config::RemediationConfig;
use crate::diagnosis::RemediationPlan;
use crate::error::{VigilError, VigilResult};
use crate::types::{config_keys, FixKind, Resolution};
use crate::workload::Workload;

/// Phrases that identify each restorable setting in a free-text step
const SETTING_VOCABULARY: [(&str, &[&str]); 3] = [
    (
        config_keys::DATABASE_URL,
        &["database_url", "database url", "dependency url", "db url"],
    ),
    (config_keys::TIMEOUT, &["timeout"]),
    (
        config_keys::MAX_RETRIES,
        &["max_retries", "max retries", "retries", "retry count"],
    ),
];

/// Settings a config step refers to, in vocabulary order
pub fn recognized_settings(step: &str) -> Vec<&'static str> {
    let step = step.to_lowercase();
    SETTING_VOCABULARY
        .iter()
        .filter(|(_, phrases)| phrases.iter().any(|phrase| step.contains(phrase)))
        .map(|(key, _)| *key)
        .collect()
}

pub struct RemediationExecutor {
    workload: Arc<dyn Workload>,
    clock: Arc<dyn Clock>,
    config: RemediationConfig,
    known_good: BTreeMap<String, String>,
}

impl RemediationExecutor {
    pub fn new(
        workload: Arc<dyn Workload>,
        clock: Arc<dyn Clock>,
        config: RemediationConfig,
        known_good: BTreeMap<String, String>,
    ) -> Self {
        Self {
            workload,
            clock,
            config,
            known_good,
        }
    }

    /// Apply a plan, returning the resolution to attach on success
    pub async fn execute(&self, incident_id: &str, plan: &RemediationPlan) -> VigilResult<Resolution> {
        info!(
            incident_id,
            fix_kind = %plan.fix_kind,
            steps = plan.steps.len(),
            "Applying remediation"
        );

        match plan.fix_kind {
            FixKind::Restart => self.restart().await?,
            FixKind::Config => self.apply_config(incident_id, &plan.steps).await?,
            FixKind::Code => self.apply_code(incident_id, plan.code.as_deref()).await?,
        }

        info!(incident_id, "Remediation applied");
        Ok(plan.to_resolution(true))
    }

    /// Replay a previously learned fix
    pub async fn apply_cached(&self, incident_id: &str, resolution: &Resolution) -> VigilResult<Resolution> {
        info!(incident_id, fix_kind = %resolution.fix_kind, "Replaying learned fix");
        self.execute(incident_id, &RemediationPlan::from_resolution(resolution))
            .await
    }

    /// Stop, settle, start, then let the workload come up
    pub async fn restart(&self) -> VigilResult<()> {
        if let Err(e) = self.workload.stop().await {
            warn!("Stop before restart failed (continuing): {}", e);
        }
        self.clock.sleep(self.config.settle_delay).await;

        self.workload
            .start()
            .await
            .map_err(|e| VigilError::WorkloadStartFailed {
                reason: e.to_string(),
            })?;
        self.clock.sleep(self.config.post_start_delay).await;
        Ok(())
    }

    async fn apply_config(&self, incident_id: &str, steps: &[String]) -> VigilResult<()> {
        let mut restored = BTreeSet::new();
        for (i, step) in steps.iter().enumerate() {
            let settings = recognized_settings(step);
            if settings.is_empty() {
                info!(incident_id, "Step {}: {} (no setting to restore)", i + 1, step);
                continue;
            }
            for key in settings {
                if !restored.insert(key) {
                    continue;
                }
                match self.known_good.get(key) {
                    Some(value) => {
                        info!(incident_id, "Step {}: restoring {} = {}", i + 1, key, value);
                        self.workload.set_config(key, value).await?;
                    }
                    None => warn!(incident_id, "No known-good value for {}", key),
                }
            }
        }

        if restored.is_empty() {
            warn!(incident_id, "Config fix named no recognized settings; restarting only");
        }
        self.restart().await
    }

    async fn apply_code(&self, incident_id: &str, code: Option<&str>) -> VigilResult<()> {
        match code {
            Some(code) => {
                warn!(incident_id, "Proposed code change requires review:");
                warn!("{}", "-".repeat(60));
                for line in code.lines() {
                    warn!("{}", line);
                }
                warn!("{}", "-".repeat(60));
            }
            None => warn!(incident_id, "Code fix proposed without a patch"),
        }
        self.restart().await
    }
}
