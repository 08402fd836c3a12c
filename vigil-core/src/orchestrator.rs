//! Incident lifecycle orchestration
//!
//! Consumes incident triggers one at a time and drives each incident through
//! `Detected → Analyzing → Fixing → {Resolved | Failed}`:
//!
//! 1. record the incident, then classify it from a workload status snapshot
//! 2. if a learned fix exists for the class, replay and verify it; a verified
//!    replay resolves the incident without consulting the diagnosis source
//! 3. otherwise (or if the replay fails) ask the diagnosis source for a plan,
//!    falling back to the per-class rules when it cannot provide a valid one
//! 4. apply the plan, wait for the workload to stabilize, verify, and learn
//!    the fix on success
//!
//! Every status change is persisted best-effort: a storage failure is logged
//! and processing continues.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::abstractions::time::Clock;
use crate::classification::classify;
use crate::config::VigilConfig;
use crate::diagnosis::{select_plan, DiagnosisRequest, DiagnosisSource};
use crate::error::{VigilError, VigilResult};
use crate::remediation_executor::RemediationExecutor;
use crate::shutdown::ShutdownSignal;
use crate::storage::IncidentStore;
use crate::types::{Incident, IncidentStatus, IncidentTrigger, Resolution};
use crate::verification::VerificationLoop;
use crate::workload::{HealthProbe, Workload};

/// Collaborators the orchestrator coordinates
#[derive(Clone)]
pub struct OrchestratorDeps {
    pub workload: Arc<dyn Workload>,
    pub probe: Arc<dyn HealthProbe>,
    pub diagnosis: Arc<dyn DiagnosisSource>,
    pub store: Arc<IncidentStore>,
    pub clock: Arc<dyn Clock>,
}

pub struct IncidentOrchestrator {
    workload: Arc<dyn Workload>,
    diagnosis: Arc<dyn DiagnosisSource>,
    store: Arc<IncidentStore>,
    clock: Arc<dyn Clock>,
    executor: RemediationExecutor,
    verifier: VerificationLoop,
    stabilization_delay: Duration,
}

impl IncidentOrchestrator {
    pub fn new(config: &VigilConfig, deps: OrchestratorDeps) -> Self {
        let executor = RemediationExecutor::new(
            deps.workload.clone(),
            deps.clock.clone(),
            config.remediation.clone(),
            config.workload.known_good.clone(),
        );
        let verifier = VerificationLoop::new(
            deps.probe.clone(),
            deps.clock.clone(),
            config.verification.clone(),
        );
        Self {
            workload: deps.workload,
            diagnosis: deps.diagnosis,
            store: deps.store,
            clock: deps.clock,
            executor,
            verifier,
            stabilization_delay: config.remediation.stabilization_delay,
        }
    }

    pub fn store(&self) -> &Arc<IncidentStore> {
        &self.store
    }

    /// Process triggers sequentially until shutdown or the channel closes
    pub async fn run(&self, mut events: mpsc::Receiver<IncidentTrigger>, shutdown: ShutdownSignal) {
        info!("Incident orchestrator started");
        let mut signal = shutdown.clone();

        loop {
            let trigger = tokio::select! {
                biased;
                _ = signal.wait() => break,
                event = events.recv() => match event {
                    Some(trigger) => trigger,
                    None => break,
                },
            };

            match self.process(trigger, &shutdown).await {
                Ok(incident) => info!(
                    incident_id = %incident.id,
                    class = %incident.class,
                    status = %incident.status,
                    used_cached_fix = incident.used_cached_fix,
                    "Incident processing finished"
                ),
                Err(e) if e.is_cancelled() => {
                    info!("Incident processing interrupted by shutdown");
                    break;
                }
                Err(e) => error!("Incident processing error: {}", e),
            }
        }

        info!("Incident orchestrator stopped");
    }

    /// Drive one incident to a terminal state
    ///
    /// Returns the incident as last persisted. Remediation failures end in
    /// `Failed` and are not errors; only cancellation and state machine
    /// violations are.
    pub async fn process(
        &self,
        trigger: IncidentTrigger,
        shutdown: &ShutdownSignal,
    ) -> VigilResult<Incident> {
        let mut incident = Incident::detected(&trigger);
        info!(incident_id = %incident.id, "Processing incident: {}", trigger.sample.message);
        self.persist(&incident).await;

        let snapshot = shutdown
            .run_until("status snapshot", self.workload.status())
            .await?;
        let classification = classify(&snapshot, &trigger.sample);
        incident.class = classification.class;
        incident.symptoms = classification.symptoms;
        incident.logs = snapshot.recent_logs.clone();
        info!(incident_id = %incident.id, class = %incident.class, "Incident classified");
        self.persist(&incident).await;

        if let Some(cached) = self.store.fixes().lookup(incident.class) {
            incident.used_cached_fix = true;
            if self.replay_cached(&mut incident, &cached, shutdown).await? {
                return Ok(incident);
            }
            warn!(
                incident_id = %incident.id,
                "Learned fix for {} did not hold, falling back to diagnosis",
                incident.class
            );
        }

        incident.advance(IncidentStatus::Analyzing, self.clock.now())?;
        self.persist(&incident).await;

        let request = DiagnosisRequest::for_incident(&incident, snapshot.config);
        let (plan, origin) = shutdown
            .run_until("diagnosis", select_plan(self.diagnosis.as_ref(), &request))
            .await?;
        info!(incident_id = %incident.id, "Remediation plan from {}: {}", origin, plan.diagnosis);
        incident.diagnosis = Some(plan.diagnosis.clone());

        incident.advance(IncidentStatus::Fixing, self.clock.now())?;
        self.persist(&incident).await;

        let resolution = match shutdown
            .run_until("remediation", self.executor.execute(&incident.id, &plan))
            .await?
        {
            Ok(resolution) => resolution,
            Err(e) => {
                error!(incident_id = %incident.id, "Remediation failed: {}", e);
                incident.advance(IncidentStatus::Failed, self.clock.now())?;
                self.persist(&incident).await;
                return Ok(incident);
            }
        };

        shutdown
            .run_until("stabilization", self.clock.sleep(self.stabilization_delay))
            .await?;
        let report = self.verifier.verify(shutdown).await?;

        if report.passed {
            incident.resolution = Some(resolution.clone());
            incident.advance(IncidentStatus::Resolved, self.clock.now())?;
            self.persist(&incident).await;
            self.log_resolved(&incident);
            let class = incident.class;
            let learned = self
                .write_store(move |store| store.learn_fix(class, resolution))
                .await;
            if let Err(e) = learned {
                warn!(incident_id = %incident.id, "Failed to persist learned fix: {}", e);
            }
        } else {
            warn!(
                incident_id = %incident.id,
                "Verification failed after {} probe(s)",
                report.probes_run
            );
            incident.resolution = Some(Resolution {
                success: false,
                ..resolution
            });
            incident.advance(IncidentStatus::Failed, self.clock.now())?;
            self.persist(&incident).await;
        }

        Ok(incident)
    }

    /// Replay a learned fix; true if it resolved the incident
    async fn replay_cached(
        &self,
        incident: &mut Incident,
        cached: &Resolution,
        shutdown: &ShutdownSignal,
    ) -> VigilResult<bool> {
        info!(
            incident_id = %incident.id,
            fix_kind = %cached.fix_kind,
            "Found learned fix for {}",
            incident.class
        );

        let applied = shutdown
            .run_until("cached remediation", self.executor.apply_cached(&incident.id, cached))
            .await?;
        if let Err(e) = applied {
            warn!(incident_id = %incident.id, "Learned fix could not be applied: {}", e);
            return Ok(false);
        }

        let report = self.verifier.verify(shutdown).await?;
        if !report.passed {
            return Ok(false);
        }

        incident.resolution = Some(cached.clone());
        incident.advance(IncidentStatus::Resolved, self.clock.now())?;
        self.persist(incident).await;
        self.log_resolved(incident);
        Ok(true)
    }

    /// Store writes fsync and rename, so they run on the blocking pool
    async fn write_store<F>(&self, write: F) -> VigilResult<()>
    where
        F: FnOnce(&IncidentStore) -> VigilResult<()> + Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || write(&store))
            .await
            .map_err(|e| VigilError::Internal {
                message: format!("Store write task failed: {}", e),
            })?
    }

    async fn persist(&self, incident: &Incident) {
        let record = incident.clone();
        let written = self
            .write_store(move |store| store.record_incident(&record))
            .await;
        if let Err(e) = written {
            warn!(
                incident_id = %incident.id,
                status = %incident.status,
                "Failed to persist incident: {}",
                e
            );
        }
    }

    fn log_resolved(&self, incident: &Incident) {
        let elapsed = incident
            .resolved_at
            .map(|at| (at - incident.detected_at).to_std().unwrap_or_default())
            .unwrap_or_default();
        info!(
            incident_id = %incident.id,
            used_cached_fix = incident.used_cached_fix,
            "Incident resolved in {:?}",
            elapsed
        );
    }
}
