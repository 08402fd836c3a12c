//! Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use vigil_core::abstractions::time::{Clock, MockClock};
use vigil_core::config::{VigilConfig, WorkloadConfig};
use vigil_core::diagnosis::{DiagnosisRequest, DiagnosisResponse, DiagnosisSource};
use vigil_core::orchestrator::{IncidentOrchestrator, OrchestratorDeps};
use vigil_core::shutdown::ShutdownHandle;
use vigil_core::storage::IncidentStore;
use vigil_core::workload::{HealthProbe, SimulatedWorkload, Workload};
use vigil_core::{HealthSample, IncidentTrigger, StatusSnapshot, VigilError, VigilResult};

/// Diagnosis source that replays canned responses and counts calls
#[derive(Debug, Default)]
pub struct ScriptedDiagnosis {
    responses: Mutex<VecDeque<VigilResult<DiagnosisResponse>>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<DiagnosisRequest>>,
}

impl ScriptedDiagnosis {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, fix_type: &str, diagnosis: &str, steps: &[&str]) {
        self.responses.lock().push_back(Ok(DiagnosisResponse {
            diagnosis: diagnosis.to_string(),
            fix_type: fix_type.to_string(),
            fix_steps: steps.iter().map(|s| s.to_string()).collect(),
            code: None,
            confidence: Some(0.9),
        }));
    }

    pub fn fail(&self, message: &str) {
        self.responses
            .lock()
            .push_back(Err(VigilError::DiagnosisError(message.to_string())));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<DiagnosisRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl DiagnosisSource for ScriptedDiagnosis {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn diagnose(&self, request: &DiagnosisRequest) -> VigilResult<DiagnosisResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(VigilError::DiagnosisError("no scripted response".to_string())))
    }
}

/// Probe that returns a fixed sequence, then defers to a fallback probe
pub struct ScriptedProbe {
    script: Mutex<VecDeque<bool>>,
    fallback: Arc<dyn HealthProbe>,
    clock: Arc<dyn Clock>,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new(script: &[bool], fallback: Arc<dyn HealthProbe>, clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.iter().copied().collect()),
            fallback,
            clock,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthProbe for ScriptedProbe {
    async fn probe(&self) -> HealthSample {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.script.lock().pop_front();
        match scripted {
            Some(true) => HealthSample::healthy(self.clock.now(), "scripted healthy"),
            Some(false) => HealthSample::unhealthy(self.clock.now(), "scripted unhealthy", 503),
            None => self.fallback.probe().await,
        }
    }
}

/// Probe that plays a sequence of samples and requests shutdown once it is
/// asked for one more sample than it has
pub struct SequenceProbe {
    samples: Mutex<VecDeque<bool>>,
    clock: Arc<dyn Clock>,
    shutdown: ShutdownHandle,
}

impl SequenceProbe {
    pub fn new(samples: &[bool], clock: Arc<dyn Clock>, shutdown: ShutdownHandle) -> Self {
        Self {
            samples: Mutex::new(samples.iter().copied().collect()),
            clock,
            shutdown,
        }
    }
}

#[async_trait]
impl HealthProbe for SequenceProbe {
    async fn probe(&self) -> HealthSample {
        let next = self.samples.lock().pop_front();
        match next {
            Some(true) => HealthSample::healthy(self.clock.now(), "ok"),
            Some(false) => HealthSample::unhealthy(self.clock.now(), "down", 503),
            None => {
                self.shutdown.shutdown();
                HealthSample::healthy(self.clock.now(), "end of script")
            }
        }
    }
}

/// Workload whose start always fails
#[derive(Debug, Default)]
pub struct BrokenWorkload;

#[async_trait]
impl Workload for BrokenWorkload {
    async fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            running: false,
            healthy: false,
            config: vigil_core::config::workload::default_known_good(),
            recent_logs: vec![],
        }
    }

    async fn start(&self) -> VigilResult<()> {
        Err(VigilError::WorkloadStartFailed {
            reason: "port in use".to_string(),
        })
    }

    async fn stop(&self) -> VigilResult<()> {
        Err(VigilError::WorkloadNotRunning)
    }

    async fn set_config(&self, _key: &str, _value: &str) -> VigilResult<()> {
        Ok(())
    }
}

/// A simulated workload, store and clock wired for orchestrator tests
pub struct Fixture {
    pub dir: TempDir,
    pub clock: MockClock,
    pub workload: Arc<SimulatedWorkload>,
    pub store: Arc<IncidentStore>,
    pub config: VigilConfig,
}

impl Fixture {
    pub async fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let clock = MockClock::new();
        let workload = Arc::new(SimulatedWorkload::new(
            WorkloadConfig {
                bind_address: None,
                ..Default::default()
            },
            Arc::new(clock.clone()),
        ));
        workload.start().await.expect("workload starts");
        let store = Arc::new(IncidentStore::open(
            dir.path().join("incident_memory.json"),
            Arc::new(clock.clone()),
        ));
        Self {
            dir,
            clock,
            workload,
            store,
            config: VigilConfig::default(),
        }
    }

    pub fn store_path(&self) -> PathBuf {
        self.dir.path().join("incident_memory.json")
    }

    pub fn orchestrator(&self, diagnosis: Arc<dyn DiagnosisSource>) -> IncidentOrchestrator {
        self.orchestrator_with_probe(diagnosis, self.workload.clone())
    }

    pub fn orchestrator_with_probe(
        &self,
        diagnosis: Arc<dyn DiagnosisSource>,
        probe: Arc<dyn HealthProbe>,
    ) -> IncidentOrchestrator {
        IncidentOrchestrator::new(
            &self.config,
            OrchestratorDeps {
                workload: self.workload.clone(),
                probe,
                diagnosis,
                store: self.store.clone(),
                clock: Arc::new(self.clock.clone()),
            },
        )
    }

    pub fn trigger(&self) -> IncidentTrigger {
        IncidentTrigger::new(HealthSample::unhealthy(
            self.clock.now(),
            "Service unhealthy",
            503,
        ))
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_for<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
