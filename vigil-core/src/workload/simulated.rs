//! In-process managed workload
//!
//! `SimulatedWorkload` owns the workload's mutable state (running flag,
//! health flag, configuration map and bounded error log) behind a single
//! reader/writer lock. Status queries take the shared side; lifecycle,
//! configuration and fault injection take the exclusive side. When a bind
//! address is configured, `start` also serves the workload over HTTP.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::server::{self, ServerHandle};
use super::{FaultKind, HealthProbe, Workload};
use crate::abstractions::time::Clock;
use crate::config::WorkloadConfig;
use crate::error::{VigilError, VigilResult};
use crate::types::{config_keys, HealthSample, StatusSnapshot};

/// Mutable state shared with the HTTP handlers
#[derive(Debug)]
pub(crate) struct WorkloadState {
    pub(crate) running: bool,
    pub(crate) healthy: bool,
    pub(crate) config: BTreeMap<String, String>,
    error_logs: VecDeque<String>,
    max_logs: usize,
}

impl WorkloadState {
    fn new(config: &WorkloadConfig) -> Self {
        Self {
            running: false,
            healthy: true,
            config: config.known_good.clone(),
            error_logs: VecDeque::new(),
            max_logs: config.max_logs.max(1),
        }
    }

    pub(crate) fn add_log(&mut self, clock: &dyn Clock, message: &str) {
        let line = format!("[{}] {}", clock.now().format("%H:%M:%S"), message);
        self.error_logs.push_back(line);
        while self.error_logs.len() > self.max_logs {
            self.error_logs.pop_front();
        }
    }

    pub(crate) fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            running: self.running,
            healthy: self.healthy,
            config: self.config.clone(),
            recent_logs: self.error_logs.iter().cloned().collect(),
        }
    }

    pub(crate) fn health_sample(&self, clock: &dyn Clock) -> HealthSample {
        let now = clock.now();
        if !self.running {
            HealthSample::unhealthy(now, "Service not running", 0)
        } else if self.healthy {
            HealthSample::healthy(now, "Service operational")
        } else {
            HealthSample::unhealthy(now, "Service unhealthy", 503)
        }
    }

    pub(crate) fn inject(&mut self, clock: &dyn Clock, fault: FaultKind) {
        match fault {
            FaultKind::Crash => {
                self.healthy = false;
                self.add_log(clock, "Service crashed - simulated failure");
            }
            FaultKind::Config => {
                self.config.insert(
                    config_keys::DATABASE_URL.to_string(),
                    "invalid::url::format".to_string(),
                );
                self.config
                    .insert(config_keys::TIMEOUT.to_string(), "not-a-number".to_string());
                self.healthy = false;
                self.add_log(clock, "Configuration corrupted - invalid values detected");
            }
            FaultKind::Resource => {
                self.healthy = false;
                self.add_log(clock, "Resource exhaustion - port blocked or memory full");
            }
            FaultKind::Dependency => {
                self.config.insert(
                    config_keys::DATABASE_URL.to_string(),
                    "unreachable-host:9999".to_string(),
                );
                self.healthy = false;
                self.add_log(clock, "Database connection failed - unable to reach host");
            }
        }
    }
}

pub(crate) type SharedWorkloadState = Arc<RwLock<WorkloadState>>;

/// Workload simulated in-process, optionally exposed over HTTP
pub struct SimulatedWorkload {
    config: WorkloadConfig,
    state: SharedWorkloadState,
    server: Mutex<Option<ServerHandle>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SimulatedWorkload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedWorkload")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("serving", &self.server.lock().as_ref().map(|s| s.local_addr()))
            .finish()
    }
}

impl SimulatedWorkload {
    pub fn new(config: WorkloadConfig, clock: Arc<dyn Clock>) -> Self {
        let state = Arc::new(RwLock::new(WorkloadState::new(&config)));
        Self {
            config,
            state,
            server: Mutex::new(None),
            clock,
        }
    }

    /// Drive the workload into a fault
    pub fn trigger(&self, fault: FaultKind) {
        info!(fault = %fault, "Triggering incident");
        self.state.write().inject(self.clock.as_ref(), fault);
    }

    pub fn is_healthy(&self) -> bool {
        let state = self.state.read();
        state.healthy && state.running
    }

    pub fn is_running(&self) -> bool {
        self.state.read().running
    }

    pub fn config(&self) -> BTreeMap<String, String> {
        self.state.read().config.clone()
    }

    pub fn logs(&self) -> Vec<String> {
        self.state.read().error_logs.iter().cloned().collect()
    }

    /// Address the HTTP surface is bound to, while serving
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.lock().as_ref().map(|s| s.local_addr())
    }
}

#[async_trait]
impl Workload for SimulatedWorkload {
    async fn status(&self) -> StatusSnapshot {
        self.state.read().snapshot()
    }

    async fn start(&self) -> VigilResult<()> {
        {
            let mut state = self.state.write();
            if state.running {
                return Err(VigilError::WorkloadAlreadyRunning);
            }
            state.running = true;
            state.healthy = true;
        }

        if let Some(bind) = &self.config.bind_address {
            match server::spawn(bind, self.state.clone(), self.clock.clone()).await {
                Ok(handle) => {
                    info!("Workload serving on {}", handle.local_addr());
                    *self.server.lock() = Some(handle);
                }
                Err(e) => {
                    let mut state = self.state.write();
                    state.running = false;
                    state.healthy = false;
                    state.add_log(self.clock.as_ref(), &format!("Server error: {}", e));
                    return Err(e);
                }
            }
        }

        info!("Workload started");
        Ok(())
    }

    async fn stop(&self) -> VigilResult<()> {
        {
            let mut state = self.state.write();
            if !state.running {
                return Err(VigilError::WorkloadNotRunning);
            }
            state.running = false;
            state.healthy = false;
        }

        let handle = self.server.lock().take();
        if let Some(handle) = handle {
            handle.shutdown().await;
        }

        info!("Workload stopped");
        Ok(())
    }

    async fn set_config(&self, key: &str, value: &str) -> VigilResult<()> {
        debug!(key, value, "Updating workload configuration");
        self.state
            .write()
            .config
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[async_trait]
impl HealthProbe for SimulatedWorkload {
    async fn probe(&self) -> HealthSample {
        self.state.read().health_sample(self.clock.as_ref())
    }
}

impl Drop for SimulatedWorkload {
    fn drop(&mut self) {
        if self.server.get_mut().is_some() {
            warn!("SimulatedWorkload dropped while still serving");
        }
    }
}
