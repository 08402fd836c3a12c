//! Wiring of the monitor and orchestrator tasks
//!
//! The two tasks share one bounded incident channel and one shutdown signal.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::VigilConfig;
use crate::health_monitor::HealthMonitor;
use crate::orchestrator::{IncidentOrchestrator, OrchestratorDeps};
use crate::shutdown::{shutdown_channel, ShutdownHandle, ShutdownSignal};
use crate::storage::IncidentStore;

pub struct Pipeline {
    shutdown: ShutdownHandle,
    store: Arc<IncidentStore>,
    monitor: JoinHandle<()>,
    orchestrator: JoinHandle<()>,
}

impl Pipeline {
    /// Start monitoring and incident handling in the background
    pub fn spawn(config: &VigilConfig, deps: OrchestratorDeps) -> Self {
        let (shutdown, signal) = shutdown_channel();
        let (events_tx, events_rx) = mpsc::channel(config.monitor.channel_capacity.max(1));

        let monitor = HealthMonitor::new(
            deps.probe.clone(),
            deps.clock.clone(),
            config.monitor.check_interval,
            events_tx,
        )
        .spawn(signal.clone());

        let store = deps.store.clone();
        let orchestrator = Arc::new(IncidentOrchestrator::new(config, deps));
        let orchestrator_signal = signal;
        let orchestrator = tokio::spawn(async move {
            orchestrator.run(events_rx, orchestrator_signal).await;
        });

        info!("Incident pipeline running");
        Self {
            shutdown,
            store,
            monitor,
            orchestrator,
        }
    }

    pub fn signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    pub fn store(&self) -> &Arc<IncidentStore> {
        &self.store
    }

    /// Request shutdown and wait for both tasks to finish
    pub async fn shutdown(self) {
        self.shutdown.shutdown();
        let (monitor, orchestrator) = futures::join!(self.monitor, self.orchestrator);
        if let Err(e) = monitor {
            warn!("Health monitor task ended abnormally: {}", e);
        }
        if let Err(e) = orchestrator {
            warn!("Orchestrator task ended abnormally: {}", e);
        }
        info!("Incident pipeline stopped");
    }
}
