//! Periodic health monitoring with rising-edge incident detection
//!
//! The monitor samples the workload once per check interval (first sample
//! one interval after start) and emits an [`IncidentTrigger`] only when the
//! workload goes from healthy to unhealthy. The initial state is assumed
//! healthy, so a workload that is already down at the first sample still
//! produces exactly one event. Recovery is logged but emits nothing.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::abstractions::time::Clock;
use crate::shutdown::ShutdownSignal;
use crate::types::{HealthSample, IncidentTrigger};
use crate::workload::HealthProbe;

/// Outcome of feeding one sample to the edge detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthTransition {
    Steady,
    Failed,
    Recovered,
}

/// Tracks the previous health state and reports edges
#[derive(Debug, Clone)]
pub struct EdgeDetector {
    healthy: bool,
}

impl Default for EdgeDetector {
    fn default() -> Self {
        Self { healthy: true }
    }
}

impl EdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    pub fn observe(&mut self, sample: &HealthSample) -> HealthTransition {
        let transition = match (self.healthy, sample.healthy) {
            (true, false) => HealthTransition::Failed,
            (false, true) => HealthTransition::Recovered,
            _ => HealthTransition::Steady,
        };
        self.healthy = sample.healthy;
        transition
    }
}

pub struct HealthMonitor {
    probe: Arc<dyn HealthProbe>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    events: mpsc::Sender<IncidentTrigger>,
}

impl HealthMonitor {
    pub fn new(
        probe: Arc<dyn HealthProbe>,
        clock: Arc<dyn Clock>,
        interval: Duration,
        events: mpsc::Sender<IncidentTrigger>,
    ) -> Self {
        Self {
            probe,
            clock,
            interval,
            events,
        }
    }

    pub fn spawn(self, shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Sample until shutdown is requested or the event receiver goes away
    pub async fn run(self, shutdown: ShutdownSignal) {
        info!("Health monitor started (interval {:?})", self.interval);
        let mut detector = EdgeDetector::new();

        loop {
            if shutdown.is_shutdown() {
                break;
            }
            if shutdown
                .run_until("monitor interval", self.clock.sleep(self.interval))
                .await
                .is_err()
            {
                break;
            }

            let sample = match shutdown
                .run_until("health probe", self.probe.probe())
                .await
            {
                Ok(sample) => sample,
                Err(_) => break,
            };

            match detector.observe(&sample) {
                HealthTransition::Failed => {
                    warn!("Incident detected: {}", sample.message);
                    let trigger = IncidentTrigger::new(sample);
                    let incident_id = trigger.incident_id.clone();
                    match shutdown
                        .run_until("incident dispatch", self.events.send(trigger))
                        .await
                    {
                        Ok(Ok(())) => debug!(incident_id = %incident_id, "Incident event dispatched"),
                        Ok(Err(_)) => {
                            error!("Incident channel closed, stopping health monitor");
                            break;
                        }
                        Err(_) => break,
                    }
                }
                HealthTransition::Recovered => info!("Workload recovered: {}", sample.message),
                HealthTransition::Steady => debug!(healthy = sample.healthy, "Health sample"),
            }
        }

        info!("Health monitor stopped");
    }
}
