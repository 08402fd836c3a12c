//! Scripted fault sequence for demonstrations
//!
//! Injects a crash, a configuration corruption, a second crash (which should
//! be resolved from the learned fix) and a dependency failure, pausing
//! between each so the pipeline can finish the previous incident.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use vigil_core::abstractions::time::Clock;
use vigil_core::shutdown::ShutdownSignal;
use vigil_core::workload::{FaultKind, SimulatedWorkload};

const SCRIPT: [(FaultKind, &str); 4] = [
    (FaultKind::Crash, "service crash"),
    (FaultKind::Config, "configuration corruption"),
    (FaultKind::Crash, "repeat crash, expecting the learned fix"),
    (FaultKind::Dependency, "dependency failure"),
];

#[derive(Debug, Clone, Copy)]
pub struct DemoTiming {
    pub initial_delay: Duration,
    pub spacing: Duration,
}

impl Default for DemoTiming {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(3),
            spacing: Duration::from_secs(15),
        }
    }
}

pub async fn run(
    workload: Arc<SimulatedWorkload>,
    clock: Arc<dyn Clock>,
    shutdown: ShutdownSignal,
    timing: DemoTiming,
) {
    info!("Demo mode: {} scripted incidents", SCRIPT.len());

    for (i, (fault, label)) in SCRIPT.iter().enumerate() {
        let delay = if i == 0 {
            timing.initial_delay
        } else {
            timing.spacing
        };
        if shutdown
            .run_until("demo", clock.sleep(delay))
            .await
            .is_err()
        {
            return;
        }

        info!("Demo {}/{}: {}", i + 1, SCRIPT.len(), label);
        workload.trigger(*fault);
    }

    info!("Demo complete; press Ctrl-C to see the summary");
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::abstractions::time::MockClock;
    use vigil_core::config::WorkloadConfig;
    use vigil_core::shutdown::shutdown_channel;
    use vigil_core::workload::Workload;

    fn workload(clock: &MockClock) -> Arc<SimulatedWorkload> {
        let config = WorkloadConfig {
            bind_address: None,
            ..Default::default()
        };
        Arc::new(SimulatedWorkload::new(config, Arc::new(clock.clone())))
    }

    #[tokio::test]
    async fn test_script_runs_on_injected_clock() {
        let clock = MockClock::new();
        let workload = workload(&clock);
        workload.start().await.unwrap();

        run(
            workload.clone(),
            Arc::new(clock.clone()),
            ShutdownSignal::never(),
            DemoTiming::default(),
        )
        .await;

        assert_eq!(
            clock.sleeps(),
            vec![
                Duration::from_secs(3),
                Duration::from_secs(15),
                Duration::from_secs(15),
                Duration::from_secs(15),
            ]
        );
        assert_eq!(
            workload.config().get("database_url").map(String::as_str),
            Some("unreachable-host:9999")
        );
    }

    #[tokio::test]
    async fn test_shutdown_stops_script() {
        let clock = MockClock::new();
        let workload = workload(&clock);
        workload.start().await.unwrap();
        let (handle, signal) = shutdown_channel();
        handle.shutdown();

        run(
            workload.clone(),
            Arc::new(clock.clone()),
            signal,
            DemoTiming::default(),
        )
        .await;

        assert!(workload.is_healthy());
    }
}
