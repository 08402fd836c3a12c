//! Post-fix verification
//!
//! A fix counts as working only if a fixed number of spaced health probes
//! all pass. The first failing probe ends verification early.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::abstractions::time::Clock;
use crate::config::VerificationConfig;
use crate::error::VigilResult;
use crate::shutdown::ShutdownSignal;
use crate::workload::HealthProbe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationReport {
    pub passed: bool,
    pub probes_run: u32,
}

pub struct VerificationLoop {
    probe: Arc<dyn HealthProbe>,
    clock: Arc<dyn Clock>,
    config: VerificationConfig,
}

impl VerificationLoop {
    pub fn new(probe: Arc<dyn HealthProbe>, clock: Arc<dyn Clock>, config: VerificationConfig) -> Self {
        Self {
            probe,
            clock,
            config,
        }
    }

    pub async fn verify(&self, shutdown: &ShutdownSignal) -> VigilResult<VerificationReport> {
        let probes = self.config.probes.max(1);
        for attempt in 1..=probes {
            if attempt > 1 {
                shutdown
                    .run_until("verification", self.clock.sleep(self.config.probe_spacing))
                    .await?;
            }

            let sample = shutdown
                .run_until("verification probe", self.probe.probe())
                .await?;
            if !sample.healthy {
                warn!(
                    "Verification probe {}/{} failed: {}",
                    attempt, probes, sample.message
                );
                return Ok(VerificationReport {
                    passed: false,
                    probes_run: attempt,
                });
            }
            debug!("Verification probe {}/{} passed", attempt, probes);
        }

        info!("Fix verified with {} healthy probes", probes);
        Ok(VerificationReport {
            passed: true,
            probes_run: probes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abstractions::time::MockClock;
    use crate::types::HealthSample;
    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::time::Duration;

    struct Scripted {
        samples: Mutex<VecDeque<bool>>,
        calls: Mutex<u32>,
    }

    impl Scripted {
        fn new(samples: &[bool]) -> Arc<Self> {
            Arc::new(Self {
                samples: Mutex::new(samples.iter().copied().collect()),
                calls: Mutex::new(0),
            })
        }
    }

    #[async_trait]
    impl HealthProbe for Scripted {
        async fn probe(&self) -> HealthSample {
            *self.calls.lock() += 1;
            let healthy = self.samples.lock().pop_front().unwrap_or(true);
            if healthy {
                HealthSample::healthy(Utc::now(), "ok")
            } else {
                HealthSample::unhealthy(Utc::now(), "down", 503)
            }
        }
    }

    fn verifier(probe: Arc<Scripted>, clock: &MockClock) -> VerificationLoop {
        VerificationLoop::new(probe, Arc::new(clock.clone()), VerificationConfig::default())
    }

    #[tokio::test]
    async fn test_all_probes_pass() {
        let clock = MockClock::new();
        let probe = Scripted::new(&[true, true, true]);
        let report = verifier(probe.clone(), &clock)
            .verify(&ShutdownSignal::never())
            .await
            .unwrap();

        assert_eq!(report, VerificationReport { passed: true, probes_run: 3 });
        assert_eq!(*probe.calls.lock(), 3);
        assert_eq!(clock.total_slept(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_short_circuits_on_first_failure() {
        let clock = MockClock::new();
        let probe = Scripted::new(&[true, false, true]);
        let report = verifier(probe.clone(), &clock)
            .verify(&ShutdownSignal::never())
            .await
            .unwrap();

        assert_eq!(report, VerificationReport { passed: false, probes_run: 2 });
        assert_eq!(*probe.calls.lock(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_by_shutdown() {
        let clock = MockClock::new();
        let (handle, signal) = crate::shutdown::shutdown_channel();
        handle.shutdown();

        let result = verifier(Scripted::new(&[true]), &clock).verify(&signal).await;
        assert!(result.unwrap_err().is_cancelled());
    }
}
