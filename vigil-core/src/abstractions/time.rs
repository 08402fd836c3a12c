//! Time abstractions for testability
//!
//! This module provides trait-based abstractions for time operations,
//! enabling deterministic testing of time-dependent code.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Abstraction for time operations
#[async_trait]
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current wall-clock time
    fn now(&self) -> DateTime<Utc>;

    /// Sleep for a duration
    async fn sleep(&self, duration: Duration);
}

/// Production clock using system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug)]
struct MockClockState {
    now: DateTime<Utc>,
    sleeps: Vec<Duration>,
}

/// Mock clock for deterministic testing
///
/// `sleep` advances virtual time by the requested duration and yields to the
/// scheduler instead of waiting, so a test that spans minutes of virtual time
/// completes immediately. Every requested sleep is recorded.
#[derive(Debug, Clone)]
pub struct MockClock {
    state: Arc<Mutex<MockClockState>>,
}

impl MockClock {
    /// Create new mock clock starting at the Unix epoch
    pub fn new() -> Self {
        Self::with_time(DateTime::<Utc>::default())
    }

    /// Create with specific starting time
    pub fn with_time(start: DateTime<Utc>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockClockState {
                now: start,
                sleeps: Vec::new(),
            })),
        }
    }

    /// Advance time by duration without recording a sleep
    pub fn advance(&self, duration: Duration) {
        let mut state = self.state.lock();
        state.now += chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero());
    }

    /// Virtual time elapsed since the epoch the clock started from
    pub fn elapsed_since(&self, start: DateTime<Utc>) -> Duration {
        (self.state.lock().now - start).to_std().unwrap_or_default()
    }

    /// All sleeps requested so far, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.state.lock().sleeps.clone()
    }

    /// Sum of all requested sleeps
    pub fn total_slept(&self) -> Duration {
        self.state.lock().sleeps.iter().sum()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        self.state.lock().now
    }

    async fn sleep(&self, duration: Duration) {
        {
            let mut state = self.state.lock();
            state.sleeps.push(duration);
            state.now += chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero());
        }
        tokio::task::yield_now().await;
    }
}
