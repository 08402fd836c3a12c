//! Cooperative shutdown signal shared by the monitor and orchestrator tasks

use std::future::Future;
use tokio::sync::watch;

use crate::error::{VigilError, VigilResult};

/// Sending half; dropping it does not trigger shutdown.
#[derive(Debug)]
pub struct ShutdownHandle {
    shutdown_tx: watch::Sender<bool>,
}

/// Receiving half, cheap to clone into every task.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    shutdown_rx: watch::Receiver<bool>,
}

/// Create a linked handle/signal pair
pub fn shutdown_channel() -> (ShutdownHandle, ShutdownSignal) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    (ShutdownHandle { shutdown_tx }, ShutdownSignal { shutdown_rx })
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            shutdown_rx: self.shutdown_tx.subscribe(),
        }
    }
}

impl ShutdownSignal {
    /// A signal that never fires; for one-shot use outside the task loops.
    pub fn never() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        drop(shutdown_tx);
        Self { shutdown_rx }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Resolves once shutdown has been requested.
    pub async fn wait(&mut self) {
        loop {
            if *self.shutdown_rx.borrow_and_update() {
                return;
            }
            if self.shutdown_rx.changed().await.is_err() {
                // Sender gone without signalling: never resolve.
                std::future::pending::<()>().await;
            }
        }
    }

    /// Run `future` unless shutdown is requested first.
    pub async fn run_until<F, T>(&self, operation: &str, future: F) -> VigilResult<T>
    where
        F: Future<Output = T>,
    {
        if self.is_shutdown() {
            return Err(VigilError::Cancelled {
                operation: operation.to_string(),
            });
        }
        let mut signal = self.clone();
        tokio::select! {
            biased;
            _ = signal.wait() => Err(VigilError::Cancelled {
                operation: operation.to_string(),
            }),
            result = future => Ok(result),
        }
    }
}
