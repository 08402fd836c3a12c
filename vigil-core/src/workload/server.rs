//! HTTP surface of the simulated workload

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};
use tracing::{error, info, warn};

use super::simulated::SharedWorkloadState;
use super::FaultKind;
use crate::abstractions::time::Clock;
use crate::error::{VigilError, VigilResult};
use crate::types::{HealthSample, StatusSnapshot};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

#[derive(Clone)]
struct AppState {
    state: SharedWorkloadState,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Deserialize)]
struct TriggerParams {
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Running HTTP server; dropped handles leave the server running.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait briefly for in-flight requests
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let mut join = self.join;
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut join).await.is_err() {
            warn!("Workload HTTP server did not drain in time, aborting");
            join.abort();
        }
    }
}

pub(crate) async fn spawn(
    bind: &str,
    state: SharedWorkloadState,
    clock: Arc<dyn Clock>,
) -> VigilResult<ServerHandle> {
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|e| VigilError::WorkloadStartFailed {
            reason: format!("Failed to bind {}: {}", bind, e),
        })?;
    let local_addr = listener.local_addr()?;

    let router = router(state, clock);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let join = tokio::spawn(async move {
        let shutdown = async {
            let _ = shutdown_rx.await;
        };
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!("Workload HTTP server error: {}", e);
        }
    });

    Ok(ServerHandle {
        local_addr,
        shutdown_tx,
        join,
    })
}

fn router(state: SharedWorkloadState, clock: Arc<dyn Clock>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/trigger-incident", get(trigger_incident))
        .route("/api/data", get(api_data))
        .with_state(AppState { state, clock })
}

async fn health(State(app): State<AppState>) -> (StatusCode, Json<HealthSample>) {
    let sample = app.state.read().health_sample(app.clock.as_ref());
    let code = if sample.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(sample))
}

async fn status(State(app): State<AppState>) -> Json<StatusSnapshot> {
    Json(app.state.read().snapshot())
}

async fn trigger_incident(
    State(app): State<AppState>,
    Query(params): Query<TriggerParams>,
) -> (StatusCode, String) {
    let raw = params.kind.unwrap_or_default();
    let fault = match raw.parse::<FaultKind>() {
        Ok(fault) => fault,
        Err(_) => {
            let names: Vec<&str> = FaultKind::ALL.iter().map(FaultKind::as_str).collect();
            return (
                StatusCode::BAD_REQUEST,
                format!("Invalid incident type. Use: {}", names.join(", ")),
            );
        }
    };

    info!(fault = %fault, "Incident triggered over HTTP");
    app.state.write().inject(app.clock.as_ref(), fault);
    (StatusCode::OK, format!("Incident triggered: {}", fault))
}

async fn api_data(
    State(app): State<AppState>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let state = app.state.read();
    if !(state.running && state.healthy) {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    Ok(Json(serde_json::json!({
        "data": "Important business data",
        "status": "success",
        "timestamp": app.clock.now(),
    })))
}

#[cfg(test)]
mod tests {
    use super::super::{HealthProbe, SimulatedWorkload, Workload};
    use super::*;
    use crate::abstractions::time::SystemClock;
    use crate::config::WorkloadConfig;
    use crate::workload::HttpProbe;

    fn served_workload() -> SimulatedWorkload {
        let config = WorkloadConfig {
            bind_address: Some("127.0.0.1:0".to_string()),
            ..Default::default()
        };
        SimulatedWorkload::new(config, Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn test_http_surface_reflects_faults() {
        let workload = served_workload();
        workload.start().await.unwrap();
        let addr = workload.local_addr().unwrap();
        let base = format!("http://{}", addr);

        let probe = HttpProbe::new(&base, Duration::from_secs(2), Arc::new(SystemClock)).unwrap();
        assert!(probe.probe().await.healthy);

        let client = reqwest::Client::new();
        let resp = client
            .get(format!("{}/trigger-incident?type=crash", base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);

        let sample = probe.probe().await;
        assert!(!sample.healthy);
        assert_eq!(sample.status_code, 503);

        let resp = client
            .get(format!("{}/api/data", base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);

        let resp = client
            .get(format!("{}/trigger-incident?type=meltdown", base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
        assert_eq!(
            resp.text().await.unwrap(),
            "Invalid incident type. Use: crash, config, resource, dependency"
        );

        workload.stop().await.unwrap();
        let sample = probe.probe().await;
        assert!(!sample.healthy);
        assert!(sample.message.starts_with("Health check failed"));
    }

    #[tokio::test]
    async fn test_status_endpoint_round_trips_snapshot() {
        let workload = served_workload();
        workload.start().await.unwrap();
        workload.trigger(FaultKind::Dependency);
        let base = format!("http://{}", workload.local_addr().unwrap());

        let probe = HttpProbe::new(&base, Duration::from_secs(2), Arc::new(SystemClock)).unwrap();
        let snapshot = probe.status().await.unwrap();
        assert_eq!(snapshot, workload.status().await);

        workload.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_undecodable_health_body_is_unhealthy() {
        let router = Router::new().route("/health", get(|| async { "all good, probably" }));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        let probe = HttpProbe::new(
            &format!("http://{}", addr),
            Duration::from_secs(2),
            Arc::new(SystemClock),
        )
        .unwrap();
        let sample = probe.probe().await;

        assert!(!sample.healthy);
        assert_eq!(sample.status_code, 200);
        assert_eq!(sample.message, "Failed to parse health response");
        server.abort();
    }
}
