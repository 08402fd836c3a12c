//! Incident classification
//!
//! Maps a workload status snapshot (plus the triggering health sample) to an
//! [`IncidentClass`] and a list of human-readable symptoms. Rules are tried
//! in a fixed order and the first match wins:
//!
//! 1. dependency URL absent, empty or malformed → `ConfigError`
//! 2. dependency URL names the unreachable host → `DependencyFailure`
//! 3. timeout present but not a number or duration → `ConfigError`
//! 4. workload not running → `ServiceDown`
//! 5. a recent log line mentions resource pressure → `ResourceExhaustion`
//! 6. otherwise → `ServiceDown`

use crate::types::{HealthSample, IncidentClass, StatusSnapshot};

/// Host name the simulated dependency fault points the workload at
pub const UNREACHABLE_HOST: &str = "unreachable-host";

const RESOURCE_MARKERS: [&str; 3] = ["resource", "port blocked", "memory"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub class: IncidentClass,
    pub symptoms: Vec<String>,
}

/// Classify an incident from the workload's status and the triggering sample
pub fn classify(snapshot: &StatusSnapshot, sample: &HealthSample) -> Classification {
    let mut symptoms = vec![
        format!("Health check returned status code: {}", sample.status_code),
        sample.message.clone(),
    ];
    let (class, symptom) = match_rule(snapshot);
    symptoms.push(symptom.to_string());
    Classification { class, symptoms }
}

fn match_rule(snapshot: &StatusSnapshot) -> (IncidentClass, &'static str) {
    match snapshot.dependency_url() {
        None => {
            return (
                IncidentClass::ConfigError,
                "Database URL configuration missing",
            )
        }
        Some(url) => match dependency_host(url) {
            None => {
                return (
                    IncidentClass::ConfigError,
                    "Invalid database URL configuration detected",
                )
            }
            Some(host) if host == UNREACHABLE_HOST => {
                return (IncidentClass::DependencyFailure, "Database host unreachable")
            }
            Some(_) => {}
        },
    }

    if let Some(timeout) = snapshot.timeout() {
        if !is_valid_timeout(timeout) {
            return (
                IncidentClass::ConfigError,
                "Invalid timeout configuration detected",
            );
        }
    }

    if !snapshot.running {
        return (IncidentClass::ServiceDown, "Service process not running");
    }

    let resource_pressure = snapshot.recent_logs.iter().any(|line| {
        let line = line.to_lowercase();
        RESOURCE_MARKERS.iter().any(|marker| line.contains(marker))
    });
    if resource_pressure {
        return (
            IncidentClass::ResourceExhaustion,
            "Resource exhaustion detected in logs",
        );
    }

    (IncidentClass::ServiceDown, "Service health check failing")
}

/// Host part of a `host:port` dependency address, optionally with a scheme
/// and path. `None` when the address is malformed.
pub fn dependency_host(url: &str) -> Option<&str> {
    let url = url.trim();
    let without_scheme = match url.split_once("://") {
        Some((scheme, rest)) if !scheme.is_empty() => rest,
        Some(_) => return None,
        None => url,
    };
    let authority = without_scheme.split('/').next().unwrap_or_default();
    let authority = authority.rsplit('@').next().unwrap_or_default();

    let (host, port) = authority.rsplit_once(':')?;
    if host.is_empty() || port.parse::<u16>().is_err() {
        return None;
    }
    let valid_host = host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_');
    valid_host.then_some(host)
}

/// Timeouts are a non-negative number of seconds (`30`, `1.5`) or a
/// humantime duration such as `30s`.
pub fn is_valid_timeout(value: &str) -> bool {
    let value = value.trim();
    value
        .parse::<f64>()
        .is_ok_and(|secs| secs.is_finite() && secs >= 0.0)
        || humantime::parse_duration(value).is_ok()
}
