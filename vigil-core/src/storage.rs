//! Incident store
//!
//! Keeps every incident ever recorded, keyed by id, together with the
//! learned fixes, and mirrors both into a single JSON document on disk.
//! The document is rewritten after each mutation by writing a temporary
//! file beside it and renaming it into place, so readers never observe a
//! half-written file.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::abstractions::time::Clock;
use crate::error::{VigilError, VigilResult};
use crate::fix_cache::FixCache;
use crate::types::{Incident, IncidentClass, IncidentStatus, Resolution};

/// On-disk layout of the incident log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredData {
    #[serde(default)]
    pub incidents: BTreeMap<String, Incident>,
    #[serde(default)]
    pub fixes: BTreeMap<IncidentClass, Resolution>,
    #[serde(default)]
    pub last_updated: DateTime<Utc>,
}

/// Aggregate counts over the store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total_incidents: usize,
    pub resolved_incidents: usize,
    pub failed_incidents: usize,
    pub cached_fix_hits: usize,
    pub learned_fixes: usize,
    pub incidents_by_class: BTreeMap<IncidentClass, usize>,
    pub learned_classes: Vec<IncidentClass>,
}

impl StoreStats {
    pub fn success_rate(&self) -> f64 {
        if self.total_incidents == 0 {
            0.0
        } else {
            self.resolved_incidents as f64 / self.total_incidents as f64 * 100.0
        }
    }
}

pub struct IncidentStore {
    path: PathBuf,
    incidents: RwLock<BTreeMap<String, Incident>>,
    last_updated: RwLock<DateTime<Utc>>,
    fixes: Arc<FixCache>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for IncidentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncidentStore")
            .field("path", &self.path)
            .field("incidents", &self.incidents.read().len())
            .field("fixes", &self.fixes.len())
            .finish()
    }
}

impl IncidentStore {
    /// Open the store at `path`, starting empty if the file is missing or
    /// unreadable. Load problems are logged, never fatal.
    pub fn open(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        let path = path.into();
        let data = match Self::read_document(&path) {
            Ok(Some(data)) => {
                info!(
                    "Loaded {} incidents and {} learned fixes from {}",
                    data.incidents.len(),
                    data.fixes.len(),
                    path.display()
                );
                data
            }
            Ok(None) => {
                info!("No incident log at {}, starting fresh", path.display());
                StoredData::default()
            }
            Err(e) => {
                warn!(
                    "Failed to load incident log from {}: {}; starting fresh",
                    path.display(),
                    e
                );
                if matches!(e, VigilError::JsonError(_)) {
                    Self::set_aside(&path);
                }
                StoredData::default()
            }
        };
        Self::from_data(path, data, clock)
    }

    /// Path an undecodable document is moved to so the next save cannot
    /// overwrite it
    pub fn corrupt_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".corrupt");
        PathBuf::from(name)
    }

    fn set_aside(path: &Path) {
        let target = Self::corrupt_path(path);
        match std::fs::rename(path, &target) {
            Ok(()) => warn!("Moved unreadable incident log to {}", target.display()),
            Err(e) => error!(
                "Failed to move unreadable incident log {} aside: {}",
                path.display(),
                e
            ),
        }
    }

    fn from_data(path: PathBuf, data: StoredData, clock: Arc<dyn Clock>) -> Self {
        Self {
            path,
            incidents: RwLock::new(data.incidents),
            last_updated: RwLock::new(data.last_updated),
            fixes: Arc::new(FixCache::from_entries(data.fixes)),
            clock,
        }
    }

    /// Read and decode the document; `Ok(None)` if it does not exist
    pub fn read_document(path: &Path) -> VigilResult<Option<StoredData>> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Learned-fix cache shared with the orchestrator
    pub fn fixes(&self) -> Arc<FixCache> {
        self.fixes.clone()
    }

    /// Insert or replace an incident and persist
    pub fn record_incident(&self, incident: &Incident) -> VigilResult<()> {
        let mut incidents = self.incidents.write();
        incidents.insert(incident.id.clone(), incident.clone());
        debug!(incident_id = %incident.id, status = %incident.status, "Recorded incident");
        self.save_locked(&incidents)
    }

    pub fn get_incident(&self, id: &str) -> Option<Incident> {
        self.incidents.read().get(id).cloned()
    }

    /// All incidents, oldest first
    pub fn all_incidents(&self) -> Vec<Incident> {
        let mut incidents: Vec<Incident> = self.incidents.read().values().cloned().collect();
        incidents.sort_by(|a, b| a.detected_at.cmp(&b.detected_at).then(a.id.cmp(&b.id)));
        incidents
    }

    /// Remember a verified fix for `class` and persist
    pub fn learn_fix(&self, class: IncidentClass, resolution: Resolution) -> VigilResult<()> {
        let incidents = self.incidents.write();
        let replaced = self.fixes.update(class, resolution)?;
        if replaced.is_some() {
            info!("Updated learned fix for {}", class);
        } else {
            info!("Learned new fix for {}", class);
        }
        self.save_locked(&incidents)
    }

    pub fn stats(&self) -> StoreStats {
        let incidents = self.incidents.read();
        let mut stats = StoreStats {
            total_incidents: incidents.len(),
            learned_fixes: self.fixes.len(),
            learned_classes: self.fixes.snapshot().into_keys().collect(),
            ..Default::default()
        };
        for incident in incidents.values() {
            match incident.status {
                IncidentStatus::Resolved => stats.resolved_incidents += 1,
                IncidentStatus::Failed => stats.failed_incidents += 1,
                _ => {}
            }
            if incident.used_cached_fix && incident.status == IncidentStatus::Resolved {
                stats.cached_fix_hits += 1;
            }
            *stats.incidents_by_class.entry(incident.class).or_default() += 1;
        }
        stats
    }

    /// Human-readable report of everything the store has learned
    pub fn summary(&self) -> String {
        let stats = self.stats();
        let mut out = String::new();
        let _ = writeln!(out, "=== Incident Memory Summary ===");
        let _ = writeln!(out, "Total incidents: {}", stats.total_incidents);
        let _ = writeln!(out, "Resolved: {}", stats.resolved_incidents);
        let _ = writeln!(out, "Failed: {}", stats.failed_incidents);
        let _ = writeln!(out, "Resolved from cache: {}", stats.cached_fix_hits);
        let _ = writeln!(out, "Success rate: {:.1}%", stats.success_rate());

        if !stats.incidents_by_class.is_empty() {
            let _ = writeln!(out, "\nIncidents by type:");
            for (class, count) in &stats.incidents_by_class {
                let _ = writeln!(out, "  {}: {}", class, count);
            }
        }

        let fixes = self.fixes.snapshot();
        let _ = writeln!(out, "\nLearned fixes: {}", fixes.len());
        for (class, fix) in &fixes {
            let _ = writeln!(out, "  {} -> {} ({})", class, fix.fix_kind, fix.description);
        }
        out
    }

    /// Forget every incident and learned fix, and persist the empty log
    pub fn clear(&self) -> VigilResult<()> {
        let mut incidents = self.incidents.write();
        incidents.clear();
        self.fixes.clear();
        info!("Cleared incident log");
        self.save_locked(&incidents)
    }

    /// Current contents as they would be written to disk
    pub fn document(&self) -> StoredData {
        StoredData {
            incidents: self.incidents.read().clone(),
            fixes: self.fixes.snapshot(),
            last_updated: *self.last_updated.read(),
        }
    }

    // Callers hold the incidents write lock so saves are serialized with
    // every mutation.
    fn save_locked(&self, incidents: &BTreeMap<String, Incident>) -> VigilResult<()> {
        let now = self.clock.now();
        *self.last_updated.write() = now;
        let data = StoredData {
            incidents: incidents.clone(),
            fixes: self.fixes.snapshot(),
            last_updated: now,
        };
        write_atomic(&self.path, &data)
    }
}

fn write_atomic(path: &Path, data: &StoredData) -> VigilResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let json = serde_json::to_vec_pretty(data)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| storage_error("create temp file", e))?;
    tmp.write_all(&json)
        .map_err(|e| storage_error("write temp file", e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| storage_error("sync temp file", e))?;
    tmp.persist(path)
        .map_err(|e| storage_error("rename into place", e.error))?;
    Ok(())
}

fn storage_error(operation: &str, source: std::io::Error) -> VigilError {
    VigilError::Storage {
        operation: operation.to_string(),
        source: Box::new(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abstractions::time::MockClock;
    use crate::types::{FixKind, HealthSample, IncidentTrigger};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use tracing_test::traced_test;

    fn incident(class: IncidentClass, status: IncidentStatus) -> Incident {
        let trigger = IncidentTrigger::new(HealthSample::unhealthy(Utc::now(), "down", 503));
        let mut incident = Incident::detected(&trigger);
        incident.class = class;
        incident.status = status;
        incident.symptoms = vec!["Service health check failing".to_string()];
        incident
    }

    fn fix() -> Resolution {
        Resolution {
            fix_kind: FixKind::Config,
            description: "Restore known-good configuration".to_string(),
            steps: vec!["Reset timeout to '30s'".to_string()],
            code: None,
            success: true,
        }
    }

    fn store_in(dir: &TempDir) -> IncidentStore {
        IncidentStore::open(dir.path().join("memory.json"), Arc::new(MockClock::new()))
    }

    #[test]
    fn test_reload_reproduces_incidents_and_fixes() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let resolved = incident(IncidentClass::ConfigError, IncidentStatus::Resolved);
        let failed = incident(IncidentClass::ServiceDown, IncidentStatus::Failed);
        store.record_incident(&resolved).unwrap();
        store.record_incident(&failed).unwrap();
        store.learn_fix(IncidentClass::ConfigError, fix()).unwrap();

        let reloaded = store_in(&dir);
        let before = store.document();
        let after = reloaded.document();
        assert_eq!(before.incidents, after.incidents);
        assert_eq!(before.fixes, after.fixes);
        assert_eq!(
            serde_json::to_vec(&before.incidents).unwrap(),
            serde_json::to_vec(&after.incidents).unwrap()
        );
        assert_eq!(
            reloaded.fixes().lookup(IncidentClass::ConfigError),
            Some(fix())
        );
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(store.all_incidents().is_empty());
        assert!(store.fixes().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    #[traced_test]
    fn test_corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("memory.json"), b"{ not json").unwrap();
        let store = store_in(&dir);
        assert_eq!(store.stats().total_incidents, 0);
        assert!(logs_contain("Failed to load incident log"));
        assert!(logs_contain("Moved unreadable incident log"));
    }

    #[test]
    fn test_unreadable_document_survives_next_save() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("memory.json");
        let store = store_in(&dir);
        let mut resolved = incident(IncidentClass::ConfigError, IncidentStatus::Resolved);
        resolved.resolution = Some(fix());
        store.record_incident(&resolved).unwrap();
        store
            .record_incident(&incident(IncidentClass::ServiceDown, IncidentStatus::Failed))
            .unwrap();

        // A fix kind this build does not know makes the whole document undecodable.
        let mut document: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        document["incidents"][&resolved.id]["resolution"]["fix_kind"] =
            serde_json::Value::from("reboot");
        let original = serde_json::to_vec(&document).unwrap();
        std::fs::write(&path, &original).unwrap();

        let reopened = store_in(&dir);
        assert!(reopened.all_incidents().is_empty());
        reopened
            .record_incident(&incident(IncidentClass::ServiceDown, IncidentStatus::Detected))
            .unwrap();

        let set_aside = IncidentStore::corrupt_path(&path);
        assert_eq!(std::fs::read(&set_aside).unwrap(), original);
        assert_eq!(reopened.all_incidents().len(), 1);
    }

    #[test]
    fn test_record_replaces_by_id() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let mut incident = incident(IncidentClass::ServiceDown, IncidentStatus::Detected);
        store.record_incident(&incident).unwrap();

        incident.status = IncidentStatus::Resolved;
        store.record_incident(&incident).unwrap();

        assert_eq!(store.all_incidents().len(), 1);
        assert_eq!(
            store.get_incident(&incident.id).unwrap().status,
            IncidentStatus::Resolved
        );
    }

    #[test]
    fn test_stats_and_summary() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let mut cached = incident(IncidentClass::ServiceDown, IncidentStatus::Resolved);
        cached.used_cached_fix = true;
        store.record_incident(&cached).unwrap();
        store
            .record_incident(&incident(IncidentClass::ServiceDown, IncidentStatus::Resolved))
            .unwrap();
        store
            .record_incident(&incident(IncidentClass::DependencyFailure, IncidentStatus::Failed))
            .unwrap();
        store.learn_fix(IncidentClass::ServiceDown, fix()).unwrap();

        let stats = store.stats();
        assert_eq!(stats.total_incidents, 3);
        assert_eq!(stats.resolved_incidents, 2);
        assert_eq!(stats.failed_incidents, 1);
        assert_eq!(stats.cached_fix_hits, 1);
        assert_eq!(stats.incidents_by_class[&IncidentClass::ServiceDown], 2);
        assert_eq!(stats.learned_classes, vec![IncidentClass::ServiceDown]);

        let summary = store.summary();
        assert!(summary.contains("Total incidents: 3"));
        assert!(summary.contains("SERVICE_DOWN -> config"));
    }

    #[test]
    fn test_clear_persists_empty_log() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store
            .record_incident(&incident(IncidentClass::ServiceDown, IncidentStatus::Resolved))
            .unwrap();
        store.learn_fix(IncidentClass::ServiceDown, fix()).unwrap();

        store.clear().unwrap();
        let reloaded = store_in(&dir);
        assert!(reloaded.all_incidents().is_empty());
        assert!(reloaded.fixes().is_empty());
    }

    #[test]
    fn test_save_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let store = IncidentStore::open(
            dir.path().join("missing-dir").join("memory.json"),
            Arc::new(MockClock::new()),
        );
        let result = store.record_incident(&incident(IncidentClass::ServiceDown, IncidentStatus::Detected));
        assert!(matches!(result, Err(VigilError::Storage { .. })));
        // In-memory state still reflects the write.
        assert_eq!(store.all_incidents().len(), 1);
    }
}
