//! Learned fixes, one per incident class
//!
//! Only verified-successful resolutions are admitted; a later success for
//! the same class replaces the earlier entry.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

use crate::error::{VigilError, VigilResult};
use crate::types::{IncidentClass, Resolution};

#[derive(Debug, Default)]
pub struct FixCache {
    entries: RwLock<HashMap<IncidentClass, Resolution>>,
}

impl FixCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache from previously persisted fixes, skipping failed ones
    pub fn from_entries(entries: impl IntoIterator<Item = (IncidentClass, Resolution)>) -> Self {
        let entries = entries
            .into_iter()
            .filter(|(_, resolution)| resolution.success)
            .collect();
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub fn lookup(&self, class: IncidentClass) -> Option<Resolution> {
        self.entries.read().get(&class).cloned()
    }

    /// Record a verified fix, returning the entry it replaced
    pub fn update(
        &self,
        class: IncidentClass,
        resolution: Resolution,
    ) -> VigilResult<Option<Resolution>> {
        if !resolution.success {
            return Err(VigilError::Internal {
                message: format!("refusing to learn unsuccessful fix for {}", class),
            });
        }
        Ok(self.entries.write().insert(class, resolution))
    }

    pub fn contains(&self, class: IncidentClass) -> bool {
        self.entries.read().contains_key(&class)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Ordered copy of every entry, for persistence and reporting
    pub fn snapshot(&self) -> BTreeMap<IncidentClass, Resolution> {
        self.entries
            .read()
            .iter()
            .map(|(class, resolution)| (*class, resolution.clone()))
            .collect()
    }
}
