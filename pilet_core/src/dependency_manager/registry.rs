use super::LoadFuture;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// One shared module file, linked once and reference counted across pilets.
#[derive(Clone)]
pub struct SharedDependencyRecord {
    pub name: String,
    pub url: String,
    pub ref_count: usize,
    future: LoadFuture,
}

impl SharedDependencyRecord {
    /// The in-flight or completed load of this file.
    pub fn future(&self) -> LoadFuture {
        self.future.clone()
    }
}

impl fmt::Debug for SharedDependencyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedDependencyRecord")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("ref_count", &self.ref_count)
            .field("settled", &self.future.peek().is_some())
            .finish()
    }
}

/// Point-in-time view of a record, used for inspection and reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencySnapshot {
    pub name: String,
    pub url: String,
    pub ref_count: usize,
}

/// Result of handing a shared file back to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Other pilets still hold the file.
    Retained(usize),
    /// Last holder gone; the record was removed and the url must be unloaded.
    Removed(String),
    /// Nothing registered under that name.
    Unknown,
}

/// Registry of shared module files keyed by file name.
///
/// Lookups and inserts happen under a single guard and never span an await,
/// so at most one record (and one physical fetch) exists per name.
#[derive(Debug, Clone, Default)]
pub struct SharedDependencyRegistry {
    records: Arc<Mutex<HashMap<String, SharedDependencyRecord>>>,
}

impl SharedDependencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, SharedDependencyRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take a reference on `name`, starting its load with `start` if no other
    /// pilet registered it yet. Returns the future to await and whether this
    /// call created the record.
    pub fn acquire<F>(&self, name: &str, url: &str, start: F) -> (LoadFuture, bool)
    where
        F: FnOnce() -> LoadFuture,
    {
        let mut records = self.records();

        if let Some(record) = records.get_mut(name) {
            record.ref_count += 1;
            debug!(
                dependency = name,
                ref_count = record.ref_count,
                "Reusing shared dependency"
            );
            return (record.future.clone(), false);
        }

        let future = start();
        records.insert(
            name.to_string(),
            SharedDependencyRecord {
                name: name.to_string(),
                url: url.to_string(),
                ref_count: 1,
                future: future.clone(),
            },
        );
        debug!(dependency = name, url, "Registered shared dependency");
        (future, true)
    }

    /// Drop one reference on `name`.
    pub fn release(&self, name: &str) -> ReleaseOutcome {
        let mut records = self.records();

        let Some(record) = records.get_mut(name) else {
            return ReleaseOutcome::Unknown;
        };

        record.ref_count = record.ref_count.saturating_sub(1);
        if record.ref_count > 0 {
            debug!(
                dependency = name,
                ref_count = record.ref_count,
                "Shared dependency still in use"
            );
            return ReleaseOutcome::Retained(record.ref_count);
        }

        let url = record.url.clone();
        records.remove(name);
        debug!(dependency = name, url = %url, "Removed shared dependency");
        ReleaseOutcome::Removed(url)
    }

    /// Current reference count of `name`, if registered.
    pub fn ref_count(&self, name: &str) -> Option<usize> {
        self.records().get(name).map(|record| record.ref_count)
    }

    pub fn get(&self, name: &str) -> Option<SharedDependencyRecord> {
        self.records().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    /// All records ordered by name.
    pub fn snapshot(&self) -> Vec<DependencySnapshot> {
        let mut items: Vec<DependencySnapshot> = self
            .records()
            .values()
            .map(|record| DependencySnapshot {
                name: record.name.clone(),
                url: record.url.clone(),
                ref_count: record.ref_count,
            })
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        items
    }
}
