//! Per-run dataset cache.

use super::ColumnRoles;
use crate::error::{ExecutionFault, TermError};
use crate::sources::{Dataset, DatasetLoader};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// The outcome of loading one dataset. Failures are cached too, so a broken
/// file is attempted once per run however many checks need it.
pub type CachedDataset = std::result::Result<Arc<Dataset>, ExecutionFault>;

/// Loads each `(slot, path)` at most once per run.
///
/// An entry of a slot that no comparison check reads can be released as
/// soon as the single-dataset checks on that path are done, so a wildcard
/// slot holds one file at a time. Retained slots stay until the cache is
/// dropped.
#[derive(Debug, Default)]
pub struct DatasetCache {
    entries: BTreeMap<(String, PathBuf), CachedDataset>,
    retained: BTreeSet<String>,
    loads: usize,
}

impl DatasetCache {
    pub fn new<I, S>(retained: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            retained: retained.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Returns the dataset of `slot` at `path`, loading it on first use.
    pub async fn get_or_load(
        &mut self,
        slot: &str,
        path: &Path,
        loader: &dyn DatasetLoader,
        roles: &ColumnRoles,
    ) -> CachedDataset {
        let key = (slot.to_string(), path.to_path_buf());
        if let Some(entry) = self.entries.get(&key) {
            return entry.clone();
        }

        self.loads += 1;
        let entry = match loader.load(path, roles).await {
            Ok(batch) => Dataset::new(path, batch).map(Arc::new),
            Err(e) => Err(e),
        }
        .map_err(|e| load_fault(path, e));

        match &entry {
            Ok(dataset) => debug!(
                slot,
                path = %path.display(),
                rows = dataset.num_rows(),
                fingerprint = dataset.fingerprint(),
                "Loaded dataset"
            ),
            Err(fault) => warn!(slot, path = %path.display(), %fault, "Could not load dataset"),
        }
        self.entries.insert(key, entry.clone());
        entry
    }

    /// Drops the entry of `slot` at `path` unless a comparison check still
    /// needs the slot.
    pub fn release(&mut self, slot: &str, path: &Path) {
        if self.retained.contains(slot) {
            return;
        }
        self.entries.remove(&(slot.to_string(), path.to_path_buf()));
    }

    pub fn is_retained(&self, slot: &str) -> bool {
        self.retained.contains(slot)
    }

    /// Number of loader calls made so far.
    pub fn load_count(&self) -> usize {
        self.loads
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn load_fault(path: &Path, error: TermError) -> ExecutionFault {
    let message = match error {
        TermError::Resource { message, .. } => message,
        other => other.to_string(),
    };
    ExecutionFault::Resource {
        path: path.to_path_buf(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{cohort_batch, InMemoryLoader};

    #[tokio::test]
    async fn test_each_key_loads_once() {
        let loader = InMemoryLoader::new().with_dataset("a.csv", cohort_batch());
        let roles = ColumnRoles::default();
        let mut cache = DatasetCache::new(Vec::<String>::new());

        let first = cache
            .get_or_load("input1", Path::new("a.csv"), &loader, &roles)
            .await
            .unwrap();
        let second = cache
            .get_or_load("input1", Path::new("a.csv"), &loader, &roles)
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.load_count(), 1);
        assert_eq!(loader.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_cached() {
        let loader = InMemoryLoader::new();
        let roles = ColumnRoles::default();
        let mut cache = DatasetCache::default();

        for _ in 0..3 {
            let fault = cache
                .get_or_load("input1", Path::new("gone.csv"), &loader, &roles)
                .await
                .unwrap_err();
            assert_eq!(
                fault,
                ExecutionFault::Resource {
                    path: PathBuf::from("gone.csv"),
                    message: "no such dataset".to_string(),
                }
            );
        }
        assert_eq!(loader.call_count(), 1);
    }

    #[tokio::test]
    async fn test_release_keeps_retained_slots() {
        let loader = InMemoryLoader::new()
            .with_dataset("a.csv", cohort_batch())
            .with_dataset("b.csv", cohort_batch());
        let roles = ColumnRoles::default();
        let mut cache = DatasetCache::new(["input2"]);

        let _ = cache
            .get_or_load("input1", Path::new("a.csv"), &loader, &roles)
            .await;
        let _ = cache
            .get_or_load("input2", Path::new("b.csv"), &loader, &roles)
            .await;
        assert_eq!(cache.len(), 2);

        cache.release("input1", Path::new("a.csv"));
        cache.release("input2", Path::new("b.csv"));
        assert_eq!(cache.len(), 1);
        assert!(cache.is_retained("input2"));

        let _ = cache
            .get_or_load("input2", Path::new("b.csv"), &loader, &roles)
            .await;
        assert_eq!(loader.call_count(), 2);
    }

    #[tokio::test]
    async fn test_release_drops_one_path_at_a_time() {
        let loader = InMemoryLoader::new()
            .with_dataset("cohort_1.csv", cohort_batch())
            .with_dataset("cohort_2.csv", cohort_batch());
        let roles = ColumnRoles::default();
        let mut cache = DatasetCache::new(Vec::<String>::new());

        for name in ["cohort_1.csv", "cohort_2.csv"] {
            let path = Path::new(name);
            let _ = cache.get_or_load("input1", path, &loader, &roles).await;
            assert_eq!(cache.len(), 1);
            cache.release("input1", path);
            assert!(cache.is_empty());
        }
        assert_eq!(loader.call_count(), 2);
    }
}
