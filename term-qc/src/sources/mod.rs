//! Dataset loading and input path resolution.
//!
//! The orchestrator never reads files itself. It goes through two
//! collaborators defined here:
//!
//! - [`DatasetLoader`] turns a concrete path into an Arrow [`RecordBatch`].
//!   [`FileLoader`] is the default implementation (CSV, Parquet and NDJSON via
//!   DataFusion, Feather via Arrow IPC).
//! - [`PathResolver`] expands wildcard input slots into concrete paths at plan
//!   time. [`GlobResolver`] is the default implementation.

use crate::core::ColumnRoles;
use crate::error::{Result, TermError};
use arrow::array::ArrayRef;
use arrow::datatypes::SchemaRef;
use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fmt::Debug;
use std::path::{Path, PathBuf};

mod file;
mod resolver;

pub use file::{FileLoader, FileLoaderOptions};
pub use resolver::{GlobResolver, PathResolver};

/// A loaded, read-only dataset together with its content fingerprint.
#[derive(Debug, Clone)]
pub struct Dataset {
    path: PathBuf,
    batch: RecordBatch,
    fingerprint: String,
}

impl Dataset {
    /// Wraps a batch loaded from `path`, fingerprinting its content.
    pub fn new(path: impl Into<PathBuf>, batch: RecordBatch) -> Result<Self> {
        let fingerprint = fingerprint(&batch)?;
        Ok(Self {
            path: path.into(),
            batch,
            fingerprint,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    /// Column names in dataset order.
    pub fn columns(&self) -> Vec<&str> {
        self.batch
            .schema_ref()
            .fields()
            .iter()
            .map(|field| field.name().as_str())
            .collect()
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// A column by name.
    pub fn column(&self, name: &str) -> Result<&ArrayRef> {
        self.batch
            .column_by_name(name)
            .ok_or_else(|| TermError::ColumnNotFound {
                column: name.to_string(),
            })
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

/// Content-derived identity of a batch: hex SHA-256 of its Arrow IPC stream
/// encoding. Equal data with equal schema gives equal fingerprints.
pub fn fingerprint(batch: &RecordBatch) -> Result<String> {
    let mut writer = StreamWriter::try_new(Vec::new(), batch.schema_ref())?;
    writer.write(batch)?;
    writer.finish()?;
    let bytes = writer.into_inner()?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Loads datasets for the orchestrator.
///
/// Implementations must not cache on their own account; the orchestrator
/// guarantees each input is requested at most once per run. A load failure is
/// reported as an error and becomes a failed report item for every check that
/// needed the dataset.
#[async_trait]
pub trait DatasetLoader: Debug + Send + Sync {
    /// Loads the dataset stored at `path`.
    ///
    /// `roles` carries the column-role mappings of the specification, for
    /// loaders that treat some columns specially.
    async fn load(&self, path: &Path, roles: &ColumnRoles) -> Result<RecordBatch>;

    /// Returns a human-readable description of this loader.
    fn description(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::cohort_batch;

    #[test]
    fn test_dataset_accessors() {
        let dataset = Dataset::new("cohort.csv", cohort_batch()).unwrap();
        assert_eq!(dataset.path(), Path::new("cohort.csv"));
        assert_eq!(dataset.columns()[0], "PATIENT_ID");
        assert_eq!(dataset.num_rows(), 5);
        assert!(dataset.column("A_count").is_ok());
        assert!(matches!(
            dataset.column("missing"),
            Err(TermError::ColumnNotFound { .. })
        ));
    }

    #[test]
    fn test_fingerprint_is_content_derived() {
        let a = fingerprint(&cohort_batch()).unwrap();
        let b = fingerprint(&cohort_batch()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let sliced = cohort_batch().slice(0, 3);
        assert_ne!(a, fingerprint(&sliced).unwrap());
    }
}
