//! Shared fixtures for unit tests and downstream test suites.
//!
//! Enabled for this crate's tests and, for other crates, through the
//! `test-utils` feature.

use crate::checks::CheckRegistry;
use crate::core::{ColumnRoles, RawSpecification, Specification, Validator};
use crate::error::{Result, TermError};
use crate::sources::DatasetLoader;
use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// A complete specification: two inputs, two single-dataset checks and one
/// comparison.
pub const SAMPLE_SPEC_YAML: &str = r#"
general:
  input1: data/cohort_old.csv
  input2: data/cohort_new.csv
  output_dir: out/
  source: csv
  patient_id_col: PATIENT_ID
  matched_patient_id_col: MATCHED_ID
  target_col: TARGET
  date_cols: [_dt]
  count_cols: [_count]
  freq_cols: [_freq]
  first_exp_date_cols: [FIRST_EXP_dt]
  last_exp_date_cols: [LAST_EXP_dt]
checks:
  qc1:
    input_file: input1
    level: error
    order: 1
  qc6:
    input_file: input2
    level: warning
    order: 2
  qc46:
    input_file: [input1, input2]
    level: warning
    order: 3
"#;

/// A five-row cohort:
///
/// | row | PATIENT_ID | A_count | B_freq | EMPTY_dt |
/// |-----|------------|---------|--------|----------|
/// | 0   | P1         | 1       | 0.5    |          |
/// | 1   | P2         |         | 1.0    |          |
/// | 2   | P3         | 3       | NaN    |          |
/// | 3   | P2         | 4       | 2.0    |          |
/// | 4   |            |         |        |          |
pub fn cohort_batch() -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("PATIENT_ID", DataType::Utf8, true),
        Field::new("A_count", DataType::Int64, true),
        Field::new("B_freq", DataType::Float64, true),
        Field::new("EMPTY_dt", DataType::Utf8, true),
    ]));
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(vec![
                Some("P1"),
                Some("P2"),
                Some("P3"),
                Some("P2"),
                None,
            ])),
            Arc::new(Int64Array::from(vec![Some(1), None, Some(3), Some(4), None])),
            Arc::new(Float64Array::from(vec![
                Some(0.5),
                Some(1.0),
                Some(f64::NAN),
                Some(2.0),
                None,
            ])),
            Arc::new(StringArray::from(vec![None::<&str>; 5])),
        ],
    )
    .expect("Fixture batch should match its schema")
}

/// [`SAMPLE_SPEC_YAML`], validated against the built-in registry.
pub fn validated_specification() -> Specification {
    let raw = RawSpecification::from_yaml_str(SAMPLE_SPEC_YAML)
        .expect("Sample specification should parse");
    Validator::new(&CheckRegistry::global())
        .validate(&raw)
        .expect("Sample specification should validate")
}

/// Serves batches from memory and records every load request.
#[derive(Debug, Default)]
pub struct InMemoryLoader {
    datasets: HashMap<PathBuf, RecordBatch>,
    calls: Mutex<Vec<PathBuf>>,
}

impl InMemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(mut self, path: impl Into<PathBuf>, batch: RecordBatch) -> Self {
        self.datasets.insert(path.into(), batch);
        self
    }

    /// Paths requested so far, in request order.
    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }
}

#[async_trait]
impl DatasetLoader for InMemoryLoader {
    async fn load(&self, path: &Path, _roles: &ColumnRoles) -> Result<RecordBatch> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(path.to_path_buf());
        }
        self.datasets
            .get(path)
            .cloned()
            .ok_or_else(|| TermError::resource(path, "no such dataset"))
    }

    fn description(&self) -> String {
        format!("in-memory loader with {} datasets", self.datasets.len())
    }
}
