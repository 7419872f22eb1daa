//! Tabular export of a report.
//!
//! A report flattens into one [`ReportRow`] per item. Scalar diagnostic
//! payloads stay in the row; structured ones (key lists, indices, statistics
//! tables) are moved to side [`Artifact`]s and the row carries a reference
//! token `extra_<row>_<id>` instead. [`ReportTable::write`] puts the table in
//! `report.csv` and every artifact in `<token>.json` next to it.

use super::{Extra, Report, ReportItem};
use crate::error::{ErrorContext, Result};
use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray, UInt8Array};
use arrow::csv::WriterBuilder;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Name of the table file written by [`ReportTable::write`].
pub const REPORT_FILE_NAME: &str = "report.csv";

const LIST_SEPARATOR: &str = ";";

/// One flattened report item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub id: String,
    pub description: Option<String>,
    pub passed: bool,
    pub level: String,
    pub level_rank: u8,
    pub order: Option<i64>,
    /// Scalar payload, or the token of the artifact holding the payload
    pub extra: Option<String>,
    /// Slot name(s), `;`-separated for comparisons
    pub input_file: String,
    /// Dataset path(s), `;`-separated for comparisons
    pub path: String,
    /// Content fingerprint(s), `;`-separated, empty when never loaded
    pub fingerprint: String,
    /// Seconds
    pub exec_time: f64,
    pub text: Option<String>,
}

/// A structured payload moved out of the table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artifact {
    pub token: String,
    pub check: String,
    pub payload: Extra,
}

impl Artifact {
    pub fn file_name(&self) -> String {
        format!("{}.json", self.token)
    }
}

/// The externalized form of a [`Report`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportTable {
    pub rows: Vec<ReportRow>,
    pub artifacts: Vec<Artifact>,
}

impl Report {
    /// Flattens the report, in its current item order.
    pub fn to_table(&self) -> ReportTable {
        let mut table = ReportTable::default();
        for (row, item) in self.items().iter().enumerate() {
            let extra = match item.extra() {
                None => None,
                Some(Extra::Text(text)) => Some(text.clone()),
                Some(payload) => {
                    let token = format!("extra_{row}_{}", item.id());
                    table.artifacts.push(Artifact {
                        token: token.clone(),
                        check: item.id().to_string(),
                        payload: payload.clone(),
                    });
                    Some(token)
                }
            };
            table.rows.push(flatten(item, extra));
        }
        table
    }
}

fn flatten(item: &ReportItem, extra: Option<String>) -> ReportRow {
    let join = |values: Vec<String>| values.join(LIST_SEPARATOR);
    let inputs = item.inputs();
    ReportRow {
        id: item.id().to_string(),
        description: item.description().map(str::to_string),
        passed: item.passed(),
        level: item.level().to_string(),
        level_rank: item.level().rank(),
        order: item.order(),
        extra,
        input_file: join(inputs.iter().map(|input| input.slot.clone()).collect()),
        path: join(
            inputs
                .iter()
                .map(|input| input.path.display().to_string())
                .collect(),
        ),
        fingerprint: join(
            inputs
                .iter()
                .map(|input| input.fingerprint.clone().unwrap_or_default())
                .collect(),
        ),
        exec_time: item.exec_time().as_secs_f64(),
        text: item.text().map(str::to_string),
    }
}

impl ReportTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("description", DataType::Utf8, true),
            Field::new("passed", DataType::Boolean, false),
            Field::new("level", DataType::Utf8, false),
            Field::new("level_rank", DataType::UInt8, false),
            Field::new("order", DataType::Int64, true),
            Field::new("extra", DataType::Utf8, true),
            Field::new("input_file", DataType::Utf8, false),
            Field::new("path", DataType::Utf8, false),
            Field::new("fingerprint", DataType::Utf8, false),
            Field::new("exec_time", DataType::Float64, false),
            Field::new("text", DataType::Utf8, true),
        ]))
    }

    /// The table as a single Arrow batch.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let strings = |f: fn(&ReportRow) -> &str| -> ArrayRef {
            Arc::new(StringArray::from_iter_values(self.rows.iter().map(f)))
        };
        let optional = |f: fn(&ReportRow) -> Option<&str>| -> ArrayRef {
            Arc::new(self.rows.iter().map(f).collect::<StringArray>())
        };

        let columns: Vec<ArrayRef> = vec![
            strings(|row| row.id.as_str()),
            optional(|row| row.description.as_deref()),
            Arc::new(self.rows.iter().map(|row| Some(row.passed)).collect::<BooleanArray>()),
            strings(|row| row.level.as_str()),
            Arc::new(UInt8Array::from_iter_values(self.rows.iter().map(|row| row.level_rank))),
            Arc::new(self.rows.iter().map(|row| row.order).collect::<Int64Array>()),
            optional(|row| row.extra.as_deref()),
            strings(|row| row.input_file.as_str()),
            strings(|row| row.path.as_str()),
            strings(|row| row.fingerprint.as_str()),
            Arc::new(Float64Array::from_iter_values(self.rows.iter().map(|row| row.exec_time))),
            optional(|row| row.text.as_deref()),
        ];
        Ok(RecordBatch::try_new(Self::schema(), columns)?)
    }

    /// Writes `report.csv` and one JSON file per artifact into `dir`,
    /// creating it if needed. Returns the written paths, table first.
    pub fn write(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;

        let table_path = dir.join(REPORT_FILE_NAME);
        let file = File::create(&table_path)?;
        let mut writer = WriterBuilder::new().with_header(true).build(file);
        writer.write(&self.to_record_batch()?)?;
        debug!(path = %table_path.display(), rows = self.rows.len(), "Wrote report table");

        let mut written = vec![table_path];
        for artifact in &self.artifacts {
            let path = dir.join(artifact.file_name());
            let file = File::create(&path)?;
            serde_json::to_writer_pretty(file, &artifact.payload)?;
            written.push(path);
        }

        info!(
            dir = %dir.display(),
            rows = self.rows.len(),
            artifacts = self.artifacts.len(),
            "Exported report"
        );
        Ok(written)
    }
}
