//! File-backed dataset loader.

use super::DatasetLoader;
use crate::core::{ColumnRoles, SourceKind};
use crate::error::{Result, TermError};
use arrow::compute::concat_batches;
use arrow::ipc::reader::FileReader;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use datafusion::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Options for reading input files.
#[derive(Debug, Clone)]
pub struct FileLoaderOptions {
    /// Whether CSV files have a header row
    pub has_header: bool,
    /// CSV field delimiter (default: ',')
    pub delimiter: u8,
    /// Maximum records to read for schema inference
    pub schema_infer_max_records: usize,
}

impl Default for FileLoaderOptions {
    fn default() -> Self {
        Self {
            has_header: true,
            delimiter: b',',
            schema_infer_max_records: 1000,
        }
    }
}

/// Loads whole files into a single [`RecordBatch`].
///
/// CSV, Parquet and NDJSON go through a DataFusion session created for the
/// load; Feather (Arrow IPC file format) is read directly.
///
/// # Examples
///
/// ```rust,no_run
/// use term_qc::core::{ColumnRoles, SourceKind};
/// use term_qc::sources::{DatasetLoader, FileLoader};
/// use std::path::Path;
///
/// # async fn example() -> term_qc::error::Result<()> {
/// let loader = FileLoader::new(SourceKind::Csv);
/// let batch = loader.load(Path::new("data/cohort.csv"), &ColumnRoles::default()).await?;
/// println!("{} rows", batch.num_rows());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FileLoader {
    source: SourceKind,
    options: FileLoaderOptions,
}

impl FileLoader {
    pub fn new(source: SourceKind) -> Self {
        Self::with_options(source, FileLoaderOptions::default())
    }

    pub fn with_options(source: SourceKind, options: FileLoaderOptions) -> Self {
        Self { source, options }
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    async fn read_with_datafusion(&self, path: &Path) -> Result<RecordBatch> {
        let location = path
            .to_str()
            .ok_or_else(|| TermError::resource(path, "path is not valid UTF-8"))?;
        // DataFusion filters listed files by extension; accept whatever the
        // file is named.
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();

        let ctx = SessionContext::new();
        let frame = match self.source {
            SourceKind::Csv => {
                let options = CsvReadOptions::new()
                    .has_header(self.options.has_header)
                    .delimiter(self.options.delimiter)
                    .schema_infer_max_records(self.options.schema_infer_max_records)
                    .file_extension(&extension);
                ctx.read_csv(location, options).await
            }
            SourceKind::Parquet => {
                let mut options = ParquetReadOptions::default();
                options.file_extension = &extension;
                ctx.read_parquet(location, options).await
            }
            SourceKind::Json => {
                let mut options = NdJsonReadOptions::default();
                options.file_extension = &extension;
                options.schema_infer_max_records = self.options.schema_infer_max_records;
                ctx.read_json(location, options).await
            }
            SourceKind::Feather => {
                return Err(TermError::Internal(
                    "feather files are not read through DataFusion".to_string(),
                ))
            }
        }
        .map_err(|e| TermError::resource_with_source(path, "could not open", Box::new(e)))?;

        let schema = Arc::clone(frame.schema().inner());
        let batches = frame
            .collect()
            .await
            .map_err(|e| TermError::resource_with_source(path, "could not read", Box::new(e)))?;
        Ok(concat_batches(&schema, &batches)?)
    }

    fn read_feather(&self, path: &Path) -> Result<RecordBatch> {
        let file = std::fs::File::open(path).map_err(|e| {
            TermError::resource_with_source(path, "could not open", Box::new(e))
        })?;
        let reader = FileReader::try_new(file, None).map_err(|e| {
            TermError::resource_with_source(path, "not an Arrow IPC file", Box::new(e))
        })?;
        let schema = reader.schema();
        let batches = reader.collect::<std::result::Result<Vec<_>, _>>().map_err(|e| {
            TermError::resource_with_source(path, "could not read", Box::new(e))
        })?;
        Ok(concat_batches(&schema, &batches)?)
    }
}

#[async_trait]
impl DatasetLoader for FileLoader {
    #[instrument(skip(self, _roles), fields(source = %self.source))]
    async fn load(&self, path: &Path, _roles: &ColumnRoles) -> Result<RecordBatch> {
        if !path.exists() {
            return Err(TermError::resource(path, "file does not exist"));
        }
        let batch = match self.source {
            SourceKind::Feather => self.read_feather(path)?,
            _ => self.read_with_datafusion(path).await?,
        };
        debug!(
            path = %path.display(),
            rows = batch.num_rows(),
            columns = batch.num_columns(),
            "Loaded dataset"
        );
        Ok(batch)
    }

    fn description(&self) -> String {
        format!("{} file loader", self.source)
    }
}
