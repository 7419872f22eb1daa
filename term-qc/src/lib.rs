//! # term-qc - declarative data quality control
//!
//! term-qc runs batteries of quality-control checks over tabular datasets,
//! driven by a YAML or JSON specification. A specification names the input
//! datasets, the roles of well-known columns, and which checks to run on which
//! inputs at which severity; term-qc validates it, plans the run, loads every
//! dataset once, executes each check behind a fault boundary, and produces a
//! severity-ordered report.
//!
//! ## Quick Start
//!
//! ```yaml
//! general:
//!   input1: data/cohort_2023.csv
//!   input2: data/cohort_2024.csv
//!   output_dir: qc_out/
//!   source: csv
//!   patient_id_col: PATIENT_ID
//!   matched_patient_id_col: MATCHED_ID
//!   target_col: TARGET
//!   date_cols: [_dt]
//!   count_cols: [_count]
//!   freq_cols: [_freq]
//!   first_exp_date_cols: [FIRST_EXP_dt]
//!   last_exp_date_cols: [LAST_EXP_dt]
//! checks:
//!   qc4:
//!     input_file: input2
//!     level: error
//!     order: 1
//!   qc46:
//!     input_file: [input1, input2]
//!     level: warning
//!     order: 2
//! ```
//!
//! ```rust,no_run
//! use term_qc::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let report = Driver::new(DriverConfig::default()).run_path("qc.yml").await?;
//! for item in report.failures() {
//!     println!("{}", item.summarise());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`core`**: specification types, validation, planning, orchestration and
//!   the report model
//! - **`checks`**: the check registry and the built-in checks
//! - **`sources`**: dataset loading and wildcard path resolution
//! - **`formatters`**: human, JSON and Markdown rendering of reports
//! - **`logging`**: `tracing` subscriber setup
//!
//! ## Failure handling
//!
//! Specification defects are reported as [`error::ConfigError`] before
//! anything is loaded. Once running, a dataset that cannot be loaded or a
//! check that raises becomes a failed report item and the run continues;
//! [`core::FaultPolicy::FailFast`] aborts on the first check fault instead.

pub mod checks;
pub mod core;
pub mod error;
pub mod formatters;
pub mod logging;
pub mod prelude;
pub mod sources;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_fixtures;
