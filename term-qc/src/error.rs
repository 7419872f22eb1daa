//! Error types for the term-qc orchestration engine.
//!
//! Three families of failure exist at runtime:
//!
//! - [`ConfigError`]: defects in the QC specification. Fatal to a run and
//!   always reported before any check executes.
//! - Resource failures ([`TermError::Resource`]): a dataset or auxiliary file
//!   could not be loaded. Scoped to the report item of the check that needed it.
//! - Check faults ([`TermError::CheckFault`]): anything else a check body
//!   raises. Scoped to that check's report item unless the run is strict.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the term-qc library.
#[derive(Error, Debug)]
pub enum TermError {
    /// The QC specification is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A dataset or auxiliary file could not be loaded or parsed.
    #[error("Resource error for '{}': {message}", .path.display())]
    Resource {
        /// Path of the resource that failed to load
        path: PathBuf,
        /// Detailed error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A check body failed while evaluating.
    #[error("Check '{check}' raised: {message}")]
    CheckFault {
        /// Identifier of the check that failed
        check: String,
        /// Detailed error message
        message: String,
    },

    /// The check registry was assembled incorrectly.
    #[error("Registry error: {0}")]
    Registry(String),

    /// Error from DataFusion operations.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error when parsing or processing data.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error when a required column is not found in the dataset.
    #[error("Column '{column}' not found in dataset")]
    ColumnNotFound { column: String },

    /// A check was invoked without a parameter it needs.
    #[error("Check '{check}' needs parameter '{param}'")]
    MissingParameter { check: String, param: String },

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, TermError>`.
pub type Result<T> = std::result::Result<T, TermError>;

impl TermError {
    /// Creates a new resource error.
    pub fn resource(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Resource {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new resource error with a source error.
    pub fn resource_with_source(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Resource {
            path: path.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates a new check fault.
    pub fn check_fault(check: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CheckFault {
            check: check.into(),
            message: message.into(),
        }
    }

    /// Returns true if this error is a resource failure.
    pub fn is_resource(&self) -> bool {
        matches!(self, Self::Resource { .. } | Self::Io(_))
    }
}

impl From<serde_json::Error> for TermError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<std::fmt::Error> for TermError {
    fn from(e: std::fmt::Error) -> Self {
        Self::Internal(format!("formatting failed: {e}"))
    }
}

/// Structural and semantic defects of a QC specification.
///
/// The `Display` form of each variant is the diagnostic shown to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("could not parse the specification: {0}")]
    Parse(String),

    #[error("you need to specify a 'general' section")]
    MissingGeneral,

    #[error("the 'general' section is empty")]
    EmptyGeneral,

    #[error("you need to specify at least one input file (input1, input2, ...)")]
    NoInputs,

    #[error("input slot '{slot}' must be a path string")]
    InvalidInputPath { slot: String },

    #[error("you need to specify the output_dir")]
    MissingOutputDir,

    #[error("you need to specify the source of your data, one of: {allowed}")]
    MissingSource { allowed: String },

    #[error("source must be one of: {allowed}, found '{found}'")]
    InvalidSource { found: String, allowed: String },

    #[error("the general section must define these column roles: {}", .missing.join(", "))]
    MissingRoles { missing: Vec<String> },

    #[error("you need to specify a 'checks' section")]
    MissingChecks,

    #[error("you need to specify at least one check")]
    NoChecks,

    #[error("check '{check}' is not a registered check")]
    UnknownCheck { check: String },

    #[error("check '{check}' must define these fields: {}", .missing.join(", "))]
    MissingCheckFields { check: String, missing: Vec<String> },

    #[error("check '{check}' has severity level '{found}', expected one of error, warning, info")]
    InvalidLevel { check: String, found: String },

    #[error("check '{check}' has a malformed input_file, expected a slot name or a list of slot names")]
    InvalidInputRef { check: String },

    #[error("check '{check}' references input '{slot}' which is not listed in the general section")]
    UnknownInput { check: String, slot: String },

    #[error("check '{check}' references input '{slot}' more than once")]
    DuplicateInput { check: String, slot: String },

    #[error("comparison check '{check}' must reference exactly two inputs, found {found}")]
    ComparisonArity { check: String, found: usize },

    #[error("comparison check '{check}' references input '{slot}' twice")]
    ComparisonSameInput { check: String, slot: String },

    #[error("comparison check '{check}' cannot use multi-file input '{slot}'")]
    ComparisonGlobInput { check: String, slot: String },

    #[error("check '{check}' has a non-integer order")]
    InvalidOrder { check: String },

    #[error("check '{check}' has malformed params, expected a mapping")]
    InvalidParams { check: String },

    #[error("check '{check}' needs these params: {}", .missing.join(", "))]
    MissingParams { check: String, missing: Vec<String> },

    #[error("checks '{first}' and '{second}' share order {order}, no two checks may have the same order")]
    DuplicateOrder {
        order: i64,
        first: String,
        second: String,
    },
}

/// The error side of a single check invocation.
///
/// Produced by the orchestrator's call boundary and turned into a failed
/// report item unless the run is strict.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionFault {
    #[error("could not load '{}': {message}", .path.display())]
    Resource { path: PathBuf, message: String },

    #[error("check '{check}' raised: {message}")]
    Check { check: String, message: String },
}

impl ExecutionFault {
    /// Classifies an error raised inside the boundary of `check`.
    pub fn from_error(check: &str, error: TermError) -> Self {
        match error {
            TermError::Resource { path, message, .. } => Self::Resource { path, message },
            TermError::CheckFault { check, message } => Self::Check { check, message },
            other => Self::Check {
                check: check.to_string(),
                message: other.to_string(),
            },
        }
    }

    /// The diagnostic recorded on the failed report item.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl From<ExecutionFault> for TermError {
    fn from(fault: ExecutionFault) -> Self {
        match fault {
            ExecutionFault::Resource { path, message } => TermError::resource(path, message),
            ExecutionFault::Check { check, message } => TermError::CheckFault { check, message },
        }
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<TermError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| wrap(msg, e.into()))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| wrap(&f(), e.into()))
    }
}

fn wrap(msg: &str, error: TermError) -> TermError {
    match error {
        TermError::Resource {
            path,
            message,
            source,
        } => TermError::Resource {
            path,
            message: format!("{msg}: {message}"),
            source,
        },
        TermError::Internal(inner) => TermError::Internal(format!("{msg}: {inner}")),
        other => TermError::Internal(format!("{msg}: {other}")),
    }
}
