//! The check registry and the built-in check catalog.
//!
//! Every check the orchestrator can run is registered here under an
//! identifier of the form `qc<N>`. A registration carries the callable and
//! catalog metadata: what the check does, whether it inspects one dataset or
//! compares two, and which parameters it cannot run without.
//!
//! Check bodies are plain functions (or any type implementing
//! [`SingleCheck`] / [`CompareCheck`]):
//!
//! ```rust
//! use term_qc::checks::{CheckInfo, CheckKind, CheckRegistry};
//! use term_qc::core::{CheckContext, ReportItem};
//! use term_qc::error::Result;
//! use term_qc::sources::Dataset;
//!
//! fn not_empty(dataset: &Dataset, ctx: &CheckContext) -> Result<ReportItem> {
//!     if dataset.num_rows() > 0 {
//!         Ok(ctx.passed())
//!     } else {
//!         Ok(ctx.failed("dataset has no rows"))
//!     }
//! }
//!
//! let mut builder = CheckRegistry::builder();
//! builder.single(CheckInfo::new("qc900", "Dataset has rows"), not_empty);
//! let registry = builder.build().unwrap();
//! assert_eq!(registry.kind("qc900"), Some(CheckKind::Single));
//! ```

use crate::core::{CheckContext, ReportItem};
use crate::error::{Result, TermError};
use crate::sources::Dataset;
use arrow::array::{Array, ArrayRef, Float32Array, Float64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub mod columns;
pub mod compare;
pub mod identifiers;

static CHECK_ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^qc\d{1,3}$").expect("Hard-coded regex pattern should be valid"));

static GLOBAL_REGISTRY: Lazy<Arc<CheckRegistry>> = Lazy::new(|| {
    Arc::new(CheckRegistry::builtin().expect("Built-in checks should register cleanly"))
});

/// Returns true if `id` follows the check naming convention (`qc1` .. `qc999`).
pub fn is_check_id(id: &str) -> bool {
    CHECK_ID_REGEX.is_match(id)
}

/// A check that inspects a single dataset.
pub trait SingleCheck: Send + Sync {
    fn run(&self, dataset: &Dataset, ctx: &CheckContext) -> Result<ReportItem>;
}

/// A check that compares an old dataset with a new one.
pub trait CompareCheck: Send + Sync {
    fn run(&self, old: &Dataset, new: &Dataset, ctx: &CheckContext) -> Result<ReportItem>;
}

impl<F> SingleCheck for F
where
    F: Fn(&Dataset, &CheckContext) -> Result<ReportItem> + Send + Sync,
{
    fn run(&self, dataset: &Dataset, ctx: &CheckContext) -> Result<ReportItem> {
        self(dataset, ctx)
    }
}

impl<F> CompareCheck for F
where
    F: Fn(&Dataset, &Dataset, &CheckContext) -> Result<ReportItem> + Send + Sync,
{
    fn run(&self, old: &Dataset, new: &Dataset, ctx: &CheckContext) -> Result<ReportItem> {
        self(old, new, ctx)
    }
}

/// Whether a check needs one dataset or two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckKind {
    Single,
    Compare,
}

/// Catalog metadata of a registered check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckInfo {
    pub id: String,
    pub description: String,
    /// Parameters that must appear in the check's `params`
    pub required_params: Vec<String>,
}

impl CheckInfo {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            required_params: Vec::new(),
        }
    }

    /// Declares the parameters the check cannot run without.
    pub fn requires<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_params = params.into_iter().map(Into::into).collect();
        self
    }
}

/// The callable of a registered check.
#[derive(Clone)]
pub enum CheckBody {
    Single(Arc<dyn SingleCheck>),
    Compare(Arc<dyn CompareCheck>),
}

impl CheckBody {
    pub fn kind(&self) -> CheckKind {
        match self {
            CheckBody::Single(_) => CheckKind::Single,
            CheckBody::Compare(_) => CheckKind::Compare,
        }
    }
}

impl fmt::Debug for CheckBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckBody::Single(_) => f.write_str("Single(..)"),
            CheckBody::Compare(_) => f.write_str("Compare(..)"),
        }
    }
}

/// A check as stored in the registry.
#[derive(Debug, Clone)]
pub struct RegisteredCheck {
    pub info: CheckInfo,
    pub body: CheckBody,
}

impl RegisteredCheck {
    pub fn kind(&self) -> CheckKind {
        self.body.kind()
    }
}

/// Collects registrations before they are frozen into a [`CheckRegistry`].
#[derive(Debug, Default)]
pub struct CheckRegistryBuilder {
    checks: Vec<RegisteredCheck>,
}

impl CheckRegistryBuilder {
    /// Registers a single-dataset check.
    pub fn single(&mut self, info: CheckInfo, check: impl SingleCheck + 'static) -> &mut Self {
        self.checks.push(RegisteredCheck {
            info,
            body: CheckBody::Single(Arc::new(check)),
        });
        self
    }

    /// Registers a comparison check.
    pub fn compare(&mut self, info: CheckInfo, check: impl CompareCheck + 'static) -> &mut Self {
        self.checks.push(RegisteredCheck {
            info,
            body: CheckBody::Compare(Arc::new(check)),
        });
        self
    }

    /// Freezes the registrations.
    ///
    /// Fails if an identifier does not follow the naming convention or is
    /// registered twice.
    pub fn build(self) -> Result<CheckRegistry> {
        let mut checks = BTreeMap::new();
        for check in self.checks {
            let id = check.info.id.clone();
            if !is_check_id(&id) {
                return Err(TermError::Registry(format!(
                    "check id '{id}' must look like qc<N>"
                )));
            }
            if checks.insert(id.clone(), check).is_some() {
                return Err(TermError::Registry(format!(
                    "check id '{id}' is registered twice"
                )));
            }
        }
        Ok(CheckRegistry { checks })
    }
}

/// Immutable mapping from check identifier to callable and metadata.
#[derive(Debug, Clone)]
pub struct CheckRegistry {
    checks: BTreeMap<String, RegisteredCheck>,
}

impl CheckRegistry {
    pub fn builder() -> CheckRegistryBuilder {
        CheckRegistryBuilder::default()
    }

    /// A registry holding every check shipped with the crate.
    pub fn builtin() -> Result<Self> {
        let mut builder = Self::builder();
        columns::register(&mut builder);
        identifiers::register(&mut builder);
        compare::register(&mut builder);
        builder.build()
    }

    /// The process-wide built-in registry.
    pub fn global() -> Arc<CheckRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    pub fn get(&self, id: &str) -> Option<&RegisteredCheck> {
        self.checks.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.checks.contains_key(id)
    }

    pub fn kind(&self, id: &str) -> Option<CheckKind> {
        self.get(id).map(RegisteredCheck::kind)
    }

    /// Returns true if `id` is a registered comparison check.
    pub fn is_comparison(&self, id: &str) -> bool {
        self.kind(id) == Some(CheckKind::Compare)
    }

    /// Registered identifiers in lexicographic order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.checks.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

/// Per-row flags marking missing values: nulls, and NaN in float columns.
pub(crate) fn missing_mask(array: &ArrayRef) -> Vec<bool> {
    let is_nan = |row: usize| match array.data_type() {
        DataType::Float64 => array
            .as_any()
            .downcast_ref::<Float64Array>()
            .is_some_and(|values| values.value(row).is_nan()),
        DataType::Float32 => array
            .as_any()
            .downcast_ref::<Float32Array>()
            .is_some_and(|values| values.value(row).is_nan()),
        _ => false,
    };
    (0..array.len())
        .map(|row| array.is_null(row) || is_nan(row))
        .collect()
}

/// Row values rendered as strings, `None` where the value is missing.
pub(crate) fn string_values(array: &ArrayRef) -> Result<Vec<Option<String>>> {
    let missing = missing_mask(array);
    let rendered = cast(array, &DataType::Utf8)?;
    let strings = rendered
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| TermError::Internal("Utf8 cast did not yield a StringArray".to_string()))?;
    Ok(strings
        .iter()
        .zip(missing)
        .map(|(value, missing)| if missing { None } else { value.map(str::to_string) })
        .collect())
}

/// Row values of a numeric column as `f64`, `None` where the value is missing.
pub(crate) fn numeric_values(array: &ArrayRef) -> Result<Vec<Option<f64>>> {
    let floats = cast(array, &DataType::Float64)?;
    let floats = floats
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| TermError::Internal("Float64 cast did not yield a Float64Array".to_string()))?;
    Ok(floats
        .iter()
        .map(|value| value.filter(|v| !v.is_nan()))
        .collect())
}
