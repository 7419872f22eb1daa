//! Per-invocation context handed to check bodies.

use super::{ColumnRoles, DatasetRef, Extra, Level, ReportItem};
use crate::error::{Result, TermError};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Everything a check body may know about the invocation it serves.
///
/// Built once per invocation by the orchestrator: the shared column roles of
/// the specification, the check's own parameters and identifying metadata
/// (id, level, order, the dataset(s) involved). Check bodies use it to read
/// their configuration and to create their [`ReportItem`].
#[derive(Debug, Clone)]
pub struct CheckContext {
    id: String,
    description: Option<String>,
    level: Level,
    order: Option<i64>,
    roles: Arc<ColumnRoles>,
    params: BTreeMap<String, JsonValue>,
    inputs: Vec<DatasetRef>,
}

impl CheckContext {
    pub fn new(id: impl Into<String>, level: Level, roles: Arc<ColumnRoles>) -> Self {
        Self {
            id: id.into(),
            description: None,
            level,
            order: None,
            roles,
            params: BTreeMap::new(),
            inputs: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_order(mut self, order: Option<i64>) -> Self {
        self.order = order;
        self
    }

    pub fn with_params(mut self, params: BTreeMap<String, JsonValue>) -> Self {
        self.params = params;
        self
    }

    pub fn with_input(mut self, input: DatasetRef) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn order(&self) -> Option<i64> {
        self.order
    }

    pub fn roles(&self) -> &ColumnRoles {
        &self.roles
    }

    pub fn params(&self) -> &BTreeMap<String, JsonValue> {
        &self.params
    }

    /// The dataset(s) of this invocation: one for single-dataset checks, old
    /// then new for comparison checks.
    pub fn inputs(&self) -> &[DatasetRef] {
        &self.inputs
    }

    /// A parameter of the check.
    pub fn param(&self, name: &str) -> Result<&JsonValue> {
        self.params
            .get(name)
            .ok_or_else(|| TermError::MissingParameter {
                check: self.id.clone(),
                param: name.to_string(),
            })
    }

    /// A parameter of the check, deserialized into `T`.
    pub fn param_as<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let value = self.param(name)?;
        serde_json::from_value(value.clone()).map_err(|e| {
            TermError::Parse(format!(
                "parameter '{name}' of check '{}': {e}",
                self.id
            ))
        })
    }

    /// The column a single-column role points to.
    pub fn role_column(&self, role: &str) -> Result<&str> {
        self.roles.column(role).ok_or_else(|| {
            TermError::Parse(format!(
                "column role '{role}' used by check '{}' is not a single column name",
                self.id
            ))
        })
    }

    /// Starts a report item for this invocation.
    pub fn report(&self, passed: bool) -> ReportItem {
        let item = ReportItem::new(self.id.clone(), self.level, passed)
            .with_order(self.order)
            .with_inputs(self.inputs.clone())
            .with_params(self.params.clone());
        match &self.description {
            Some(description) => item.with_description(description.clone()),
            None => item,
        }
    }

    pub fn passed(&self) -> ReportItem {
        self.report(true)
    }

    pub fn failed(&self, text: impl Into<String>) -> ReportItem {
        self.report(false).with_text(text)
    }

    /// Passes when `faults` lists nothing, fails carrying `faults` otherwise.
    pub fn conditional(&self, faults: impl Into<Extra>) -> ReportItem {
        let faults = faults.into();
        if faults.is_empty() {
            self.passed()
        } else {
            self.report(false).with_extra(faults)
        }
    }
}
