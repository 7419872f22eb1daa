//! Report items and the report aggregate.

use super::{Level, Specification};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

/// Identifies one dataset a check ran against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRef {
    /// Input slot name, e.g. `input1`
    pub slot: String,
    /// Concrete path the slot resolved to
    pub path: PathBuf,
    /// Content fingerprint; absent when the dataset could not be loaded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl DatasetRef {
    pub fn new(slot: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            slot: slot.into(),
            path: path.into(),
            fingerprint: None,
        }
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }
}

/// A small table of statistics attached to a report item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsTable {
    /// Names of the value columns
    pub columns: Vec<String>,
    pub rows: Vec<StatsRow>,
}

/// One labelled row of a [`StatsTable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsRow {
    pub label: String,
    pub values: Vec<Option<f64>>,
}

impl StatsTable {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, label: impl Into<String>, values: Vec<Option<f64>>) {
        self.rows.push(StatsRow {
            label: label.into(),
            values,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Diagnostic payload of a report item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Extra {
    /// Faulty column names or identifier values
    Keys(Vec<String>),
    /// Faulty row indices
    Indices(Vec<u64>),
    /// What disappeared and what appeared between two datasets
    MissingVsNew {
        missing: Vec<String>,
        new: Vec<String>,
    },
    /// Descriptive statistics
    Table(StatsTable),
    /// Free-form text
    Text(String),
}

impl Extra {
    /// Returns true if the payload lists no faults.
    pub fn is_empty(&self) -> bool {
        match self {
            Extra::Keys(keys) => keys.is_empty(),
            Extra::Indices(indices) => indices.is_empty(),
            Extra::MissingVsNew { missing, new } => missing.is_empty() && new.is_empty(),
            Extra::Table(table) => table.is_empty(),
            Extra::Text(text) => text.is_empty(),
        }
    }

    /// Scalar payloads stay inline in the report table; the rest are exported
    /// as side artifacts.
    pub fn is_scalar(&self) -> bool {
        matches!(self, Extra::Text(_))
    }

    /// Number of entries in the payload.
    pub fn len(&self) -> usize {
        match self {
            Extra::Keys(keys) => keys.len(),
            Extra::Indices(indices) => indices.len(),
            Extra::MissingVsNew { missing, new } => missing.len() + new.len(),
            Extra::Table(table) => table.rows.len(),
            Extra::Text(_) => 1,
        }
    }
}

impl From<Vec<String>> for Extra {
    fn from(keys: Vec<String>) -> Self {
        Extra::Keys(keys)
    }
}

impl From<Vec<u64>> for Extra {
    fn from(indices: Vec<u64>) -> Self {
        Extra::Indices(indices)
    }
}

/// The outcome of one check invocation.
///
/// Created once per invocation, either by the check body (through
/// [`CheckContext`](crate::core::CheckContext)) or by the orchestrator when
/// the body faults. Only the elapsed time is filled in afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportItem {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    level: Level,
    passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    order: Option<i64>,
    inputs: Vec<DatasetRef>,
    exec_time: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    extra: Option<Extra>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, JsonValue>,
}

impl ReportItem {
    pub fn new(id: impl Into<String>, level: Level, passed: bool) -> Self {
        Self {
            id: id.into(),
            description: None,
            level,
            passed,
            order: None,
            inputs: Vec::new(),
            exec_time: Duration::ZERO,
            text: None,
            extra: None,
            params: BTreeMap::new(),
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

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_inputs(mut self, inputs: Vec<DatasetRef>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_extra(mut self, extra: Extra) -> Self {
        self.extra = Some(extra);
        self
    }

    pub fn with_params(mut self, params: BTreeMap<String, JsonValue>) -> Self {
        self.params = params;
        self
    }

    /// Back-fills the elapsed time measured around the invocation.
    pub fn set_exec_time(&mut self, elapsed: Duration) {
        self.exec_time = elapsed;
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn order(&self) -> Option<i64> {
        self.order
    }

    pub fn inputs(&self) -> &[DatasetRef] {
        &self.inputs
    }

    pub fn exec_time(&self) -> Duration {
        self.exec_time
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn extra(&self) -> Option<&Extra> {
        self.extra.as_ref()
    }

    pub fn params(&self) -> &BTreeMap<String, JsonValue> {
        &self.params
    }

    /// One-line description of the outcome.
    pub fn summarise(&self) -> String {
        let inputs = self
            .inputs
            .iter()
            .map(|input| format!("{} ({})", input.slot, input.path.display()))
            .collect::<Vec<_>>()
            .join(" vs ");
        let status = if self.passed { "passed" } else { "failed" };
        let mut line = format!(
            "{} [{}] on {}: {} in {:.3}s",
            self.id,
            self.level,
            inputs,
            status,
            self.exec_time.as_secs_f64()
        );
        if let Some(text) = &self.text {
            line.push_str(" - ");
            line.push_str(text);
        }
        line
    }
}

/// Derived statistics of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Number of check invocations
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Number of distinct dataset paths touched
    pub datasets: usize,
    /// Sum of the elapsed time of every invocation
    pub exec_time: Duration,
    /// Failed invocations per level
    pub failed_by_level: BTreeMap<Level, usize>,
}

impl ReportSummary {
    /// Returns the success rate as a percentage (0.0 to 100.0).
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.passed as f64 / self.total as f64) * 100.0
        }
    }
}

/// The outcomes of one run, in execution order until reordered.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    specification: Specification,
    created_at: DateTime<Utc>,
    items: Vec<ReportItem>,
}

impl Report {
    pub fn new(specification: Specification) -> Self {
        Self {
            specification,
            created_at: Utc::now(),
            items: Vec::new(),
        }
    }

    /// Appends an item; items keep execution order.
    pub fn add_item(&mut self, item: ReportItem) {
        self.items.push(item);
    }

    pub fn items(&self) -> &[ReportItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn specification(&self) -> &Specification {
        &self.specification
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Reorders the items by severity only, keeping execution order among
    /// items of the same level.
    ///
    /// With `most_severe_first = false` the result is the exact reverse of the
    /// `true` ordering.
    pub fn order_items(&mut self, most_severe_first: bool) {
        self.items.sort_by_key(|item| item.level().rank());
        if !most_severe_first {
            self.items.reverse();
        }
    }

    /// Items that did not pass.
    pub fn failures(&self) -> impl Iterator<Item = &ReportItem> {
        self.items.iter().filter(|item| !item.passed())
    }

    /// Items of a specific level.
    pub fn items_by_level(&self, level: Level) -> Vec<&ReportItem> {
        self.items
            .iter()
            .filter(|item| item.level() == level)
            .collect()
    }

    /// Returns true if an error-level check failed.
    pub fn has_errors(&self) -> bool {
        self.failures().any(|item| item.level() == Level::Error)
    }

    pub fn summary(&self) -> ReportSummary {
        let passed = self.items.iter().filter(|item| item.passed()).count();
        let datasets: BTreeSet<&PathBuf> = self
            .items
            .iter()
            .flat_map(|item| item.inputs().iter().map(|input| &input.path))
            .collect();
        let mut failed_by_level = BTreeMap::new();
        for item in self.failures() {
            *failed_by_level.entry(item.level()).or_insert(0) += 1;
        }

        ReportSummary {
            total: self.items.len(),
            passed,
            failed: self.items.len() - passed,
            datasets: datasets.len(),
            exec_time: self.items.iter().map(ReportItem::exec_time).sum(),
            failed_by_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::validated_specification;

    fn item(id: &str, level: Level, passed: bool) -> ReportItem {
        ReportItem::new(id, level, passed)
            .with_inputs(vec![DatasetRef::new("input1", format!("data/{id}.csv"))])
    }

    #[test]
    fn test_extra_emptiness() {
        assert!(Extra::Keys(vec![]).is_empty());
        assert!(!Extra::Indices(vec![3]).is_empty());
        assert!(Extra::MissingVsNew {
            missing: vec![],
            new: vec![]
        }
        .is_empty());
        assert!(Extra::Text("x".into()).is_scalar());
        assert!(!Extra::Keys(vec!["a".into()]).is_scalar());
    }

    #[test]
    fn test_order_items_is_stable() {
        let mut report = Report::new(validated_specification());
        report.add_item(item("qc1", Level::Info, true));
        report.add_item(item("qc2", Level::Error, false));
        report.add_item(item("qc3", Level::Warning, true));
        report.add_item(item("qc4", Level::Error, true));
        report.add_item(item("qc5", Level::Info, false));

        report.order_items(true);
        let ids: Vec<_> = report.items().iter().map(ReportItem::id).collect();
        assert_eq!(ids, vec!["qc2", "qc4", "qc3", "qc1", "qc5"]);

        report.order_items(true);
        let forward: Vec<_> = report.items().iter().map(|i| i.id().to_string()).collect();
        report.order_items(false);
        let mut backward: Vec<_> = report.items().iter().map(|i| i.id().to_string()).collect();
        backward.reverse();
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_summary_counts() {
        let mut report = Report::new(validated_specification());
        let mut first = item("qc1", Level::Error, true);
        first.set_exec_time(Duration::from_millis(250));
        let mut second = item("qc1", Level::Error, false);
        second.set_exec_time(Duration::from_millis(750));
        report.add_item(first);
        report.add_item(second);
        report.add_item(item("qc7", Level::Warning, false));

        let summary = report.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.datasets, 2);
        assert_eq!(summary.exec_time, Duration::from_secs(1));
        assert_eq!(summary.failed_by_level.get(&Level::Error), Some(&1));
        assert_eq!(summary.failed_by_level.get(&Level::Warning), Some(&1));
        assert!(report.has_errors());
    }

    #[test]
    fn test_empty_report_summary() {
        let report = Report::new(validated_specification());
        let summary = report.summary();
        assert_eq!(summary.total, 0);
        assert_eq!(summary.success_rate(), 100.0);
    }

    #[test]
    fn test_summarise_mentions_inputs_and_text() {
        let line = item("qc6", Level::Warning, false)
            .with_text("2 empty columns")
            .summarise();
        assert!(line.starts_with("qc6 [warning] on input1 (data/qc6.csv): failed"));
        assert!(line.ends_with("- 2 empty columns"));
    }

    #[test]
    fn test_extra_serializes_tagged() {
        let json = serde_json::to_value(Extra::Keys(vec!["colX".into()])).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "keys", "value": ["colX"]}));
    }
}
