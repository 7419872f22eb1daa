//! Comparison checks between an old and a new version of a dataset.
//!
//! These accept an updated delivery of a dataset: it should keep the columns,
//! rows and untouched values of the previous one. The first dataset handed to
//! a comparison check is the old version, the second the new one.

use super::identifiers::ID_ROLE;
use super::{numeric_values, string_values, CheckInfo, CheckRegistryBuilder};
use crate::core::{CheckContext, Extra, ReportItem, StatsTable};
use crate::error::Result;
use crate::sources::Dataset;
use arrow::array::{Array, ArrayRef};
use std::collections::HashSet;

pub fn register(builder: &mut CheckRegistryBuilder) {
    builder
        .compare(
            CheckInfo::new("qc46", "Same columns in the same order"),
            same_columns,
        )
        .compare(
            CheckInfo::new("qc47", "Same identifiers in the same order"),
            same_rows,
        )
        .compare(
            CheckInfo::new("qc48", "Listed columns are unchanged").requires(["list_columns"]),
            unchanged_columns,
        )
        .compare(
            CheckInfo::new("qc49", "Descriptive statistics of changed numeric columns"),
            changed_column_stats,
        );
}

/// Entries of `old` absent from `new` and entries of `new` absent from `old`,
/// each in its own dataset's order.
fn missing_vs_new(old: &[String], new: &[String]) -> Extra {
    let old_set: HashSet<&String> = old.iter().collect();
    let new_set: HashSet<&String> = new.iter().collect();
    Extra::MissingVsNew {
        missing: old
            .iter()
            .filter(|value| !new_set.contains(value))
            .cloned()
            .collect(),
        new: new
            .iter()
            .filter(|value| !old_set.contains(value))
            .cloned()
            .collect(),
    }
}

fn same_data(old: &ArrayRef, new: &ArrayRef) -> bool {
    old.to_data() == new.to_data()
}

/// qc46: passes when both datasets have the same columns in the same order.
pub fn same_columns(old: &Dataset, new: &Dataset, ctx: &CheckContext) -> Result<ReportItem> {
    let old_columns: Vec<String> = old.columns().into_iter().map(str::to_string).collect();
    let new_columns: Vec<String> = new.columns().into_iter().map(str::to_string).collect();
    if old_columns == new_columns {
        return Ok(ctx.passed());
    }
    let diff = missing_vs_new(&old_columns, &new_columns);
    if diff.is_empty() {
        return Ok(ctx.failed("No missing or new columns, but order changed."));
    }
    Ok(ctx.conditional(diff))
}

/// qc47: passes when both datasets list the same identifiers in the same
/// order.
pub fn same_rows(old: &Dataset, new: &Dataset, ctx: &CheckContext) -> Result<ReportItem> {
    let column = ctx.role_column(ID_ROLE)?;
    let old_ids = string_values(old.column(column)?)?;
    let new_ids = string_values(new.column(column)?)?;
    if old_ids == new_ids {
        return Ok(ctx.passed());
    }
    let old_ids: Vec<String> = old_ids.into_iter().flatten().collect();
    let new_ids: Vec<String> = new_ids.into_iter().flatten().collect();
    let diff = missing_vs_new(&old_ids, &new_ids);
    if diff.is_empty() {
        return Ok(ctx.failed("No missing or new rows, but order changed."));
    }
    Ok(ctx.conditional(diff))
}

/// qc48: lists the columns of `list_columns` whose values differ between the
/// two datasets.
pub fn unchanged_columns(old: &Dataset, new: &Dataset, ctx: &CheckContext) -> Result<ReportItem> {
    let columns: Vec<String> = ctx.param_as("list_columns")?;
    let mut changed = Vec::new();
    for name in columns {
        if !same_data(old.column(&name)?, new.column(&name)?) {
            changed.push(name);
        }
    }
    Ok(ctx.conditional(changed))
}

/// qc49: descriptive statistics of the numeric columns whose values changed.
///
/// Reports min, max, mean, median and the fraction of zero or missing values
/// for the old and the new version of each such column, followed by the
/// change in median and zero-or-missing fraction. Never fails.
pub fn changed_column_stats(
    old: &Dataset,
    new: &Dataset,
    ctx: &CheckContext,
) -> Result<ReportItem> {
    let mut table = StatsTable::new(["min", "max", "mean", "median", "zero_or_null"]);
    for name in old.columns() {
        let Ok(new_column) = new.column(name) else {
            continue;
        };
        let old_column = old.column(name)?;
        let numeric = old_column.data_type().is_numeric() && new_column.data_type().is_numeric();
        if !numeric || same_data(old_column, new_column) {
            continue;
        }

        let old_stats = ColumnStats::compute(&numeric_values(old_column)?);
        let new_stats = ColumnStats::compute(&numeric_values(new_column)?);
        let delta = |a: Option<f64>, b: Option<f64>| a.zip(b).map(|(a, b)| b - a);
        let diff = vec![
            None,
            None,
            None,
            delta(old_stats.median, new_stats.median),
            delta(old_stats.zero_or_null, new_stats.zero_or_null),
        ];
        table.push_row(format!("old:{name}"), old_stats.row());
        table.push_row(format!("new:{name}"), new_stats.row());
        table.push_row(format!("difference:{name}"), diff);
    }

    let item = ctx.passed();
    if table.is_empty() {
        Ok(item.with_text("No numeric column changed."))
    } else {
        Ok(item.with_extra(Extra::Table(table)))
    }
}

#[derive(Debug, Default)]
struct ColumnStats {
    min: Option<f64>,
    max: Option<f64>,
    mean: Option<f64>,
    median: Option<f64>,
    zero_or_null: Option<f64>,
}

impl ColumnStats {
    fn compute(values: &[Option<f64>]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let mut present: Vec<f64> = values.iter().flatten().copied().collect();
        let zero_or_null = values
            .iter()
            .filter(|value| value.is_none_or(|v| v == 0.0))
            .count() as f64
            / values.len() as f64;
        if present.is_empty() {
            return Self {
                zero_or_null: Some(zero_or_null),
                ..Self::default()
            };
        }

        present.sort_by(f64::total_cmp);
        let n = present.len();
        let median = if n % 2 == 1 {
            present[n / 2]
        } else {
            (present[n / 2 - 1] + present[n / 2]) / 2.0
        };
        Self {
            min: present.first().copied(),
            max: present.last().copied(),
            mean: Some(present.iter().sum::<f64>() / n as f64),
            median: Some(median),
            zero_or_null: Some(zero_or_null),
        }
    }

    fn row(&self) -> Vec<Option<f64>> {
        vec![self.min, self.max, self.mean, self.median, self.zero_or_null]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ColumnRoles, Level};
    use crate::error::TermError;
    use crate::test_fixtures::cohort_batch;
    use arrow::array::{Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn ctx(id: &str) -> CheckContext {
        let mut roles = BTreeMap::new();
        roles.insert(ID_ROLE.to_string(), json!("PATIENT_ID"));
        CheckContext::new(id, Level::Warning, Arc::new(ColumnRoles::new(roles)))
    }

    fn dataset(ids: Vec<&str>, counts: Vec<i64>) -> Dataset {
        let schema = Arc::new(Schema::new(vec![
            Field::new("PATIENT_ID", DataType::Utf8, true),
            Field::new("A_count", DataType::Int64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(Int64Array::from(counts)),
            ],
        )
        .unwrap();
        Dataset::new("cohort.csv", batch).unwrap()
    }

    fn reordered_columns(dataset: &Dataset) -> Dataset {
        let batch = dataset.batch();
        let projected = batch.project(&[1, 0]).unwrap();
        Dataset::new("reordered.csv", projected).unwrap()
    }

    #[test]
    fn test_qc46_identical_columns_pass() {
        let old = Dataset::new("old.csv", cohort_batch()).unwrap();
        let new = Dataset::new("new.csv", cohort_batch()).unwrap();
        assert!(same_columns(&old, &new, &ctx("qc46")).unwrap().passed());
    }

    #[test]
    fn test_qc46_order_change_is_reported_as_text() {
        let old = dataset(vec!["P1"], vec![1]);
        let new = reordered_columns(&old);
        let item = same_columns(&old, &new, &ctx("qc46")).unwrap();
        assert!(!item.passed());
        assert_eq!(
            item.text(),
            Some("No missing or new columns, but order changed.")
        );
        assert!(item.extra().is_none());
    }

    #[test]
    fn test_qc46_missing_and_new_columns() {
        let old = Dataset::new("old.csv", cohort_batch()).unwrap();
        let new = dataset(vec!["P1"], vec![1]);
        let item = same_columns(&old, &new, &ctx("qc46")).unwrap();
        assert!(!item.passed());
        assert_eq!(
            item.extra(),
            Some(&Extra::MissingVsNew {
                missing: vec!["B_freq".into(), "EMPTY_dt".into()],
                new: vec![],
            })
        );
    }

    #[test]
    fn test_qc47_rows() {
        let old = dataset(vec!["P1", "P2", "P3"], vec![1, 2, 3]);
        let same = dataset(vec!["P1", "P2", "P3"], vec![9, 9, 9]);
        assert!(same_rows(&old, &same, &ctx("qc47")).unwrap().passed());

        let shuffled = dataset(vec!["P3", "P1", "P2"], vec![3, 1, 2]);
        let item = same_rows(&old, &shuffled, &ctx("qc47")).unwrap();
        assert_eq!(item.text(), Some("No missing or new rows, but order changed."));

        let changed = dataset(vec!["P1", "P4"], vec![1, 4]);
        let item = same_rows(&old, &changed, &ctx("qc47")).unwrap();
        assert_eq!(
            item.extra(),
            Some(&Extra::MissingVsNew {
                missing: vec!["P2".into(), "P3".into()],
                new: vec!["P4".into()],
            })
        );
    }

    #[test]
    fn test_qc48_lists_changed_columns() {
        let old = dataset(vec!["P1", "P2"], vec![1, 2]);
        let new = dataset(vec!["P1", "P2"], vec![1, 5]);
        let mut params = BTreeMap::new();
        params.insert("list_columns".to_string(), json!(["PATIENT_ID", "A_count"]));
        let ctx = ctx("qc48").with_params(params);

        let item = unchanged_columns(&old, &new, &ctx).unwrap();
        assert!(!item.passed());
        assert_eq!(item.extra(), Some(&Extra::Keys(vec!["A_count".into()])));
    }

    #[test]
    fn test_qc48_without_list_columns_is_an_error() {
        let old = dataset(vec!["P1"], vec![1]);
        let err = unchanged_columns(&old, &old, &ctx("qc48")).unwrap_err();
        assert!(matches!(err, TermError::MissingParameter { .. }));
    }

    #[test]
    fn test_qc49_describes_changed_numeric_columns() {
        let old = dataset(vec!["P1", "P2", "P3", "P4"], vec![0, 2, 4, 6]);
        let new = dataset(vec!["P1", "P2", "P3", "P4"], vec![1, 2, 4, 9]);
        let item = changed_column_stats(&old, &new, &ctx("qc49")).unwrap();
        assert!(item.passed());

        let Some(Extra::Table(table)) = item.extra() else {
            panic!("expected a statistics table, got {:?}", item.extra());
        };
        let labels: Vec<_> = table.rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["old:A_count", "new:A_count", "difference:A_count"]);
        assert_eq!(
            table.rows[0].values,
            vec![Some(0.0), Some(6.0), Some(3.0), Some(3.0), Some(0.25)]
        );
        assert_eq!(table.rows[1].values[3], Some(3.0));
        assert_eq!(table.rows[2].values[4], Some(-0.25));
    }

    #[test]
    fn test_qc49_without_changes() {
        let old = dataset(vec!["P1"], vec![1]);
        let item = changed_column_stats(&old, &old, &ctx("qc49")).unwrap();
        assert!(item.passed());
        assert_eq!(item.text(), Some("No numeric column changed."));
    }

    #[test]
    fn test_column_stats_all_missing() {
        let values: ArrayRef = Arc::new(Float64Array::from(vec![None, Some(f64::NAN)]));
        let stats = ColumnStats::compute(&numeric_values(&values).unwrap());
        assert_eq!(stats.row(), vec![None, None, None, None, Some(1.0)]);
    }
}
