//! Structural checks on the columns and rows of a single dataset.

use super::{missing_mask, CheckInfo, CheckRegistryBuilder};
use crate::core::{CheckContext, ReportItem};
use crate::error::Result;
use crate::sources::Dataset;
use once_cell::sync::Lazy;
use regex::Regex;

static FAULTY_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\W|^$").expect("Hard-coded regex pattern should be valid"));

pub fn register(builder: &mut CheckRegistryBuilder) {
    builder
        .single(
            CheckInfo::new(
                "qc1",
                "Column names contain only letters, digits and underscores",
            ),
            column_names_are_plain,
        )
        .single(
            CheckInfo::new("qc6", "No column is completely empty"),
            no_empty_columns,
        )
        .single(
            CheckInfo::new("qc7", "No row is completely empty"),
            no_empty_rows,
        );
}

/// qc1: lists column names containing spaces or special characters, and
/// empty names.
pub fn column_names_are_plain(dataset: &Dataset, ctx: &CheckContext) -> Result<ReportItem> {
    let faulty: Vec<String> = dataset
        .columns()
        .into_iter()
        .filter(|name| FAULTY_NAME_REGEX.is_match(name))
        .map(str::to_string)
        .collect();
    Ok(ctx.conditional(faulty))
}

/// qc6: lists columns without a single present value.
pub fn no_empty_columns(dataset: &Dataset, ctx: &CheckContext) -> Result<ReportItem> {
    let batch = dataset.batch();
    let empty: Vec<String> = batch
        .schema_ref()
        .fields()
        .iter()
        .zip(batch.columns())
        .filter(|(_, column)| missing_mask(column).into_iter().all(|missing| missing))
        .map(|(field, _)| field.name().clone())
        .collect();
    Ok(ctx.conditional(empty))
}

/// qc7: lists the indices of rows where every value is missing.
pub fn no_empty_rows(dataset: &Dataset, ctx: &CheckContext) -> Result<ReportItem> {
    let batch = dataset.batch();
    let mut all_missing = vec![batch.num_columns() > 0; batch.num_rows()];
    for column in batch.columns() {
        for (row, missing) in missing_mask(column).into_iter().enumerate() {
            all_missing[row] &= missing;
        }
    }
    let empty: Vec<u64> = all_missing
        .into_iter()
        .enumerate()
        .filter_map(|(row, empty)| empty.then_some(row as u64))
        .collect();
    Ok(ctx.conditional(empty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ColumnRoles, Extra, Level};
    use crate::test_fixtures::cohort_batch;
    use arrow::array::{ArrayRef, Int64Array};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    fn ctx(id: &str) -> CheckContext {
        CheckContext::new(id, Level::Error, Arc::new(ColumnRoles::default()))
    }

    fn cohort() -> Dataset {
        Dataset::new("cohort.csv", cohort_batch()).unwrap()
    }

    #[test]
    fn test_qc1_passes_on_plain_names() {
        let item = column_names_are_plain(&cohort(), &ctx("qc1")).unwrap();
        assert!(item.passed());
        assert!(item.extra().is_none());
    }

    #[test]
    fn test_qc1_flags_special_characters() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("ok_1", DataType::Int64, true),
            Field::new("has space", DataType::Int64, true),
            Field::new("dash-ed", DataType::Int64, true),
        ]));
        let column: ArrayRef = Arc::new(Int64Array::from(vec![1]));
        let batch =
            RecordBatch::try_new(schema, vec![column.clone(), column.clone(), column]).unwrap();
        let dataset = Dataset::new("odd.csv", batch).unwrap();

        let item = column_names_are_plain(&dataset, &ctx("qc1")).unwrap();
        assert!(!item.passed());
        assert_eq!(
            item.extra(),
            Some(&Extra::Keys(vec!["has space".into(), "dash-ed".into()]))
        );
    }

    #[test]
    fn test_qc6_lists_empty_columns() {
        let item = no_empty_columns(&cohort(), &ctx("qc6")).unwrap();
        assert!(!item.passed());
        assert_eq!(item.extra(), Some(&Extra::Keys(vec!["EMPTY_dt".into()])));
    }

    #[test]
    fn test_qc7_lists_empty_rows() {
        let item = no_empty_rows(&cohort(), &ctx("qc7")).unwrap();
        assert!(!item.passed());
        assert_eq!(item.extra(), Some(&Extra::Indices(vec![4])));
    }

    #[test]
    fn test_qc7_passes_without_empty_rows() {
        let dataset = Dataset::new("head.csv", cohort_batch().slice(0, 4)).unwrap();
        assert!(no_empty_rows(&dataset, &ctx("qc7")).unwrap().passed());
    }
}
