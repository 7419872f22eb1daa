//! Checks on the record identifier column (`patient_id_col`).

use super::{string_values, CheckInfo, CheckRegistryBuilder};
use crate::core::{CheckContext, ReportItem};
use crate::error::Result;
use crate::sources::Dataset;
use std::collections::HashMap;

pub const ID_ROLE: &str = "patient_id_col";

pub fn register(builder: &mut CheckRegistryBuilder) {
    builder
        .single(
            CheckInfo::new("qc4", "No duplicate identifiers within a dataset"),
            no_duplicate_ids,
        )
        .single(
            CheckInfo::new("qc52", "Every row has an identifier"),
            no_missing_ids,
        );
}

fn identifiers(dataset: &Dataset, ctx: &CheckContext) -> Result<Vec<Option<String>>> {
    let column = ctx.role_column(ID_ROLE)?;
    string_values(dataset.column(column)?)
}

/// qc4: lists the indices of every row whose identifier also appears on
/// another row. Missing identifiers are not duplicates of each other.
pub fn no_duplicate_ids(dataset: &Dataset, ctx: &CheckContext) -> Result<ReportItem> {
    let ids = identifiers(dataset, ctx)?;
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for id in ids.iter().flatten() {
        *counts.entry(id.as_str()).or_insert(0) += 1;
    }
    let duplicated: Vec<u64> = ids
        .iter()
        .enumerate()
        .filter(|(_, id)| id.as_deref().is_some_and(|id| counts[id] > 1))
        .map(|(row, _)| row as u64)
        .collect();
    Ok(ctx.conditional(duplicated))
}

/// qc52: lists the indices of rows without an identifier.
pub fn no_missing_ids(dataset: &Dataset, ctx: &CheckContext) -> Result<ReportItem> {
    let missing: Vec<u64> = identifiers(dataset, ctx)?
        .iter()
        .enumerate()
        .filter(|(_, id)| id.is_none())
        .map(|(row, _)| row as u64)
        .collect();
    Ok(ctx.conditional(missing))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ColumnRoles, Extra, Level};
    use crate::error::TermError;
    use crate::test_fixtures::cohort_batch;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn ctx(id: &str, id_column: &str) -> CheckContext {
        let mut roles = BTreeMap::new();
        roles.insert(ID_ROLE.to_string(), json!(id_column));
        CheckContext::new(id, Level::Error, Arc::new(ColumnRoles::new(roles)))
    }

    fn cohort() -> Dataset {
        Dataset::new("cohort.csv", cohort_batch()).unwrap()
    }

    #[test]
    fn test_qc4_lists_every_duplicate_row() {
        let item = no_duplicate_ids(&cohort(), &ctx("qc4", "PATIENT_ID")).unwrap();
        assert!(!item.passed());
        assert_eq!(item.extra(), Some(&Extra::Indices(vec![1, 3])));
    }

    #[test]
    fn test_qc4_passes_on_unique_ids() {
        let dataset = Dataset::new("head.csv", cohort_batch().slice(0, 3)).unwrap();
        assert!(no_duplicate_ids(&dataset, &ctx("qc4", "PATIENT_ID"))
            .unwrap()
            .passed());
    }

    #[test]
    fn test_qc52_lists_missing_ids() {
        let item = no_missing_ids(&cohort(), &ctx("qc52", "PATIENT_ID")).unwrap();
        assert!(!item.passed());
        assert_eq!(item.extra(), Some(&Extra::Indices(vec![4])));
    }

    #[test]
    fn test_unknown_id_column_is_an_error() {
        let err = no_missing_ids(&cohort(), &ctx("qc52", "NOPE")).unwrap_err();
        assert!(matches!(err, TermError::ColumnNotFound { .. }));
    }
}
