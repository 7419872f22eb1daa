//! Compiling a validated specification into an execution plan.

use super::{CheckSpec, Specification};
use crate::checks::CheckRegistry;
use crate::error::{ErrorContext, Result};
use crate::sources::PathResolver;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, instrument};

/// What to run, against which data, in which order.
///
/// Every check of the specification appears in exactly one of the two
/// collections. A single-dataset check referencing several slots appears
/// under each of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionPlan {
    /// Concrete paths of each input slot, in load order
    pub resolved_inputs: BTreeMap<String, Vec<PathBuf>>,
    /// Single-dataset checks per slot, in execution order
    pub qcs_per_input: BTreeMap<String, Vec<CheckSpec>>,
    /// Comparison checks, in execution order
    pub compare_qcs: Vec<CheckSpec>,
}

impl ExecutionPlan {
    /// Number of check invocations the plan leads to.
    pub fn invocation_count(&self) -> usize {
        let single: usize = self
            .qcs_per_input
            .iter()
            .map(|(slot, checks)| {
                let paths = self.resolved_inputs.get(slot).map_or(0, Vec::len);
                paths * checks.len()
            })
            .sum();
        single + self.compare_qcs.len()
    }

    /// Slots some comparison check reads.
    pub fn compared_slots(&self) -> impl Iterator<Item = &str> {
        self.compare_qcs
            .iter()
            .flat_map(|check| check.inputs.iter().map(String::as_str))
    }

    pub fn is_empty(&self) -> bool {
        self.qcs_per_input.values().all(Vec::is_empty) && self.compare_qcs.is_empty()
    }
}

/// Builds [`ExecutionPlan`]s.
///
/// Planning is a pure function of the specification and of what the
/// resolver sees: the same inputs always give an equal plan.
#[derive(Debug, Clone, Copy)]
pub struct Planner<'a> {
    registry: &'a CheckRegistry,
    resolver: &'a dyn PathResolver,
}

impl<'a> Planner<'a> {
    pub fn new(registry: &'a CheckRegistry, resolver: &'a dyn PathResolver) -> Self {
        Self { registry, resolver }
    }

    #[instrument(skip_all, fields(inputs = spec.inputs().len(), checks = spec.checks().len()))]
    pub fn plan(&self, spec: &Specification) -> Result<ExecutionPlan> {
        let mut plan = ExecutionPlan::default();

        for (name, slot) in spec.inputs() {
            let paths = if slot.is_glob() {
                self.resolver
                    .resolve(&slot.path)
                    .with_context(|| format!("resolving {name} ({})", slot.path))?
            } else {
                vec![PathBuf::from(&slot.path)]
            };
            debug!(slot = %name, paths = paths.len(), "Resolved input slot");
            plan.resolved_inputs.insert(name.clone(), paths);
        }

        let mut checks: Vec<&CheckSpec> = spec.checks().values().collect();
        checks.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        for check in checks {
            if self.registry.is_comparison(&check.id) {
                plan.compare_qcs.push(check.clone());
            } else {
                for slot in &check.inputs {
                    plan.qcs_per_input
                        .entry(slot.clone())
                        .or_default()
                        .push(check.clone());
                }
            }
        }

        info!(
            invocations = plan.invocation_count(),
            comparisons = plan.compare_qcs.len(),
            "Built execution plan"
        );
        Ok(plan)
    }
}
