//! Plan execution.
//!
//! The orchestrator walks an [`ExecutionPlan`]: every single-dataset group
//! first (slots in plan order, resolved paths in order), then the comparison
//! checks. Each dataset is loaded once through a [`DatasetCache`] owned by the
//! run, and each check body is called behind a failure boundary so that one
//! broken check or unreadable file never takes the rest of the run down.

use super::cache::{CachedDataset, DatasetCache};
use super::{CheckContext, CheckSpec, ColumnRoles, DatasetRef, ExecutionPlan, Level, Report};
use super::{ReportItem, Specification};
use crate::checks::{CheckBody, CheckRegistry};
use crate::error::{ExecutionFault, Result, TermError};
use crate::sources::{Dataset, DatasetLoader};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// What happens when a check body faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultPolicy {
    /// Record the fault as a failed, error-level report item and carry on
    #[default]
    Isolate,
    /// Abort the run on the first check fault. Load failures are still
    /// recorded and never abort.
    FailFast,
}

/// Runs execution plans against a check registry.
///
/// # Examples
///
/// ```rust,no_run
/// use term_qc::checks::CheckRegistry;
/// use term_qc::core::{FaultPolicy, Orchestrator, Planner, RawSpecification, Validator};
/// use term_qc::sources::{FileLoader, GlobResolver};
///
/// # async fn example() -> term_qc::error::Result<()> {
/// let registry = CheckRegistry::global();
/// let raw = RawSpecification::from_path("qc.yml")?;
/// let spec = Validator::new(&registry).validate(&raw)?;
/// let plan = Planner::new(&registry, &GlobResolver::new()).plan(&spec)?;
///
/// let orchestrator = Orchestrator::builder()
///     .fault_policy(FaultPolicy::Isolate)
///     .build();
/// let report = orchestrator
///     .run(&plan, &spec, &FileLoader::new(spec.source()))
///     .await?;
/// println!("{} of {} checks passed", report.summary().passed, report.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Orchestrator {
    registry: Arc<CheckRegistry>,
    fault_policy: FaultPolicy,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    pub fn fault_policy(&self) -> FaultPolicy {
        self.fault_policy
    }

    pub fn registry(&self) -> &CheckRegistry {
        &self.registry
    }

    /// Executes `plan` and collects one report item per invocation, in
    /// execution order.
    ///
    /// Returns an error only when the fault policy is
    /// [`FaultPolicy::FailFast`] and a check body faulted.
    #[instrument(skip_all, fields(
        plan.invocations = plan.invocation_count(),
        fault_policy = ?self.fault_policy,
        loader = %loader.description()
    ))]
    pub async fn run(
        &self,
        plan: &ExecutionPlan,
        spec: &Specification,
        loader: &dyn DatasetLoader,
    ) -> Result<Report> {
        info!(
            slots = plan.qcs_per_input.len(),
            comparisons = plan.compare_qcs.len(),
            "Starting QC run"
        );
        let start_time = Instant::now();
        let roles = Arc::new(spec.roles().clone());
        let mut cache = DatasetCache::new(plan.compared_slots());
        let mut report = Report::new(spec.clone());

        for (slot, checks) in &plan.qcs_per_input {
            let paths = plan
                .resolved_inputs
                .get(slot)
                .map(Vec::as_slice)
                .unwrap_or_default();
            if paths.is_empty() {
                warn!(slot = %slot, "Input slot matched no files, skipping its checks");
            }
            for path in paths {
                let loaded = cache.get_or_load(slot, path, loader, &roles).await;
                let input = dataset_ref(slot, path, &loaded);
                for check in checks {
                    let ctx = self.context(check, &roles).with_input(input.clone());
                    let item = match &loaded {
                        Ok(dataset) => {
                            self.execute(&ctx, || self.call_single(check, dataset, &ctx))?
                        }
                        Err(fault) => self.settle(&ctx, Err(fault.clone()), Duration::ZERO)?,
                    };
                    report.add_item(item);
                }
                drop(loaded);
                cache.release(slot, path);
            }
        }

        for check in &plan.compare_qcs {
            let mut inputs = Vec::with_capacity(2);
            let mut datasets = Vec::with_capacity(2);
            let mut fault = None;
            for slot in &check.inputs {
                match single_path(plan, check, slot) {
                    Ok(path) => {
                        let loaded = cache.get_or_load(slot, path, loader, &roles).await;
                        inputs.push(dataset_ref(slot, path, &loaded));
                        match loaded {
                            Ok(dataset) => datasets.push(dataset),
                            Err(load_fault) => {
                                fault.get_or_insert(load_fault);
                            }
                        }
                    }
                    Err(path_fault) => {
                        fault.get_or_insert(path_fault);
                    }
                }
            }

            let ctx = inputs
                .into_iter()
                .fold(self.context(check, &roles), CheckContext::with_input);
            let item = match (fault, datasets.as_slice()) {
                (None, [old, new]) => {
                    self.execute(&ctx, || self.call_compare(check, old, new, &ctx))?
                }
                (Some(fault), _) => self.settle(&ctx, Err(fault), Duration::ZERO)?,
                (None, _) => {
                    let fault = ExecutionFault::Check {
                        check: check.id.clone(),
                        message: format!(
                            "comparison needs two inputs, found {}",
                            check.inputs.len()
                        ),
                    };
                    self.settle(&ctx, Err(fault), Duration::ZERO)?
                }
            };
            report.add_item(item);
        }

        let summary = report.summary();
        info!(
            checks = summary.total,
            passed = summary.passed,
            failed = summary.failed,
            loads = cache.load_count(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "QC run completed"
        );
        Ok(report)
    }

    fn context(&self, check: &CheckSpec, roles: &Arc<ColumnRoles>) -> CheckContext {
        let ctx = CheckContext::new(check.id.clone(), check.level, Arc::clone(roles))
            .with_order(check.order)
            .with_params(check.params.clone());
        match self.registry.get(&check.id) {
            Some(registered) => ctx.with_description(registered.info.description.clone()),
            None => ctx,
        }
    }

    fn body(&self, id: &str) -> Result<&CheckBody> {
        self.registry
            .get(id)
            .map(|registered| &registered.body)
            .ok_or_else(|| TermError::check_fault(id, "no check is registered under this id"))
    }

    fn call_single(
        &self,
        check: &CheckSpec,
        dataset: &Dataset,
        ctx: &CheckContext,
    ) -> Result<ReportItem> {
        match self.body(&check.id)? {
            CheckBody::Single(body) => body.run(dataset, ctx),
            CheckBody::Compare(_) => Err(TermError::check_fault(
                &check.id,
                "comparison check scheduled against a single dataset",
            )),
        }
    }

    fn call_compare(
        &self,
        check: &CheckSpec,
        old: &Dataset,
        new: &Dataset,
        ctx: &CheckContext,
    ) -> Result<ReportItem> {
        match self.body(&check.id)? {
            CheckBody::Compare(body) => body.run(old, new, ctx),
            CheckBody::Single(_) => Err(TermError::check_fault(
                &check.id,
                "single-dataset check scheduled as a comparison",
            )),
        }
    }

    /// Times one invocation behind the failure boundary.
    fn execute<F>(&self, ctx: &CheckContext, call: F) -> Result<ReportItem>
    where
        F: FnOnce() -> Result<ReportItem>,
    {
        let started = Instant::now();
        let outcome = invoke_boundary(ctx.id(), call);
        self.settle(ctx, outcome, started.elapsed())
    }

    /// Turns the outcome of an invocation into its report item, applying the
    /// fault policy.
    fn settle(
        &self,
        ctx: &CheckContext,
        outcome: std::result::Result<ReportItem, ExecutionFault>,
        elapsed: Duration,
    ) -> Result<ReportItem> {
        let mut item = match outcome {
            Ok(item) => {
                debug!(
                    check = ctx.id(),
                    level = %item.level(),
                    passed = item.passed(),
                    "Check completed"
                );
                item
            }
            Err(fault) => {
                error!(check = ctx.id(), %fault, "Check faulted");
                if self.fault_policy == FaultPolicy::FailFast
                    && matches!(fault, ExecutionFault::Check { .. })
                {
                    return Err(fault.into());
                }
                ctx.failed(fault.message()).with_level(Level::Error)
            }
        };
        item.set_exec_time(elapsed);
        Ok(item)
    }
}

/// Calls a check body, turning both returned errors and panics into an
/// [`ExecutionFault`].
pub fn invoke_boundary<F>(check: &str, call: F) -> std::result::Result<ReportItem, ExecutionFault>
where
    F: FnOnce() -> Result<ReportItem>,
{
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(item)) => Ok(item),
        Ok(Err(error)) => Err(ExecutionFault::from_error(check, error)),
        Err(payload) => Err(ExecutionFault::Check {
            check: check.to_string(),
            message: format!("panicked: {}", panic_message(payload.as_ref())),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn single_path<'p>(
    plan: &'p ExecutionPlan,
    check: &CheckSpec,
    slot: &str,
) -> std::result::Result<&'p PathBuf, ExecutionFault> {
    match plan.resolved_inputs.get(slot).map(Vec::as_slice) {
        Some([path]) => Ok(path),
        _ => Err(ExecutionFault::Check {
            check: check.id.clone(),
            message: format!("input '{slot}' does not resolve to exactly one file"),
        }),
    }
}

fn dataset_ref(slot: &str, path: &Path, loaded: &CachedDataset) -> DatasetRef {
    let input = DatasetRef::new(slot, path);
    match loaded {
        Ok(dataset) => input.with_fingerprint(dataset.fingerprint()),
        Err(_) => input,
    }
}

/// Builder for [`Orchestrator`].
#[derive(Debug, Clone, Default)]
pub struct OrchestratorBuilder {
    registry: Option<Arc<CheckRegistry>>,
    fault_policy: FaultPolicy,
}

impl OrchestratorBuilder {
    /// Uses `registry` instead of the built-in one.
    pub fn registry(mut self, registry: Arc<CheckRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn fault_policy(mut self, fault_policy: FaultPolicy) -> Self {
        self.fault_policy = fault_policy;
        self
    }

    pub fn build(self) -> Orchestrator {
        Orchestrator {
            registry: self.registry.unwrap_or_else(CheckRegistry::global),
            fault_policy: self.fault_policy,
        }
    }
}
