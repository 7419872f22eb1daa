//! End-to-end pipeline: specification in, ordered report out.

use super::{FaultPolicy, Orchestrator, OrderingPolicy, Planner, RawSpecification, Report, Validator};
use crate::checks::CheckRegistry;
use crate::error::Result;
use crate::sources::{DatasetLoader, FileLoader, GlobResolver, PathResolver};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

/// Options of a [`Driver`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    /// Whether every check must declare an `order`
    pub ordering: OrderingPolicy,
    pub fault_policy: FaultPolicy,
    /// Report order: error items first when true, info items first otherwise
    pub most_severe_first: bool,
    /// Write the report table and artifacts to the specification's
    /// `output_dir`
    pub export: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            ordering: OrderingPolicy::Optional,
            fault_policy: FaultPolicy::Isolate,
            most_severe_first: true,
            export: true,
        }
    }
}

impl DriverConfig {
    /// Explicit ordering required, first check fault aborts the run.
    pub fn strict() -> Self {
        Self {
            ordering: OrderingPolicy::Required,
            fault_policy: FaultPolicy::FailFast,
            ..Self::default()
        }
    }

    /// Returns the default configuration without export, for callers that
    /// only want the in-memory report.
    pub fn in_memory() -> Self {
        Self {
            export: false,
            ..Self::default()
        }
    }
}

/// Runs the whole pipeline: validate, plan, execute, order, export.
///
/// Nothing is loaded or executed unless the specification is valid.
///
/// ```rust,no_run
/// use term_qc::core::{Driver, DriverConfig};
///
/// # async fn example() -> term_qc::error::Result<()> {
/// let report = Driver::new(DriverConfig::default()).run_path("qc.yml").await?;
/// if report.has_errors() {
///     eprintln!("{} checks failed", report.summary().failed);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Driver {
    config: DriverConfig,
    registry: Arc<CheckRegistry>,
    resolver: Arc<dyn PathResolver>,
    loader: Option<Arc<dyn DatasetLoader>>,
}

impl Default for Driver {
    fn default() -> Self {
        Self::new(DriverConfig::default())
    }
}

impl Driver {
    /// A driver using the built-in checks, filesystem glob resolution and a
    /// [`FileLoader`] for the specification's source.
    pub fn new(config: DriverConfig) -> Self {
        Self {
            config,
            registry: CheckRegistry::global(),
            resolver: Arc::new(GlobResolver::new()),
            loader: None,
        }
    }

    pub fn with_registry(mut self, registry: Arc<CheckRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn PathResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_loader(mut self, loader: Arc<dyn DatasetLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Reads the specification at `path` and runs it.
    pub async fn run_path(&self, path: impl AsRef<Path>) -> Result<Report> {
        let raw = RawSpecification::from_path(path)?;
        self.run(&raw).await
    }

    #[instrument(skip_all, fields(
        ordering = ?self.config.ordering,
        fault_policy = ?self.config.fault_policy
    ))]
    pub async fn run(&self, raw: &RawSpecification) -> Result<Report> {
        let spec = Validator::new(&self.registry)
            .with_ordering(self.config.ordering)
            .validate(raw)?;
        let plan = Planner::new(&self.registry, self.resolver.as_ref()).plan(&spec)?;

        let orchestrator = Orchestrator::builder()
            .registry(Arc::clone(&self.registry))
            .fault_policy(self.config.fault_policy)
            .build();
        let default_loader;
        let loader: &dyn DatasetLoader = match &self.loader {
            Some(loader) => loader.as_ref(),
            None => {
                default_loader = FileLoader::new(spec.source());
                &default_loader
            }
        };

        let mut report = orchestrator.run(&plan, &spec, loader).await?;
        report.order_items(self.config.most_severe_first);

        if self.config.export {
            let written = report.to_table().write(spec.output_dir())?;
            info!(
                output_dir = %spec.output_dir().display(),
                files = written.len(),
                "Report written"
            );
        }
        Ok(report)
    }
}
