//! The quality-control pipeline.
//!
//! A run goes through four stages, each with its own type:
//!
//! ```text
//! RawSpecification ──Validator──▶ Specification ──Planner──▶ ExecutionPlan
//!                                                                │
//!                                       Report ◀──Orchestrator───┘
//! ```
//!
//! - **[`Validator`]** checks a parsed YAML/JSON document against the
//!   structural rules and the [check registry](crate::checks::CheckRegistry),
//!   producing a [`Specification`]. A `Specification` can only be obtained
//!   this way, so every later stage works on valid input.
//! - **[`Planner`]** resolves wildcard input slots and splits the checks into
//!   per-slot single-dataset groups and comparisons, each in execution order.
//! - **[`Orchestrator`]** loads each dataset once, runs every check behind a
//!   fault boundary, and collects one [`ReportItem`] per invocation.
//! - **[`Report`]** orders its items by severity and flattens into a
//!   [`ReportTable`] for export.
//!
//! [`Driver`] chains all of it.
//!
//! ## Example
//!
//! ```rust,no_run
//! use term_qc::checks::CheckRegistry;
//! use term_qc::core::{Orchestrator, Planner, RawSpecification, Validator};
//! use term_qc::sources::{FileLoader, GlobResolver};
//!
//! # async fn example() -> term_qc::error::Result<()> {
//! let registry = CheckRegistry::global();
//! let raw = RawSpecification::from_path("qc.yml")?;
//! let spec = Validator::new(&registry).validate(&raw)?;
//!
//! let resolver = GlobResolver::new();
//! let plan = Planner::new(&registry, &resolver).plan(&spec)?;
//!
//! let loader = FileLoader::new(spec.source());
//! let mut report = Orchestrator::new().run(&plan, &spec, &loader).await?;
//! report.order_items(true);
//! for item in report.failures() {
//!     println!("{}", item.summarise());
//! }
//! # Ok(())
//! # }
//! ```

mod cache;
mod context;
mod driver;
mod level;
mod orchestrator;
mod plan;
mod report;
mod specification;
mod table;
mod validator;

pub use cache::{CachedDataset, DatasetCache};
pub use context::CheckContext;
pub use driver::{Driver, DriverConfig};
pub use level::Level;
pub use orchestrator::{invoke_boundary, FaultPolicy, Orchestrator, OrchestratorBuilder};
pub use plan::{ExecutionPlan, Planner};
pub use report::{
    DatasetRef, Extra, Report, ReportItem, ReportSummary, StatsRow, StatsTable,
};
pub use specification::{
    is_input_slot_name, CheckSpec, ColumnRoles, General, InputSlot, RawSpecification,
    SourceKind, Specification, WILDCARD,
};
pub use table::{Artifact, ReportRow, ReportTable, REPORT_FILE_NAME};
pub use validator::{OrderingPolicy, Validator, REQUIRED_ROLES};
