//! Prelude for commonly used types and traits in term-qc.

pub use crate::checks::{CheckInfo, CheckRegistry};
pub use crate::core::{
    CheckContext, Driver, DriverConfig, Extra, FaultPolicy, Level, OrderingPolicy, Report,
    ReportItem,
};
pub use crate::error::{ConfigError, ErrorContext, Result, TermError};
pub use crate::formatters::{FormatterConfig, ReportFormatter};
pub use crate::logging::LogConfig;
