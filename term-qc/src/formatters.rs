//! Rendering reports for people and tools.
//!
//! The tabular export ([`ReportTable`](crate::core::ReportTable)) is the
//! contract with downstream consumers. The formatters here are for reading a
//! run at a glance: console text, JSON for scripts, Markdown for tickets and
//! documentation.
//!
//! # Examples
//!
//! ```rust,no_run
//! use term_qc::core::{Driver, DriverConfig};
//! use term_qc::formatters::{FormatterConfig, HumanFormatter, ReportFormatter};
//!
//! # async fn example() -> term_qc::error::Result<()> {
//! let report = Driver::new(DriverConfig::in_memory()).run_path("qc.yml").await?;
//! let formatter = HumanFormatter::with_config(FormatterConfig::ci());
//! println!("{}", formatter.format(&report)?);
//! # Ok(())
//! # }
//! ```

use crate::core::{Extra, Level, Report, ReportItem, ReportSummary};
use crate::prelude::*;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write;

/// Configuration options for formatting reports.
#[derive(Debug, Clone)]
pub struct FormatterConfig {
    /// Include the summary counts
    pub include_summary: bool,
    /// Include individual report items
    pub include_items: bool,
    /// Include items that passed, not only failures
    pub include_passed: bool,
    /// Maximum number of items to display (`None` for all)
    pub max_items: Option<usize>,
    /// Whether to use ANSI colors (human formatter only)
    pub use_colors: bool,
    pub include_timestamps: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            include_summary: true,
            include_items: true,
            include_passed: true,
            max_items: None,
            use_colors: true,
            include_timestamps: true,
        }
    }
}

impl FormatterConfig {
    /// Summary only.
    pub fn minimal() -> Self {
        Self {
            include_summary: true,
            include_items: false,
            include_passed: false,
            max_items: Some(0),
            use_colors: false,
            include_timestamps: false,
        }
    }

    /// Failures only, capped, no colors.
    pub fn ci() -> Self {
        Self {
            include_summary: true,
            include_items: true,
            include_passed: false,
            max_items: Some(50),
            use_colors: false,
            include_timestamps: true,
        }
    }

    pub fn with_items(mut self, include: bool) -> Self {
        self.include_items = include;
        self
    }

    pub fn with_passed(mut self, include: bool) -> Self {
        self.include_passed = include;
        self
    }

    pub fn with_max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    /// Items to show, in report order, plus how many were left out.
    fn select<'r>(&self, report: &'r Report) -> (Vec<&'r ReportItem>, usize) {
        if !self.include_items {
            return (Vec::new(), 0);
        }
        let eligible: Vec<&ReportItem> = report
            .items()
            .iter()
            .filter(|item| self.include_passed || !item.passed())
            .collect();
        let shown = self.max_items.map_or(eligible.len(), |max| max.min(eligible.len()));
        let hidden = eligible.len() - shown;
        (eligible.into_iter().take(shown).collect(), hidden)
    }
}

/// Formats a [`Report`] into a string.
///
/// ```rust
/// use term_qc::core::Report;
/// use term_qc::formatters::ReportFormatter;
///
/// struct CountFormatter;
///
/// impl ReportFormatter for CountFormatter {
///     fn format(&self, report: &Report) -> term_qc::error::Result<String> {
///         Ok(format!("{} items", report.len()))
///     }
/// }
/// ```
pub trait ReportFormatter {
    fn format(&self, report: &Report) -> Result<String>;

    /// Formats with options other than the formatter's own.
    fn format_with_config(&self, report: &Report, _config: &FormatterConfig) -> Result<String> {
        self.format(report)
    }
}

/// Formats reports as JSON.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    config: FormatterConfig,
    pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self::with_config(FormatterConfig::default())
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            pretty: true,
        }
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct JsonView<'r> {
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ReportSummary>,
    items: Vec<&'r ReportItem>,
    #[serde(skip_serializing_if = "is_zero")]
    hidden_items: usize,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl ReportFormatter for JsonFormatter {
    fn format(&self, report: &Report) -> Result<String> {
        self.format_with_config(report, &self.config)
    }

    fn format_with_config(&self, report: &Report, config: &FormatterConfig) -> Result<String> {
        let (items, hidden_items) = config.select(report);
        let view = JsonView {
            created_at: config.include_timestamps.then(|| report.created_at()),
            summary: config.include_summary.then(|| report.summary()),
            items,
            hidden_items,
        };

        let json = if self.pretty {
            serde_json::to_string_pretty(&view)
        } else {
            serde_json::to_string(&view)
        };
        json.map_err(|e| TermError::Internal(format!("Failed to serialize report to JSON: {e}")))
    }
}

/// Formats reports for the console.
#[derive(Debug, Clone, Default)]
pub struct HumanFormatter {
    config: FormatterConfig,
}

impl HumanFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self { config }
    }
}

fn paint(text: &str, color: &str, enabled: bool) -> String {
    if enabled {
        format!("\x1b[{color}m{text}\x1b[0m")
    } else {
        text.to_string()
    }
}

fn level_color(level: Level) -> &'static str {
    match level {
        Level::Error => "31",
        Level::Warning => "33",
        Level::Info => "34",
    }
}

/// Short description of a diagnostic payload.
fn describe_extra(extra: &Extra) -> String {
    match extra {
        Extra::Keys(keys) => format!("{} key(s): {}", keys.len(), preview(keys)),
        Extra::Indices(indices) => {
            let rendered: Vec<String> = indices.iter().map(u64::to_string).collect();
            format!("{} row(s): {}", indices.len(), preview(&rendered))
        }
        Extra::MissingVsNew { missing, new } => {
            format!("missing [{}], new [{}]", preview(missing), preview(new))
        }
        Extra::Table(table) => format!("statistics table with {} row(s)", table.rows.len()),
        Extra::Text(text) => text.clone(),
    }
}

const PREVIEW_LEN: usize = 5;

fn preview(values: &[String]) -> String {
    let mut shown = values
        .iter()
        .take(PREVIEW_LEN)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    if values.len() > PREVIEW_LEN {
        shown.push_str(", ...");
    }
    shown
}

impl ReportFormatter for HumanFormatter {
    fn format(&self, report: &Report) -> Result<String> {
        self.format_with_config(report, &self.config)
    }

    fn format_with_config(&self, report: &Report, config: &FormatterConfig) -> Result<String> {
        let mut output = String::new();
        let colors = config.use_colors;

        writeln!(output)?;
        if report.has_errors() {
            writeln!(output, "{}", paint("QC FAILED", "31", colors))?;
        } else {
            writeln!(output, "{}", paint("QC PASSED", "32", colors))?;
        }
        if config.include_timestamps {
            writeln!(output, "Created: {}", report.created_at())?;
        }

        if config.include_summary {
            let summary = report.summary();
            writeln!(output)?;
            writeln!(output, "Summary:")?;
            writeln!(output, "   Checks run: {}", summary.total)?;
            writeln!(output, "   Passed: {}", paint(&summary.passed.to_string(), "32", colors))?;
            writeln!(output, "   Failed: {}", paint(&summary.failed.to_string(), "31", colors))?;
            for (level, count) in summary.failed_by_level.iter().rev() {
                writeln!(output, "      {level}: {count}")?;
            }
            writeln!(output, "   Datasets: {}", summary.datasets)?;
            writeln!(output, "   Success rate: {:.1}%", summary.success_rate())?;
            writeln!(output, "   Execution time: {:.3}s", summary.exec_time.as_secs_f64())?;
        }

        let (items, hidden) = config.select(report);
        if !items.is_empty() {
            writeln!(output)?;
            writeln!(output, "Items:")?;
            for item in items {
                let status = if item.passed() { "PASS" } else { "FAIL" };
                let tag = format!("[{}]", item.level());
                writeln!(
                    output,
                    "   {} {} {}",
                    paint(&tag, level_color(item.level()), colors),
                    status,
                    item.summarise()
                )?;
                if let Some(extra) = item.extra().filter(|extra| !extra.is_scalar()) {
                    writeln!(output, "      {}", describe_extra(extra))?;
                }
            }
        }
        if hidden > 0 {
            writeln!(output, "   ... and {hidden} more item(s)")?;
        }

        writeln!(output)?;
        Ok(output)
    }
}

/// Formats reports as Markdown.
#[derive(Debug, Clone)]
pub struct MarkdownFormatter {
    config: FormatterConfig,
    heading_level: u8,
}

impl MarkdownFormatter {
    pub fn new() -> Self {
        Self::with_config(FormatterConfig::default())
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            heading_level: 2,
        }
    }

    /// Sets the heading level (1-6) of the report title.
    pub fn with_heading_level(mut self, level: u8) -> Self {
        self.heading_level = level.clamp(1, 6);
        self
    }
}

impl Default for MarkdownFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Escapes characters that would break a table cell.
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

impl ReportFormatter for MarkdownFormatter {
    fn format(&self, report: &Report) -> Result<String> {
        self.format_with_config(report, &self.config)
    }

    fn format_with_config(&self, report: &Report, config: &FormatterConfig) -> Result<String> {
        let mut output = String::new();
        let h = "#".repeat(self.heading_level as usize);
        let sub = "#".repeat((self.heading_level + 1).min(6) as usize);

        let status = if report.has_errors() { "❌ Failed" } else { "✅ Passed" };
        writeln!(output, "{h} QC Report: {status}")?;
        writeln!(output)?;
        if config.include_timestamps {
            writeln!(output, "**Created:** {}", report.created_at())?;
            writeln!(output)?;
        }

        if config.include_summary {
            let summary = report.summary();
            writeln!(output, "{sub} Summary")?;
            writeln!(output)?;
            writeln!(output, "| Metric | Value |")?;
            writeln!(output, "|--------|-------|")?;
            writeln!(output, "| Checks run | {} |", summary.total)?;
            writeln!(output, "| Passed | {} |", summary.passed)?;
            writeln!(output, "| Failed | {} |", summary.failed)?;
            writeln!(output, "| Datasets | {} |", summary.datasets)?;
            writeln!(output, "| Success rate | {:.1}% |", summary.success_rate())?;
            writeln!(output)?;
        }

        let (items, hidden) = config.select(report);
        if !items.is_empty() {
            writeln!(output, "{sub} Items")?;
            writeln!(output)?;
            writeln!(output, "| Check | Level | Status | Inputs | Details |")?;
            writeln!(output, "|-------|-------|--------|--------|---------|")?;
            for item in items {
                let inputs = item
                    .inputs()
                    .iter()
                    .map(|input| format!("`{}`", input.path.display()))
                    .collect::<Vec<_>>()
                    .join(" vs ");
                let details = match (item.text(), item.extra()) {
                    (Some(text), _) => text.to_string(),
                    (None, Some(extra)) => describe_extra(extra),
                    (None, None) => String::new(),
                };
                writeln!(
                    output,
                    "| {} | {} | {} | {} | {} |",
                    item.id(),
                    item.level(),
                    if item.passed() { "✅" } else { "❌" },
                    cell(&inputs),
                    cell(&details)
                )?;
            }
            writeln!(output)?;
        }
        if hidden > 0 {
            writeln!(output, "_{hidden} more item(s) not shown._")?;
        }

        Ok(output)
    }
}
