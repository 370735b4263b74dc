//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::ValidationResult;
use crate::engine::{ResourceStatus, RunReport};
use crate::model::{Task, TaskOutcome};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Resource result row for table display.
#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

/// Plan row for table display.
#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Depends on")]
    dependencies: String,
}

#[derive(serde::Serialize)]
struct PlanEntryJson {
    resource: String,
    dependencies: Vec<String>,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a run report for display.
    #[must_use]
    pub fn format_report(&self, report: &RunReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => Self::format_report_text(report),
        }
    }

    fn format_report_text(report: &RunReport) -> String {
        let mut output = String::new();

        let _ = write!(
            output,
            "\nRun {} ({} target, {} ms)\n\n",
            report.run_id,
            report.target,
            report.duration_ms()
        );

        if report.results.is_empty() {
            output.push_str("   No resources declared.\n");
            return output;
        }

        let rows: Vec<ResultRow> = report
            .results
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let (status, detail) = Self::format_status(&r.status);
                ResultRow {
                    index: i + 1,
                    resource: r.key.to_string(),
                    status,
                    detail: Self::truncate(&detail, 60),
                }
            })
            .collect();
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let summary = if report.is_success() {
            format!("{} Reconciled", "✓".green())
        } else {
            format!("{} Reconciliation incomplete", "✗".red())
        };
        let _ = write!(
            output,
            "\n{summary}: {} done, {} failed, {} skipped\n",
            report.succeeded().to_string().green(),
            report.failed().to_string().red(),
            report.skipped().to_string().yellow()
        );

        output
    }

    /// Formats the execution order of a task set.
    #[must_use]
    pub fn format_plan(&self, tasks: &[Box<dyn Task>]) -> String {
        match self.format {
            OutputFormat::Json => {
                let entries: Vec<PlanEntryJson> = tasks
                    .iter()
                    .map(|t| PlanEntryJson {
                        resource: t.key().to_string(),
                        dependencies: t.dependencies().iter().map(ToString::to_string).collect(),
                    })
                    .collect();
                serde_json::to_string_pretty(&entries).unwrap_or_default()
            }
            OutputFormat::Text => {
                if tasks.is_empty() {
                    return format!("{} Nothing to reconcile.\n", "✓".green());
                }
                let rows: Vec<PlanRow> = tasks
                    .iter()
                    .enumerate()
                    .map(|(i, t)| {
                        let deps: Vec<String> =
                            t.dependencies().iter().map(ToString::to_string).collect();
                        PlanRow {
                            index: i + 1,
                            resource: t.key().to_string(),
                            dependencies: if deps.is_empty() {
                                String::from("-")
                            } else {
                                deps.join(", ")
                            },
                        }
                    })
                    .collect();
                format!("\nExecution order\n\n{}\n", Table::new(rows))
            }
        }
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult, show_warnings: bool) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(result).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = if result.is_valid() {
                    format!("{} Configuration is valid\n", "✓".green())
                } else {
                    let mut output = format!(
                        "{} {} validation error(s):\n",
                        "✗".red(),
                        result.error_count()
                    );
                    for error in &result.errors {
                        let _ = writeln!(output, "   - {error}");
                    }
                    output
                };

                if show_warnings && !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                output
            }
        }
    }

    fn format_status(status: &ResourceStatus) -> (String, String) {
        match status {
            ResourceStatus::Done { outcome } => {
                let label = match outcome {
                    TaskOutcome::Created => "created".green().to_string(),
                    TaskOutcome::Updated(_) => "updated".yellow().to_string(),
                    TaskOutcome::Rendered => "rendered".cyan().to_string(),
                    TaskOutcome::Unchanged | TaskOutcome::Shared => {
                        outcome.to_string().dimmed().to_string()
                    }
                };
                let detail = match outcome {
                    TaskOutcome::Updated(fields) => fields.join(", "),
                    _ => String::new(),
                };
                (label, detail)
            }
            ResourceStatus::Failed { message } => ("failed".red().to_string(), message.clone()),
            ResourceStatus::Skipped { dependency } => (
                "skipped".yellow().to_string(),
                format!("dependency {dependency} failed"),
            ),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}
