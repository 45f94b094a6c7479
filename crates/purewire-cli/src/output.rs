//! Formatted output helpers for CLI commands.
//!
//! Text output is meant for terminals; JSON output mirrors the report
//! structures so scripts can consume them.

use clap::ValueEnum;
use serde::Serialize;

use purewire_resolve::{CompositionReport, Report, Severity};

/// Output encoding of a command.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Prints any serializable value as pretty JSON.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Renders the diagnostics of one composition, one per line.
#[must_use]
pub fn format_diagnostics(composition: &CompositionReport) -> String {
    let mut out = String::new();
    for diagnostic in &composition.diagnostics {
        out.push_str(&format!("  {diagnostic}\n"));
    }
    out
}

/// One-line tally of a composition's diagnostics.
#[must_use]
pub fn summary(composition: &CompositionReport) -> String {
    let count = |severity| {
        composition
            .diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    };
    format!(
        "{}: {} error(s), {} warning(s), {} root(s)",
        composition.name,
        count(Severity::Error),
        count(Severity::Warning),
        composition.roots.len()
    )
}

/// Prints every composition's diagnostics followed by its summary.
pub fn print_report(report: &Report) {
    if report.compositions.is_empty() {
        println!("No compositions found.");
        return;
    }
    for composition in &report.compositions {
        print!("{}", format_diagnostics(composition));
        println!("{}", summary(composition));
    }
}
