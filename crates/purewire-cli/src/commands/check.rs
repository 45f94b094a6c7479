//! `pwire check`: Resolve every composition and report diagnostics.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;

use purewire_common::constants::DEFAULT_SETUP_FILE;

use super::{GlobalArgs, exit_code, resolve};
use crate::output::{self, OutputFormat};

/// Arguments for the `check` command.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Path to the setup document.
    #[arg(default_value = DEFAULT_SETUP_FILE)]
    pub file: PathBuf,
}

/// Executes the `check` command.
///
/// # Errors
///
/// Returns an error if the configuration or the document cannot be loaded.
pub fn execute(args: &CheckArgs, global: &GlobalArgs) -> anyhow::Result<ExitCode> {
    tracing::info!(file = %args.file.display(), "checking setup document");
    let report = resolve(&args.file, global)?;
    match global.format {
        OutputFormat::Text => output::print_report(&report),
        OutputFormat::Json => {
            let diagnostics: Vec<_> = report.diagnostics().collect();
            output::print_json(&diagnostics)?;
        }
    }
    Ok(exit_code(&report))
}
