//! `pwire graph`: Print the resolution tree of one root.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;

use purewire_common::constants::DEFAULT_SETUP_FILE;
use purewire_common::error::PurewireError;

use super::{GlobalArgs, exit_code, resolve};
use crate::output::{self, OutputFormat};

/// Arguments for the `graph` command.
#[derive(Args, Debug)]
pub struct GraphArgs {
    /// Path to the setup document.
    #[arg(default_value = DEFAULT_SETUP_FILE)]
    pub file: PathBuf,

    /// Name of the root to print.
    #[arg(long)]
    pub root: String,

    /// Composition holding the root; the first match wins when absent.
    #[arg(long)]
    pub composition: Option<String>,
}

/// Executes the `graph` command.
///
/// The tree is printed even when the root has errors, since it shows how
/// far resolution got.
///
/// # Errors
///
/// Returns an error if the configuration or the document cannot be loaded,
/// or if no composition has the requested root.
pub fn execute(args: &GraphArgs, global: &GlobalArgs) -> anyhow::Result<ExitCode> {
    tracing::info!(file = %args.file.display(), root = %args.root, "rendering resolution graph");
    let report = resolve(&args.file, global)?;
    let found = report
        .compositions
        .iter()
        .filter(|c| args.composition.as_ref().is_none_or(|name| &c.name == name))
        .find_map(|c| c.root(&args.root).map(|r| (c, r)));
    let Some((composition, root)) = found else {
        return Err(PurewireError::NotFound {
            kind: "root",
            id: args.root.clone(),
        }
        .into());
    };

    match global.format {
        OutputFormat::Text => {
            println!("{}.{}", composition.name, root.name);
            print!("{}", root.graph);
            print!("{}", output::format_diagnostics(composition));
        }
        OutputFormat::Json => output::print_json(&root.graph.view())?,
    }
    Ok(exit_code(&report))
}
