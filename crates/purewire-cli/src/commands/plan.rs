//! `pwire plan`: Print construction plans of resolved roots.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;

use purewire_common::constants::DEFAULT_SETUP_FILE;
use purewire_common::error::PurewireError;

use super::{GlobalArgs, exit_code, resolve};
use crate::output::{self, OutputFormat};

/// Arguments for the `plan` command.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Path to the setup document.
    #[arg(default_value = DEFAULT_SETUP_FILE)]
    pub file: PathBuf,

    /// Only print the root with this name.
    #[arg(long)]
    pub root: Option<String>,

    /// Only print roots of this composition.
    #[arg(long)]
    pub composition: Option<String>,
}

/// Executes the `plan` command.
///
/// Roots whose graph has errors have no plan; their diagnostics are
/// printed instead.
///
/// # Errors
///
/// Returns an error if the configuration or the document cannot be loaded,
/// or if `--root` names no root.
pub fn execute(args: &PlanArgs, global: &GlobalArgs) -> anyhow::Result<ExitCode> {
    tracing::info!(file = %args.file.display(), root = ?args.root, "planning roots");
    let report = resolve(&args.file, global)?;
    let compositions = report
        .compositions
        .iter()
        .filter(|c| args.composition.as_ref().is_none_or(|name| &c.name == name));

    let mut plans = Vec::new();
    let mut matched = false;
    for composition in compositions {
        let roots = composition
            .roots
            .iter()
            .filter(|r| args.root.as_ref().is_none_or(|name| &r.name == name));
        for root in roots {
            matched = true;
            match (&root.plan, global.format) {
                (Some(plan), OutputFormat::Text) => println!("{plan}"),
                (Some(plan), OutputFormat::Json) => plans.push(plan),
                (None, OutputFormat::Text) => {
                    println!("{}.{}: no plan", composition.name, root.name);
                    print!("{}", output::format_diagnostics(composition));
                }
                (None, OutputFormat::Json) => {}
            }
        }
    }
    if let Some(root) = args.root.as_ref().filter(|_| !matched) {
        return Err(PurewireError::NotFound {
            kind: "root",
            id: root.clone(),
        }
        .into());
    }
    if global.format == OutputFormat::Json {
        output::print_json(&plans)?;
    }
    Ok(exit_code(&report))
}
