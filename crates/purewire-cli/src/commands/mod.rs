//! CLI command definitions and dispatch.

pub mod check;
pub mod graph;
pub mod plan;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};

use purewire_common::config::EngineConfig;
use purewire_common::constants::BIN_NAME;
use purewire_common::types::Culture;
use purewire_resolve::Report;
use purewire_sdk::composer::Composer;

use crate::output::OutputFormat;

/// purewire: compile-time dependency-injection resolver.
#[derive(Parser, Debug)]
#[command(name = BIN_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Log output encoding.
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Options shared by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Engine configuration file (YAML or JSON).
    #[arg(long, global = true, env = "PUREWIRE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Locale of diagnostic messages (`en`, `ru`).
    #[arg(long, global = true)]
    pub culture: Option<String>,

    /// Caller hint, applied below every setup's own hints.
    #[arg(long = "hint", global = true, value_name = "KEY=VALUE", value_parser = parse_hint)]
    pub hints: Vec<(String, String)>,

    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log output encoding.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve every composition and print its diagnostics.
    Check(check::CheckArgs),
    /// Print construction plans.
    Plan(plan::PlanArgs),
    /// Print the resolution tree of one root.
    Graph(graph::GraphArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the configuration or a setup document cannot be loaded.
pub fn execute(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Command::Check(args) => check::execute(&args, &cli.global),
        Command::Plan(args) => plan::execute(&args, &cli.global),
        Command::Graph(args) => graph::execute(&args, &cli.global),
    }
}

/// Builds the engine configuration from the config file and the flags.
///
/// # Errors
///
/// Returns an error if the configuration file cannot be loaded.
pub fn engine_config(global: &GlobalArgs) -> anyhow::Result<EngineConfig> {
    let mut config = match &global.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(culture) = &global.culture {
        config.culture = Culture::from_name(culture);
    }
    for (key, value) in &global.hints {
        let _ = config.hints.insert(key.clone(), value.clone());
    }
    Ok(config)
}

/// Loads a setup document and resolves it.
///
/// # Errors
///
/// Returns an error if the configuration or the document cannot be loaded.
pub fn resolve(file: &Path, global: &GlobalArgs) -> anyhow::Result<Report> {
    let mut composer = Composer::new(engine_config(global)?);
    let _ = composer
        .load(file)
        .with_context(|| format!("loading setups from {}", file.display()))?;
    Ok(composer.compose())
}

/// Exit status for a finished run.
pub fn exit_code(report: &Report) -> ExitCode {
    if report.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn parse_hint(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty hint name in `{raw}`"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hints_split_on_first_equals() {
        assert_eq!(
            parse_hint("Severity.WarningMetadataDefect=Hidden"),
            Ok(("Severity.WarningMetadataDefect".into(), "Hidden".into()))
        );
        assert_eq!(
            parse_hint("Culture = ru"),
            Ok(("Culture".into(), "ru".into()))
        );
        assert!(parse_hint("Culture").is_err());
        assert!(parse_hint("=ru").is_err());
    }

    #[test]
    fn flags_override_configuration() {
        let cli = Cli::parse_from([
            "pwire",
            "check",
            "setup.yaml",
            "--culture",
            "ru",
            "--hint",
            "ThreadSafe=Off",
        ]);
        let config = engine_config(&cli.global).expect("configuration");
        assert_eq!(config.culture, Culture::Ru);
        assert_eq!(config.hints.get("ThreadSafe").map(String::as_str), Some("Off"));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
