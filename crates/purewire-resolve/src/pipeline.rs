//! The resolution pipeline: merge, build, validate and plan every composition.

use std::collections::BTreeSet;

use rayon::prelude::*;
use serde::Serialize;

use purewire_common::config::EngineConfig;

use crate::builder::{CycleLog, build_root};
use crate::diagnostics::{Diagnostic, DiagnosticSink, Message};
use crate::graph::ResolutionGraph;
use crate::hints::Hints;
use crate::merger::{BindingId, EffectiveTable, SetupIndex, merge};
use crate::model::Setup;
use crate::plan::{ConstructionPlan, plan};
use crate::resolver::{Resolver, ShapeRegistry};
use crate::validator::validate;

/// Outcome of one root.
#[derive(Debug, Serialize)]
pub struct RootReport {
    /// Root name or contract.
    pub name: String,
    /// The resolution graph, kept for inspection.
    #[serde(skip)]
    pub graph: ResolutionGraph,
    /// Construction plan; absent when the root or its composition has errors.
    pub plan: Option<ConstructionPlan>,
}

/// Outcome of one composition.
#[derive(Debug, Serialize)]
pub struct CompositionReport {
    /// Composition name.
    pub name: String,
    /// Diagnostics after severity hints, in discovery order.
    pub diagnostics: Vec<Diagnostic>,
    /// Roots in declaration order; empty when the merge failed.
    pub roots: Vec<RootReport>,
}

impl CompositionReport {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Looks a root up by name.
    #[must_use]
    pub fn root(&self, name: &str) -> Option<&RootReport> {
        self.roots.iter().find(|r| r.name == name)
    }

    /// The plan of a root, if it has one.
    #[must_use]
    pub fn plan(&self, root: &str) -> Option<&ConstructionPlan> {
        self.root(root).and_then(|r| r.plan.as_ref())
    }
}

/// Outcome of a run.
#[derive(Debug, Serialize)]
pub struct Report {
    /// Compositions in input order.
    pub compositions: Vec<CompositionReport>,
}

impl Report {
    /// Returns `true` if any composition has an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.compositions.iter().any(CompositionReport::has_errors)
    }

    /// Looks a composition up by name.
    #[must_use]
    pub fn composition(&self, name: &str) -> Option<&CompositionReport> {
        self.compositions.iter().find(|c| c.name == name)
    }

    /// All diagnostics of all compositions.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.compositions.iter().flat_map(|c| c.diagnostics.iter())
    }
}

/// Resolves setups into reports.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    shapes: ShapeRegistry,
}

impl Engine {
    /// Creates an engine; extra shapes from `config` extend the built-in registry.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let shapes = ShapeRegistry::with_registrations(&config.collection_shapes);
        Self { config, shapes }
    }

    /// The engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs every composition of `setups`.
    ///
    /// Compositions share nothing mutable and are processed in parallel when
    /// the configuration allows it; the report keeps input order.
    #[must_use]
    pub fn run(&self, setups: &[Setup]) -> Report {
        let index = SetupIndex::new(setups);
        let names = index.compositions();
        tracing::info!(
            setups = setups.len(),
            compositions = names.len(),
            parallel = self.config.parallel,
            "resolving compositions"
        );
        let compositions: Vec<CompositionReport> = if self.config.parallel {
            names
                .par_iter()
                .map(|name| self.compose(&index, name))
                .collect()
        } else {
            names.iter().map(|name| self.compose(&index, name)).collect()
        };
        Report { compositions }
    }

    fn compose(&self, index: &SetupIndex<'_>, name: &str) -> CompositionReport {
        let _span = tracing::info_span!("composition", name).entered();
        let mut sink = DiagnosticSink::new();
        let Some(table) = merge(index, name, &self.config.hints, &mut sink) else {
            let hints = Hints::new(self.config.hints.clone());
            let culture = hints.culture().unwrap_or(self.config.culture);
            return CompositionReport {
                name: name.to_string(),
                diagnostics: sink.finish(&hints, culture),
                roots: Vec::new(),
            };
        };

        let merge_failed = sink.has_errors(table.hints());
        let resolver = Resolver::new(&table, &self.shapes);
        let mut cycles = CycleLog::new();
        let mut used = BTreeSet::new();
        let mut roots = Vec::new();
        for root in table.roots() {
            let build = build_root(resolver, root, &mut cycles);
            used.extend(build.touched.iter().copied());
            let mut failed = !build.is_resolved();
            for (location, message) in build.issues {
                sink.report(location, message);
            }
            let defects = validate(&build.graph, root, &table);
            failed |= !defects.is_empty();
            for (location, message) in defects {
                sink.report(location, message);
            }
            let plan = if failed || merge_failed {
                None
            } else {
                plan(&build.graph, root, &table)
            };
            if plan.is_none() {
                tracing::warn!(root = %root.describe(), "root has no construction plan");
            }
            roots.push(RootReport {
                name: root.describe(),
                graph: build.graph,
                plan,
            });
        }
        report_unused(&table, &used, &mut sink);

        let culture = table.hints().culture().unwrap_or(self.config.culture);
        let diagnostics = sink.finish(table.hints(), culture);
        tracing::info!(
            roots = roots.len(),
            diagnostics = diagnostics.len(),
            "composition resolved"
        );
        CompositionReport {
            name: name.to_string(),
            diagnostics,
            roots,
        }
    }
}

/// Shadowed bindings nothing uses get [`Message::BindingNotUsed`] unless they
/// already carry an override warning. Active bindings no root reaches get
/// [`Message::MetadataDefect`], checked only when the composition has roots.
fn report_unused(table: &EffectiveTable, used: &BTreeSet<BindingId>, sink: &mut DiagnosticSink) {
    for binding in table.bindings() {
        if used.contains(&binding.id) {
            continue;
        }
        if table.is_shadowed(binding.id) {
            if !table.is_overriding(binding.id) {
                sink.report(
                    binding.location.clone(),
                    Message::BindingNotUsed {
                        binding: binding.describe(),
                    },
                );
            }
        } else if !table.roots().is_empty() {
            sink.report(
                binding.location.clone(),
                Message::MetadataDefect {
                    binding: binding.describe(),
                },
            );
        }
    }
}
