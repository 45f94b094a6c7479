//! Construction plans derived from validated root graphs.
//!
//! A plan is what a code emitter consumes: numbered slots, routines listing
//! construction steps in dependency-first order, provider routines for
//! deferred edges, and the disposal order of disposable instances.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use petgraph::stable_graph::NodeIndex;
use serde::Serialize;

use purewire_common::config::ShapeStrategy;

use crate::graph::{EdgeKind, NodeOrigin, ResolutionGraph};
use crate::merger::{EffectiveTable, TableRoot};
use crate::model::{ArgKind, Contract, FactoryStep, Lifetime, Recipe, RootKind};

/// How a step produces its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepRecipe {
    /// Calls a constructor.
    Construct {
        /// Implementation type.
        implementation: String,
        /// Chosen constructor, absent for implicit parameterless ones.
        constructor: Option<usize>,
    },
    /// Evaluates a factory expression.
    Factory {
        /// Factory body.
        expression: String,
    },
    /// Reads an external argument.
    Argument {
        /// Argument name.
        name: String,
        /// Argument origin.
        kind: ArgKind,
    },
    /// Builds a collection, provider, task or tuple.
    Virtual {
        /// Synthesis strategy.
        strategy: ShapeStrategy,
    },
}

/// A value passed to a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepArgument {
    /// The value of an earlier step.
    Slot(usize),
    /// A provider wrapping another routine.
    Provider {
        /// Routine invoked by the provider.
        routine: usize,
        /// Provider flavour.
        kind: ShapeStrategy,
    },
    /// An argument of the enclosing provider call.
    ProviderArgument(usize),
    /// A factory variable satisfied by an earlier override.
    Inline(String),
}

/// One construction step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    /// Slot receiving the value.
    pub slot: usize,
    /// Contract the value satisfies.
    pub contract: Contract,
    /// Lifetime of the value.
    pub lifetime: Lifetime,
    /// Construction recipe.
    pub recipe: StepRecipe,
    /// Arguments in parameter order.
    pub arguments: Vec<StepArgument>,
    /// Whether the slot is reused once initialized.
    pub shared: bool,
}

/// A sequence of steps producing one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Routine {
    /// Routine number; `0` is the root's entry routine.
    pub id: usize,
    /// Slot of the produced value.
    pub target: usize,
    /// Steps in dependency-first order.
    pub steps: Vec<Step>,
}

/// A declared slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slot {
    /// Slot number.
    pub id: usize,
    /// Contract stored in the slot.
    pub contract: Contract,
    /// Lifetime of the stored value.
    pub lifetime: Lifetime,
    /// Scope of a scoped slot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// An argument of the root member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RootArgument {
    /// Argument name.
    pub name: String,
    /// Argument type.
    pub contract: Contract,
}

/// Disposal order of disposable slots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DisposalPlan {
    /// Singleton and scoped slots, disposed with the composition or scope.
    pub scope_teardown: Vec<usize>,
    /// Other slots, disposed with the resolution that created them.
    pub per_owner: Vec<usize>,
}

/// Everything an emitter needs to generate one root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstructionPlan {
    /// Composition name.
    pub composition: String,
    /// Root name or contract.
    pub root: String,
    /// Root member shape.
    pub kind: RootKind,
    /// Whether shared slots need thread-safe initialization.
    pub thread_safe: bool,
    /// The root's entry routine.
    pub entry: Routine,
    /// Routines invoked by providers.
    pub providers: Vec<Routine>,
    /// All slots used by the routines.
    pub slots: Vec<Slot>,
    /// Arguments of the root member.
    pub root_args: Vec<RootArgument>,
    /// Disposal order.
    pub disposal: DisposalPlan,
}

/// Derives the plan of a validated root graph.
///
/// Returns `None` when the graph has no resolved root.
#[must_use]
pub fn plan(graph: &ResolutionGraph, root: &TableRoot, table: &EffectiveTable) -> Option<ConstructionPlan> {
    let start = graph.root()?;
    let mut planner = Planner {
        graph,
        table,
        slots: BTreeMap::new(),
        routines: HashMap::new(),
        pending: Vec::new(),
        created: Vec::new(),
        root_args: Vec::new(),
    };
    let entry = planner.routine(start, 0);
    let mut providers = Vec::new();
    while let Some((target, id)) = planner.pending.pop() {
        providers.push(planner.routine(target, id));
    }
    providers.sort_by_key(|r| r.id);

    let disposal = planner.disposal();
    let mut slots: Vec<Slot> = planner
        .slots
        .iter()
        .map(|(&index, &id)| {
            let node = graph.node(index);
            Slot {
                id,
                contract: node.contract.clone(),
                lifetime: node.lifetime,
                scope: node.scope.clone(),
            }
        })
        .collect();
    slots.sort_by_key(|s| s.id);

    tracing::debug!(
        root = %root.describe(),
        slots = slots.len(),
        providers = providers.len(),
        "construction plan derived"
    );
    Some(ConstructionPlan {
        composition: table.composition().to_string(),
        root: root.describe(),
        kind: root.kind,
        thread_safe: table.hints().thread_safe(),
        entry,
        providers,
        slots,
        root_args: planner.root_args,
        disposal,
    })
}

struct Planner<'a> {
    graph: &'a ResolutionGraph,
    table: &'a EffectiveTable,
    slots: BTreeMap<NodeIndex, usize>,
    routines: HashMap<NodeIndex, usize>,
    pending: Vec<(NodeIndex, usize)>,
    created: Vec<NodeIndex>,
    root_args: Vec<RootArgument>,
}

impl Planner<'_> {
    fn slot(&mut self, index: NodeIndex) -> usize {
        let next = self.slots.len();
        *self.slots.entry(index).or_insert(next)
    }

    fn provider_routine(&mut self, target: NodeIndex) -> usize {
        if let Some(&id) = self.routines.get(&target) {
            return id;
        }
        let id = self.routines.len() + 1;
        let _ = self.routines.insert(target, id);
        self.pending.push((target, id));
        id
    }

    fn routine(&mut self, target: NodeIndex, id: usize) -> Routine {
        let mut steps = Vec::new();
        let mut visited = HashSet::new();
        self.collect(target, &mut visited, &mut steps);
        Routine {
            id,
            target: self.slot(target),
            steps,
        }
    }

    /// Post-order over eager edges in parameter order.
    fn collect(&mut self, index: NodeIndex, visited: &mut HashSet<NodeIndex>, steps: &mut Vec<Step>) {
        if !visited.insert(index) {
            return;
        }
        let graph = self.graph;
        let node = graph.node(index);
        if matches!(node.origin, NodeOrigin::ProviderArgument { .. }) {
            return;
        }
        let mut arguments: Vec<(usize, StepArgument)> = Vec::new();
        for (child, edge) in graph.dependencies(index) {
            let argument = match (&graph.node(child).origin, edge.kind) {
                (NodeOrigin::ProviderArgument { index, .. }, _) => {
                    StepArgument::ProviderArgument(*index)
                }
                (_, EdgeKind::Eager) => {
                    self.collect(child, visited, steps);
                    StepArgument::Slot(self.slot(child))
                }
                (_, EdgeKind::Deferred) => {
                    let kind = match &node.origin {
                        NodeOrigin::Virtual { strategy, .. } => *strategy,
                        _ => ShapeStrategy::Func,
                    };
                    StepArgument::Provider {
                        routine: self.provider_routine(child),
                        kind,
                    }
                }
            };
            arguments.push((edge.position, argument));
        }

        let recipe = match &node.origin {
            NodeOrigin::Binding {
                binding,
                constructor,
                ..
            } => {
                let table = self.table;
                let binding = table.binding(*binding);
                match &binding.recipe {
                    Recipe::Construct { implementation, .. } => StepRecipe::Construct {
                        implementation: implementation.to_string(),
                        constructor: *constructor,
                    },
                    Recipe::Factory {
                        expression, steps, ..
                    } => {
                        for (position, step) in steps.iter().enumerate() {
                            if let FactoryStep::Inject { variable, .. } = step {
                                if !arguments.iter().any(|(p, _)| *p == position) {
                                    arguments.push((position, StepArgument::Inline(variable.clone())));
                                }
                            }
                        }
                        StepRecipe::Factory {
                            expression: expression.clone(),
                        }
                    }
                    Recipe::Arg { name, kind } => {
                        if *kind == ArgKind::Root
                            && !self.root_args.iter().any(|a| &a.name == name)
                        {
                            self.root_args.push(RootArgument {
                                name: name.clone(),
                                contract: node.contract.clone(),
                            });
                        }
                        StepRecipe::Argument {
                            name: name.clone(),
                            kind: *kind,
                        }
                    }
                }
            }
            NodeOrigin::Virtual { strategy, .. } => StepRecipe::Virtual {
                strategy: *strategy,
            },
            NodeOrigin::ProviderArgument { .. } => return,
        };
        arguments.sort_by_key(|(position, _)| *position);

        if !self.created.contains(&index) {
            self.created.push(index);
        }
        steps.push(Step {
            slot: self.slot(index),
            contract: node.contract.clone(),
            lifetime: node.lifetime,
            recipe,
            arguments: arguments.into_iter().map(|(_, a)| a).collect(),
            shared: node.lifetime != Lifetime::Transient,
        });
    }

    fn disposal(&self) -> DisposalPlan {
        let mut disposal = DisposalPlan::default();
        for &index in self.created.iter().rev() {
            let node = self.graph.node(index);
            if !node.disposable {
                continue;
            }
            let Some(&slot) = self.slots.get(&index) else {
                continue;
            };
            if node.lifetime.is_long_lived() {
                disposal.scope_teardown.push(slot);
            } else {
                disposal.per_owner.push(slot);
            }
        }
        disposal
    }
}

impl fmt::Display for StepArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Slot(slot) => write!(f, "s{slot}"),
            Self::Provider { routine, kind } => write!(f, "{kind:?}(r{routine})"),
            Self::ProviderArgument(index) => write!(f, "arg{index}"),
            Self::Inline(variable) => write!(f, "{variable}"),
        }
    }
}

impl fmt::Display for Routine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  r{} -> s{}", self.id, self.target)?;
        for step in &self.steps {
            let arguments = step
                .arguments
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            let call = match &step.recipe {
                StepRecipe::Construct { implementation, .. } => {
                    format!("new {implementation}({arguments})")
                }
                StepRecipe::Factory { expression } => format!("factory {{ {expression} }}({arguments})"),
                StepRecipe::Argument { name, .. } => format!("arg {name}"),
                StepRecipe::Virtual { strategy } => format!("{strategy:?}[{arguments}]"),
            };
            let shared = if step.shared { " shared" } else { "" };
            writeln!(
                f,
                "    s{} = {call} : {} [{}{shared}]",
                step.slot, step.contract, step.lifetime
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for ConstructionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let safety = if self.thread_safe { "thread-safe" } else { "single-threaded" };
        writeln!(
            f,
            "{}.{} ({:?}, {safety})",
            self.composition, self.root, self.kind
        )?;
        write!(f, "{}", self.entry)?;
        for routine in &self.providers {
            write!(f, "{routine}")?;
        }
        if !self.disposal.scope_teardown.is_empty() || !self.disposal.per_owner.is_empty() {
            let list = |slots: &[usize]| {
                slots
                    .iter()
                    .map(|s| format!("s{s}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            writeln!(
                f,
                "  dispose: scope [{}] owner [{}]",
                list(&self.disposal.scope_teardown),
                list(&self.disposal.per_owner)
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{CycleLog, build_root};
    use crate::model::Setup;
    use crate::resolver::{Resolver, ShapeRegistry};
    use crate::testing::{construct, lifetime, root, setup, table};

    fn plan_for(setup: Setup) -> ConstructionPlan {
        let table = table(&[setup]);
        let shapes = ShapeRegistry::builtin();
        let root = &table.roots()[0];
        let build = build_root(Resolver::new(&table, &shapes), root, &mut CycleLog::new());
        plan(&build.graph, root, &table).expect("plan")
    }

    fn disposable(mut binding: crate::model::Binding) -> crate::model::Binding {
        binding.disposable = true;
        binding
    }

    #[test]
    fn steps_are_dependency_first() {
        let plan = plan_for(setup(
            vec![
                construct("IService", "Service", &[&["IDep", "ILog"]]),
                construct("IDep", "Dep", &[&["ILog"]]),
                construct("ILog", "Log", &[]),
            ],
            vec![root("Root", "IService")],
        ));
        let order: Vec<String> = plan
            .entry
            .steps
            .iter()
            .map(|s| s.contract.to_string())
            .collect();
        assert_eq!(order, vec!["ILog", "IDep", "ILog", "IService"]);
        assert_eq!(plan.entry.target, plan.entry.steps[3].slot);
        assert!(plan.providers.is_empty());
    }

    #[test]
    fn deferred_edges_become_provider_routines() {
        let plan = plan_for(setup(
            vec![
                construct("IService", "Service", &[&["Func<int, IDep>"]]),
                construct("IDep", "Dep", &[&["int"]]),
            ],
            vec![root("Root", "IService")],
        ));
        assert_eq!(plan.providers.len(), 1);
        let provider = &plan.providers[0];
        assert_eq!(provider.id, 1);
        assert_eq!(
            provider.steps[0].arguments,
            vec![StepArgument::ProviderArgument(0)]
        );
        let func = &plan.entry.steps[0];
        assert_eq!(
            func.arguments,
            vec![StepArgument::Provider {
                routine: 1,
                kind: ShapeStrategy::Func
            }]
        );
    }

    #[test]
    fn disposal_runs_in_reverse_creation_order() {
        let plan = plan_for(setup(
            vec![
                construct("IService", "Service", &[&["IDb", "IFile"]]),
                disposable(lifetime(construct("IDb", "Db", &[]), Lifetime::Singleton)),
                disposable(construct("IFile", "File", &[])),
            ],
            vec![root("Root", "IService")],
        ));
        let db = plan.entry.steps[0].slot;
        let file = plan.entry.steps[1].slot;
        assert_eq!(plan.disposal.scope_teardown, vec![db]);
        assert_eq!(plan.disposal.per_owner, vec![file]);
        assert!(plan.entry.steps[0].shared);
        assert!(plan.to_string().contains("dispose:"));
    }
}
