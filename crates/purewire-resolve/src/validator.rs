//! Lifetime validation of a built root graph.
//!
//! Walks eager edges from the root carrying what the current path has
//! captured so far: the nearest singleton, the nearest scoped node, and
//! whether the root is static. A deferred edge starts a fresh context,
//! since the provider runs after its consumer has been constructed.

use std::collections::HashSet;

use petgraph::stable_graph::NodeIndex;
use petgraph::visit::EdgeFiltered;

use crate::builder::Issue;
use crate::diagnostics::Message;
use crate::graph::{EdgeKind, ResolutionGraph};
use crate::merger::{EffectiveTable, TableRoot};
use crate::model::{ArgKind, Lifetime, Recipe, RootKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
struct Capture {
    singleton: Option<NodeIndex>,
    scoped: Option<NodeIndex>,
    from_static_root: bool,
}

/// Validates the graph of `root` and returns the defects found.
#[must_use]
pub fn validate(graph: &ResolutionGraph, root: &TableRoot, table: &EffectiveTable) -> Vec<Issue> {
    let Some(start) = graph.root() else {
        return Vec::new();
    };
    let mut walk = Walk {
        graph,
        table,
        root,
        visited: HashSet::new(),
        issues: Vec::new(),
    };
    let capture = Capture {
        from_static_root: root.kind == RootKind::Static,
        ..Capture::default()
    };
    walk.visit(start, capture);

    if walk.issues.is_empty() && graph.has_eager_cycle() {
        walk.report_cycle();
    }
    tracing::debug!(root = %root.describe(), defects = walk.issues.len(), "lifetimes validated");
    walk.issues
}

struct Walk<'a> {
    graph: &'a ResolutionGraph,
    table: &'a EffectiveTable,
    root: &'a TableRoot,
    visited: HashSet<(NodeIndex, Capture)>,
    issues: Vec<Issue>,
}

impl Walk<'_> {
    fn visit(&mut self, index: NodeIndex, capture: Capture) {
        if !self.visited.insert((index, capture)) {
            return;
        }
        let node = self.graph.node(index);

        if node.lifetime == Lifetime::Scoped {
            if let Some(singleton) = capture.singleton {
                let consumer = self.graph.node(singleton);
                self.issues.push((
                    consumer.location.clone(),
                    Message::LifetimeDefect {
                        consumer: consumer.label.clone(),
                        consumer_lifetime: consumer.lifetime.to_string(),
                        dependency: node.label.clone(),
                        dependency_lifetime: node.lifetime.to_string(),
                    },
                ));
            }
            if let Some(scoped) = capture.scoped {
                let consumer = self.graph.node(scoped);
                if consumer.scope != node.scope {
                    self.issues.push((
                        consumer.location.clone(),
                        Message::CrossScopeCapture {
                            consumer: consumer.label.clone(),
                            consumer_scope: scope_name(consumer.scope.as_deref()),
                            dependency: node.label.clone(),
                            dependency_scope: scope_name(node.scope.as_deref()),
                        },
                    ));
                }
            }
        }

        if capture.from_static_root {
            if let Some(requirement) = self.instance_requirement(index) {
                self.issues.push((
                    self.root.location.clone(),
                    Message::StaticRootDefect {
                        root: self.root.describe(),
                        dependency: node.label.clone(),
                        requirement,
                    },
                ));
            }
        }

        let mut inner = capture;
        match node.lifetime {
            Lifetime::Singleton => inner.singleton = Some(index),
            Lifetime::Scoped => inner.scoped = Some(index),
            _ => {}
        }
        for (child, edge) in self.graph.dependencies(index) {
            match edge.kind {
                EdgeKind::Eager => self.visit(child, inner),
                EdgeKind::Deferred => self.visit(child, Capture::default()),
            }
        }
    }

    /// What a node needs from a composition instance, if anything.
    fn instance_requirement(&self, index: NodeIndex) -> Option<String> {
        let node = self.graph.node(index);
        if node.lifetime.is_long_lived() {
            return Some(format!("the {} instance storage", node.lifetime));
        }
        let binding = self.table.binding(node.binding()?);
        match &binding.recipe {
            Recipe::Arg {
                name,
                kind: ArgKind::Composition,
            } => Some(format!("the composition argument \"{name}\"")),
            _ => None,
        }
    }

    fn report_cycle(&mut self) {
        let eager = EdgeFiltered::from_fn(self.graph.petgraph(), |e| {
            e.weight().kind == EdgeKind::Eager
        });
        let Some(component) = petgraph::algo::kosaraju_scc(&eager)
            .into_iter()
            .find(|c| c.len() > 1 || c.iter().any(|&n| self.graph.has_self_loop(n)))
        else {
            return;
        };
        let first = self.graph.node(component[0]);
        let path: Vec<String> = component
            .iter()
            .rev()
            .chain(component.last())
            .map(|&n| self.graph.node(n).contract.to_string())
            .collect();
        self.issues.push((
            first.location.clone(),
            Message::CyclicDependency {
                path: path.join(" -> "),
            },
        ));
    }
}

fn scope_name(scope: Option<&str>) -> String {
    scope.unwrap_or("composition").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{CycleLog, build_root};
    use crate::diagnostics::DiagnosticId;
    use crate::model::{Binding, ContractSpec, Setup};
    use crate::resolver::{Resolver, ShapeRegistry};
    use crate::testing::{construct, lifetime, root, setup, table, ty};

    fn validate_setup(setup: Setup) -> Vec<DiagnosticId> {
        let table = table(&[setup]);
        let shapes = ShapeRegistry::builtin();
        let root = &table.roots()[0];
        let build = build_root(Resolver::new(&table, &shapes), root, &mut CycleLog::new());
        assert!(build.is_resolved(), "issues: {:?}", build.issues);
        validate(&build.graph, root, &table)
            .into_iter()
            .map(|(_, m)| m.id())
            .collect()
    }

    fn scoped(binding: Binding, scope: Option<&str>) -> Binding {
        let mut binding = lifetime(binding, Lifetime::Scoped);
        binding.scope = scope.map(str::to_string);
        binding
    }

    #[test]
    fn singleton_capturing_scoped_is_a_defect() {
        let ids = validate_setup(setup(
            vec![
                lifetime(construct("ICache", "Cache", &[&["ISession"]]), Lifetime::Singleton),
                scoped(construct("ISession", "Session", &[]), None),
            ],
            vec![root("Root", "ICache")],
        ));
        assert_eq!(ids, vec![DiagnosticId::ErrorLifetimeDefect]);
    }

    #[test]
    fn defect_is_found_through_transients() {
        let ids = validate_setup(setup(
            vec![
                lifetime(construct("ICache", "Cache", &[&["IHelper"]]), Lifetime::Singleton),
                construct("IHelper", "Helper", &[&["ISession"]]),
                scoped(construct("ISession", "Session", &[]), None),
            ],
            vec![root("Root", "ICache")],
        ));
        assert_eq!(ids, vec![DiagnosticId::ErrorLifetimeDefect]);
    }

    #[test]
    fn func_defers_the_capture() {
        let ids = validate_setup(setup(
            vec![
                lifetime(
                    construct("ICache", "Cache", &[&["Func<ISession>"]]),
                    Lifetime::Singleton,
                ),
                scoped(construct("ISession", "Session", &[]), None),
            ],
            vec![root("Root", "ICache")],
        ));
        assert!(ids.is_empty());
    }

    #[test]
    fn scoped_across_named_scopes_is_a_defect() {
        let ids = validate_setup(setup(
            vec![
                scoped(construct("IRequest", "Request", &[&["ISession"]]), Some("request")),
                scoped(construct("ISession", "Session", &[]), Some("session")),
            ],
            vec![root("Root", "IRequest")],
        ));
        assert_eq!(ids, vec![DiagnosticId::ErrorLifetimeDefect]);

        let ids = validate_setup(setup(
            vec![
                scoped(construct("IRequest", "Request", &[&["ISession"]]), Some("request")),
                scoped(construct("ISession", "Session", &[]), Some("request")),
            ],
            vec![root("Root", "IRequest")],
        ));
        assert!(ids.is_empty());
    }

    #[test]
    fn static_root_may_reach_a_singleton_through_func() {
        let mut static_root = root("Root", "IService");
        static_root.kind = RootKind::Static;
        let ids = validate_setup(setup(
            vec![
                construct("IService", "Service", &[&["Func<ICache>"]]),
                lifetime(construct("ICache", "Cache", &[]), Lifetime::Singleton),
            ],
            vec![static_root],
        ));
        assert!(ids.is_empty());
    }

    #[test]
    fn static_root_cannot_reach_instance_state() {
        let mut static_root = root("Root", "IService");
        static_root.kind = RootKind::Static;
        let ids = validate_setup(setup(
            vec![
                construct("IService", "Service", &[&["ICache", "string"]]),
                lifetime(construct("ICache", "Cache", &[]), Lifetime::Singleton),
                Binding {
                    contracts: vec![ContractSpec::new(ty("string"))],
                    lifetime: None,
                    recipe: Recipe::Arg {
                        name: "name".into(),
                        kind: ArgKind::Composition,
                    },
                    scope: None,
                    disposable: false,
                    location: purewire_common::types::SourceLocation::default(),
                },
            ],
            vec![static_root],
        ));
        assert_eq!(
            ids,
            vec![
                DiagnosticId::ErrorLifetimeDefect,
                DiagnosticId::ErrorLifetimeDefect
            ]
        );
    }
}
