//! Graph construction for one composition root.
//!
//! The builder walks requests depth-first from the root, asking the
//! [`Resolver`] what satisfies each one and wiring the answers into a
//! [`ResolutionGraph`]. Along the way it
//!
//! - shares instances of non-transient bindings,
//! - detects eager cycles while letting deferred edges close loops,
//! - tries constructors in preference order, rolling back failed candidates,
//! - supplies provider arguments to the subtree of their provider,
//! - satisfies factory injections from earlier overrides in the same factory.
//!
//! Problems are collected as issues; the caller forwards them to the
//! composition's diagnostic sink.

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap, HashSet};

use petgraph::stable_graph::NodeIndex;

use purewire_common::config::ShapeStrategy;
use purewire_common::types::SourceLocation;

use crate::diagnostics::Message;
use crate::graph::{
    BlockId, Checkpoint, Edge, EdgeKind, NodeOrigin, ResolutionGraph, ResolutionNode,
};
use crate::merger::{BindingId, TableBinding, TableRoot};
use crate::model::{Constructor, Contract, FactoryStep, Lifetime, Recipe};
use crate::resolver::{Request, Resolution, Resolver, VirtualDependency};
use crate::types::{Substitution, TypeRef};

/// A diagnostic produced while building, before it reaches the sink.
pub type Issue = (SourceLocation, Message);

/// Specializations of one generic binding allowed on a single path before
/// the expansion is reported as a cycle.
const MAX_SPECIALIZATIONS: usize = 4;

/// Cycles already reported for a composition.
///
/// Several roots can run into the same cycle from different entry points;
/// it is reported once.
#[derive(Debug, Default)]
pub struct CycleLog(HashSet<Vec<String>>);

impl CycleLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a cycle; returns `false` if the same cycle was seen before
    /// starting from any of its members.
    pub fn first_report(&mut self, members: &[String]) -> bool {
        let start = members
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.cmp(b.1))
            .map_or(0, |(i, _)| i);
        let mut normalized = members[start..].to_vec();
        normalized.extend_from_slice(&members[..start]);
        self.0.insert(normalized)
    }
}

/// The graph of one root and the issues found building it.
#[derive(Debug)]
pub struct RootBuild {
    /// The graph; its root is unset when the root contract failed.
    pub graph: ResolutionGraph,
    /// Issues in discovery order.
    pub issues: Vec<Issue>,
    /// Bindings the root reached, including those of rejected constructors.
    pub touched: BTreeSet<BindingId>,
}

impl RootBuild {
    /// Returns `true` when the root and everything it needs resolved.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.graph.root().is_some()
    }
}

/// Builds the graph of `root`.
pub fn build_root(resolver: Resolver<'_>, root: &TableRoot, cycles: &mut CycleLog) -> RootBuild {
    let _span = tracing::debug_span!("build_root", root = %root.describe()).entered();
    let mut builder = Builder::new(resolver, cycles);
    let consumer = root.describe();
    let site = Site {
        consumer: &consumer,
        location: &root.location,
    };
    let request = Request::new(root.contract.clone());
    if let Some(node) = builder.resolve(
        &request,
        EdgeKind::Eager,
        ResolutionGraph::root_block(),
        &site,
    ) {
        builder.graph.set_root(node);
    }
    tracing::debug!(
        nodes = builder.graph.node_count(),
        issues = builder.issues.len(),
        "root graph built"
    );
    RootBuild {
        graph: builder.graph,
        issues: builder.issues,
        touched: builder.touched,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PathKey {
    Binding(BindingId, Substitution),
    Contract(Contract),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SharedKey {
    binding: BindingId,
    substitution: Substitution,
    block: Option<BlockId>,
}

impl SharedKey {
    fn for_lifetime(
        lifetime: Lifetime,
        binding: BindingId,
        substitution: &Substitution,
        block: BlockId,
    ) -> Option<Self> {
        let block = match lifetime {
            Lifetime::Transient => return None,
            Lifetime::PerBlock => Some(block),
            Lifetime::PerResolve | Lifetime::Scoped | Lifetime::Singleton => None,
        };
        Some(Self {
            binding,
            substitution: substitution.clone(),
            block,
        })
    }
}

struct PathEntry {
    key: PathKey,
    node: NodeIndex,
    segment: usize,
    contract: Contract,
}

enum LocalSource {
    ProviderArgument { block: BlockId, index: usize },
    Node(NodeIndex),
}

struct Local {
    ty: TypeRef,
    source: LocalSource,
}

struct Site<'a> {
    consumer: &'a str,
    location: &'a SourceLocation,
}

struct BuildCheckpoint {
    graph: Checkpoint,
    issues: usize,
    shared: usize,
}

struct Builder<'t, 'c> {
    resolver: Resolver<'t>,
    graph: ResolutionGraph,
    path: Vec<PathEntry>,
    segments: Vec<usize>,
    next_segment: usize,
    shared: HashMap<SharedKey, NodeIndex>,
    shared_log: Vec<SharedKey>,
    failures: HashMap<PathKey, Vec<Issue>>,
    locals: Vec<Local>,
    issues: Vec<Issue>,
    touched: BTreeSet<BindingId>,
    cycles: &'c mut CycleLog,
}

impl<'t, 'c> Builder<'t, 'c> {
    fn new(resolver: Resolver<'t>, cycles: &'c mut CycleLog) -> Self {
        Self {
            resolver,
            graph: ResolutionGraph::new(),
            path: Vec::new(),
            segments: vec![0],
            next_segment: 1,
            shared: HashMap::new(),
            shared_log: Vec::new(),
            failures: HashMap::new(),
            locals: Vec::new(),
            issues: Vec::new(),
            touched: BTreeSet::new(),
            cycles,
        }
    }

    fn current_segment(&self) -> usize {
        self.segments.last().copied().unwrap_or_default()
    }

    fn resolve(
        &mut self,
        request: &Request,
        kind: EdgeKind,
        block: BlockId,
        site: &Site<'_>,
    ) -> Option<NodeIndex> {
        if request.pin.is_none() && request.contract.tag.is_none() {
            if let Some(node) = self.local(&request.contract.ty) {
                return Some(node);
            }
        }
        match self.resolver.resolve(request) {
            Resolution::Unresolved => {
                tracing::trace!(contract = %request.contract, "unresolved");
                self.issues.push((
                    site.location.clone(),
                    Message::UnableToResolve {
                        contract: request.contract.to_string(),
                        consumer: site.consumer.to_string(),
                    },
                ));
                None
            }
            Resolution::Binding {
                binding,
                substitution,
            } => {
                let _ = self.touched.insert(binding);
                let lifetime = self.resolver.table().binding(binding).lifetime;
                let key = PathKey::Binding(binding, substitution.clone());
                if let Some(decided) = self.on_path(
                    &key,
                    &request.contract,
                    kind,
                    lifetime != Lifetime::Transient,
                    site,
                ) {
                    return decided;
                }
                if self.expands(binding, site) {
                    return None;
                }
                self.binding_node(request, binding, substitution, key, block)
            }
            Resolution::Virtual {
                strategy,
                dependencies,
                provider_args,
            } => {
                let key = PathKey::Contract(request.contract.clone());
                if let Some(decided) = self.on_path(&key, &request.contract, kind, false, site) {
                    return decided;
                }
                self.virtual_node(request, strategy, &dependencies, provider_args, key, block, site)
            }
        }
    }

    /// Provider arguments and factory overrides visible to the current subtree.
    fn local(&mut self, ty: &TypeRef) -> Option<NodeIndex> {
        let position = self.locals.iter().rposition(|l| &l.ty == ty)?;
        match self.locals[position].source {
            LocalSource::Node(node) => Some(node),
            LocalSource::ProviderArgument { block, index } => {
                let node = self.graph.add_node(ResolutionNode {
                    contract: Contract::new(ty.clone()),
                    block,
                    origin: NodeOrigin::ProviderArgument { block, index },
                    lifetime: Lifetime::Transient,
                    scope: None,
                    disposable: false,
                    label: format!("provider argument {index}"),
                    location: SourceLocation::default(),
                });
                self.locals[position].source = LocalSource::Node(node);
                Some(node)
            }
        }
    }

    /// Decides a request whose target is already being constructed.
    ///
    /// Deferred requests link back to it. Eager requests in the same
    /// segment are cycles; in an earlier segment a shared instance is
    /// already available while a transient one is constructed afresh.
    fn on_path(
        &mut self,
        key: &PathKey,
        contract: &Contract,
        kind: EdgeKind,
        shared: bool,
        site: &Site<'_>,
    ) -> Option<Option<NodeIndex>> {
        let position = self.path.iter().position(|e| &e.key == key)?;
        let entry = &self.path[position];
        match kind {
            EdgeKind::Deferred => Some(Some(entry.node)),
            EdgeKind::Eager if entry.segment == self.current_segment() => {
                let members: Vec<String> = self.path[position..]
                    .iter()
                    .map(|e| e.contract.to_string())
                    .collect();
                if self.cycles.first_report(&members) {
                    let mut path = members;
                    path.push(contract.to_string());
                    tracing::debug!(cycle = %path.join(" -> "), "eager cycle");
                    self.issues.push((
                        site.location.clone(),
                        Message::CyclicDependency {
                            path: path.join(" -> "),
                        },
                    ));
                }
                Some(None)
            }
            EdgeKind::Eager if shared => Some(Some(entry.node)),
            EdgeKind::Eager => None,
        }
    }

    /// Stops a generic binding that keeps requesting new specializations
    /// of itself, which `on_path` cannot catch since every key differs.
    fn expands(&mut self, binding: BindingId, site: &Site<'_>) -> bool {
        let mut entries = self.path.iter().enumerate().filter(
            |(_, e)| matches!(&e.key, PathKey::Binding(b, _) if *b == binding),
        );
        let Some((first, _)) = entries.next() else {
            return false;
        };
        if entries.count() + 1 < MAX_SPECIALIZATIONS {
            return false;
        }
        let members: Vec<String> = self.path[first..]
            .iter()
            .map(|e| e.contract.to_string())
            .collect();
        if self.cycles.first_report(&members) {
            tracing::debug!(binding = %binding, "generic binding keeps expanding");
            self.issues.push((
                site.location.clone(),
                Message::CyclicDependency {
                    path: format!("{} -> ...", members.join(" -> ")),
                },
            ));
        }
        true
    }

    fn binding_node(
        &mut self,
        request: &Request,
        id: BindingId,
        substitution: Substitution,
        key: PathKey,
        block: BlockId,
    ) -> Option<NodeIndex> {
        let binding = self.resolver.table().binding(id);
        let shared_key = SharedKey::for_lifetime(binding.lifetime, id, &substitution, block);
        if let Some(node) = shared_key.as_ref().and_then(|k| self.shared.get(k)) {
            return Some(*node);
        }
        if let Some(issues) = self.failures.get(&key) {
            self.issues.extend(issues.iter().cloned());
            return None;
        }

        let label = if substitution.is_empty() {
            binding.describe()
        } else {
            format!("{} [{substitution}]", binding.describe())
        };
        let node = self.graph.add_node(ResolutionNode {
            contract: request.contract.clone(),
            block,
            origin: NodeOrigin::Binding {
                binding: id,
                substitution: substitution.clone(),
                constructor: None,
            },
            lifetime: binding.lifetime,
            scope: binding.scope.clone(),
            disposable: binding.disposable,
            label,
            location: binding.location.clone(),
        });

        let issues_before = self.issues.len();
        self.path.push(PathEntry {
            key: key.clone(),
            node,
            segment: self.current_segment(),
            contract: request.contract.clone(),
        });
        let built = match &binding.recipe {
            Recipe::Construct { constructors, .. } => {
                self.construct(node, binding, &substitution, constructors, block)
            }
            Recipe::Factory {
                steps, is_async, ..
            } => self.factory(node, binding, &substitution, steps, *is_async, block),
            Recipe::Arg { .. } => true,
        };
        let _ = self.path.pop();

        if !built {
            let issues = &self.issues[issues_before..];
            let cacheable = self.locals.is_empty()
                && !issues.is_empty()
                && !issues
                    .iter()
                    .any(|(_, m)| matches!(m, Message::CyclicDependency { .. }));
            if cacheable {
                let _ = self.failures.insert(key, issues.to_vec());
            }
            return None;
        }
        if let Some(shared_key) = shared_key {
            let _ = self.shared.insert(shared_key.clone(), node);
            self.shared_log.push(shared_key);
        }
        Some(node)
    }

    fn link(
        &mut self,
        consumer: NodeIndex,
        request: &Request,
        edge: Edge,
        block: BlockId,
        site: &Site<'_>,
    ) -> Option<NodeIndex> {
        let child = self.resolve(request, edge.kind, block, site)?;
        self.graph.add_edge(consumer, child, edge);
        Some(child)
    }

    fn checkpoint(&self) -> BuildCheckpoint {
        BuildCheckpoint {
            graph: self.graph.checkpoint(),
            issues: self.issues.len(),
            shared: self.shared_log.len(),
        }
    }

    fn rollback(&mut self, checkpoint: BuildCheckpoint) -> Vec<Issue> {
        self.graph.rollback(checkpoint.graph);
        for key in self.shared_log.drain(checkpoint.shared..) {
            let _ = self.shared.remove(&key);
        }
        self.issues.split_off(checkpoint.issues)
    }

    /// Tries constructors by explicit ordinal, then by parameter count
    /// (most first), then in declaration order.
    ///
    /// When every candidate fails, the issues of all candidates are kept,
    /// identical messages once.
    fn construct(
        &mut self,
        node: NodeIndex,
        binding: &TableBinding,
        substitution: &Substitution,
        constructors: &[Constructor],
        block: BlockId,
    ) -> bool {
        if constructors.is_empty() {
            return true;
        }
        let mut order: Vec<usize> = (0..constructors.len()).collect();
        order.sort_by_key(|&i| {
            let c = &constructors[i];
            (
                c.ordinal.is_none(),
                c.ordinal.unwrap_or_default(),
                Reverse(c.parameters.len()),
                i,
            )
        });

        let consumer = binding.describe();
        let mut union: Vec<Issue> = Vec::new();
        for index in order {
            let checkpoint = self.checkpoint();
            let mut ok = true;
            for (position, parameter) in constructors[index].parameters.iter().enumerate() {
                let request = Request::new(Contract::request(
                    parameter.ty.substitute(substitution),
                    parameter.tag.as_ref(),
                ));
                let location = site_location(&parameter.location, &binding.location);
                let site = Site {
                    consumer: &consumer,
                    location: &location,
                };
                let edge = Edge {
                    kind: EdgeKind::Eager,
                    position,
                    site: parameter.name.clone(),
                    location: location.clone(),
                };
                ok &= self.link(node, &request, edge, block, &site).is_some();
            }
            if ok {
                if let NodeOrigin::Binding { constructor, .. } = &mut self.graph.node_mut(node).origin
                {
                    *constructor = Some(index);
                }
                return true;
            }
            tracing::trace!(binding = %binding.id, constructor = index, "constructor rejected");
            for issue in self.rollback(checkpoint) {
                if !union.iter().any(|(_, m)| *m == issue.1) {
                    union.push(issue);
                }
            }
        }
        self.issues.extend(union);
        false
    }

    fn factory(
        &mut self,
        node: NodeIndex,
        binding: &TableBinding,
        substitution: &Substitution,
        steps: &[FactoryStep],
        is_async: bool,
        block: BlockId,
    ) -> bool {
        let consumer = binding.describe();
        if is_async {
            self.issues.push((
                binding.location.clone(),
                Message::AsyncFactoryNotSupported { binding: consumer },
            ));
            return false;
        }

        let mut injected: HashMap<&str, TypeRef> = HashMap::new();
        let mut overrides: Vec<TypeRef> = Vec::new();
        let mut ok = true;
        for (position, step) in steps.iter().enumerate() {
            match step {
                FactoryStep::Inject {
                    variable,
                    ty,
                    tag,
                    location,
                } => {
                    let location = site_location(location, &binding.location);
                    if ty
                        .as_ref()
                        .is_some_and(|ty| rebound_elsewhere(&steps[position + 1..], variable, ty))
                    {
                        self.issues.push((
                            location,
                            Message::TypeCannotBeInferred {
                                variable: variable.clone(),
                                binding: consumer.clone(),
                            },
                        ));
                        ok = false;
                        continue;
                    }
                    let Some(ty) = ty.clone().or_else(|| override_type(steps, variable)) else {
                        self.issues.push((
                            location,
                            Message::TypeCannotBeInferred {
                                variable: variable.clone(),
                                binding: consumer.clone(),
                            },
                        ));
                        ok = false;
                        continue;
                    };
                    let ty = ty.substitute(substitution);
                    if tag.is_none() && overrides.contains(&ty) {
                        let _ = injected.insert(variable.as_str(), ty);
                        continue;
                    }
                    let request = Request::new(Contract::request(ty.clone(), tag.as_ref()));
                    let site = Site {
                        consumer: &consumer,
                        location: &location,
                    };
                    let edge = Edge {
                        kind: EdgeKind::Eager,
                        position,
                        site: variable.clone(),
                        location: location.clone(),
                    };
                    ok &= self.link(node, &request, edge, block, &site).is_some();
                    let _ = injected.insert(variable.as_str(), ty);
                }
                FactoryStep::Override {
                    variable,
                    ty,
                    location,
                } => match ty.as_ref().or_else(|| injected.get(variable.as_str())) {
                    Some(ty) => overrides.push(ty.substitute(substitution)),
                    None => {
                        self.issues.push((
                            site_location(location, &binding.location),
                            Message::TypeCannotBeInferred {
                                variable: variable.clone(),
                                binding: consumer.clone(),
                            },
                        ));
                        ok = false;
                    }
                },
            }
        }
        ok
    }

    #[allow(clippy::too_many_arguments)]
    fn virtual_node(
        &mut self,
        request: &Request,
        strategy: ShapeStrategy,
        dependencies: &[VirtualDependency],
        provider_args: Vec<TypeRef>,
        key: PathKey,
        block: BlockId,
        site: &Site<'_>,
    ) -> Option<NodeIndex> {
        let node = self.graph.add_node(ResolutionNode {
            contract: request.contract.clone(),
            block,
            origin: NodeOrigin::Virtual {
                strategy,
                provider_args: provider_args.clone(),
            },
            lifetime: Lifetime::Transient,
            scope: None,
            disposable: false,
            label: strategy_label(strategy).to_string(),
            location: site.location.clone(),
        });
        self.path.push(PathEntry {
            key,
            node,
            segment: self.current_segment(),
            contract: request.contract.clone(),
        });

        let mut ok = true;
        for (position, dependency) in dependencies.iter().enumerate() {
            let edge = Edge::synthesized(dependency.kind, position);
            match dependency.kind {
                EdgeKind::Eager => {
                    ok &= self
                        .link(node, &dependency.request, edge, block, site)
                        .is_some();
                }
                EdgeKind::Deferred => {
                    let provider_block = self.graph.new_block();
                    self.segments.push(self.next_segment);
                    self.next_segment += 1;
                    let mark = self.locals.len();
                    for (index, ty) in provider_args.iter().enumerate() {
                        self.locals.push(Local {
                            ty: ty.clone(),
                            source: LocalSource::ProviderArgument {
                                block: provider_block,
                                index,
                            },
                        });
                    }
                    ok &= self
                        .link(node, &dependency.request, edge, provider_block, site)
                        .is_some();
                    self.locals.truncate(mark);
                    let _ = self.segments.pop();
                }
            }
        }
        let _ = self.path.pop();
        ok.then_some(node)
    }
}

/// The single explicit type the factory's overrides give `variable`.
fn override_type(steps: &[FactoryStep], variable: &str) -> Option<TypeRef> {
    let mut found: Option<&TypeRef> = None;
    for step in steps {
        if let FactoryStep::Override {
            variable: v,
            ty: Some(ty),
            ..
        } = step
        {
            if v != variable {
                continue;
            }
            match found {
                Some(previous) if previous != ty => return None,
                _ => found = Some(ty),
            }
        }
    }
    found.cloned()
}

/// Whether a later override gives `variable` an explicit type other than `declared`.
fn rebound_elsewhere(later: &[FactoryStep], variable: &str, declared: &TypeRef) -> bool {
    later.iter().any(|step| {
        matches!(
            step,
            FactoryStep::Override { variable: v, ty: Some(ty), .. } if v == variable && ty != declared
        )
    })
}

fn site_location(site: &SourceLocation, fallback: &SourceLocation) -> SourceLocation {
    if site.is_unknown() {
        fallback.clone()
    } else {
        site.clone()
    }
}

const fn strategy_label(strategy: ShapeStrategy) -> &'static str {
    match strategy {
        ShapeStrategy::EagerAggregate => "collection",
        ShapeStrategy::Func => "provider",
        ShapeStrategy::Lazy => "lazy provider",
        ShapeStrategy::ThreadLocal => "thread-local provider",
        ShapeStrategy::Completed => "completed task",
        ShapeStrategy::Tuple => "tuple",
    }
}
