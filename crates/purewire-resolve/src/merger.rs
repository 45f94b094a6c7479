//! Binding table merge.
//!
//! Flattens a composition's setup and everything it depends on into one
//! read-only [`EffectiveTable`]: bindings in dependency-then-declaration
//! order, later bindings shadowing earlier ones for the same contract,
//! merged hints, and the composition's roots.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use purewire_common::constants::DISPOSER_TYPES;
use purewire_common::types::SourceLocation;

use crate::diagnostics::{DiagnosticSink, Message};
use crate::hints::Hints;
use crate::model::{
    Binding, Constructor, Contract, FactoryStep, Injection, Lifetime, Recipe, RootKind, Setup,
    SetupKind, Tag, TagSpec,
};
use crate::types::{TypeRef, unify};

/// Position of a binding in its effective table, equal to its declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BindingId(pub usize);

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A binding after merge: lifetime, tags and markers are final.
#[derive(Debug, Clone)]
pub struct TableBinding {
    /// Declaration order across the whole composition.
    pub id: BindingId,
    /// Contracts the binding was declared for.
    pub contracts: Vec<Contract>,
    /// Effective lifetime.
    pub lifetime: Lifetime,
    /// Construction recipe with custom markers applied.
    pub recipe: Recipe,
    /// Setup that declared the binding.
    pub setup: String,
    /// Scope boundary of a scoped binding.
    pub scope: Option<String>,
    /// Whether instances carry the disposer capability.
    pub disposable: bool,
    /// Declaration site.
    pub location: SourceLocation,
}

impl TableBinding {
    /// Human-readable description used in diagnostics.
    #[must_use]
    pub fn describe(&self) -> String {
        let contract = self
            .contracts
            .first()
            .map_or_else(String::new, ToString::to_string);
        match &self.recipe {
            Recipe::Construct { implementation, .. } => {
                if contract.is_empty() || contract == implementation.to_string() {
                    implementation.to_string()
                } else {
                    format!("{implementation} as {contract}")
                }
            }
            Recipe::Factory { .. } => format!("factory of {contract}"),
            Recipe::Arg { name, .. } => format!("argument \"{name}\""),
        }
    }

    /// Returns `true` if any contract type contains a generic marker.
    #[must_use]
    pub fn is_generic(&self) -> bool {
        self.contracts.iter().any(|c| c.ty.contains_marker())
    }
}

/// A composition root after merge.
#[derive(Debug, Clone)]
pub struct TableRoot {
    /// Exposed member name; empty for resolve-only roots.
    pub name: String,
    /// Requested contract.
    pub contract: Contract,
    /// Member shape.
    pub kind: RootKind,
    /// Setup that declared the root.
    pub setup: String,
    /// Declaration site.
    pub location: SourceLocation,
}

impl TableRoot {
    /// Name used in diagnostics: the member name, or the contract.
    #[must_use]
    pub fn describe(&self) -> String {
        if self.name.is_empty() {
            self.contract.to_string()
        } else {
            self.name.clone()
        }
    }
}

/// A member copied into the composition.
#[derive(Debug, Clone)]
pub struct TableMember {
    /// Member name.
    pub name: String,
    /// Forwarded when static, re-instantiated otherwise.
    pub is_static: bool,
    /// Declaring setup.
    pub setup: String,
    /// Declaration site.
    pub location: SourceLocation,
}

/// One contract of one binding replaced by a later binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shadowing {
    /// The contract both bindings declare.
    pub contract: Contract,
    /// The earlier binding.
    pub shadowed: BindingId,
    /// The later binding.
    pub by: BindingId,
}

/// The merged, read-only binding table of one composition.
#[derive(Debug, Clone)]
pub struct EffectiveTable {
    composition: String,
    bindings: Vec<TableBinding>,
    roots: Vec<TableRoot>,
    members: Vec<TableMember>,
    hints: Hints,
    active: HashMap<Contract, BindingId>,
    active_order: Vec<(Contract, BindingId)>,
    any_tagged: HashMap<TypeRef, BindingId>,
    shadowings: Vec<Shadowing>,
    overriding: Vec<BindingId>,
}

impl EffectiveTable {
    /// Composition name.
    #[must_use]
    pub fn composition(&self) -> &str {
        &self.composition
    }

    /// All bindings in declaration order, shadowed ones included.
    #[must_use]
    pub fn bindings(&self) -> &[TableBinding] {
        &self.bindings
    }

    /// Returns one binding.
    #[must_use]
    pub fn binding(&self, id: BindingId) -> &TableBinding {
        &self.bindings[id.0]
    }

    /// Roots in declaration order.
    #[must_use]
    pub fn roots(&self) -> &[TableRoot] {
        &self.roots
    }

    /// Members copied into the composition.
    #[must_use]
    pub fn members(&self) -> &[TableMember] {
        &self.members
    }

    /// Merged hints.
    #[must_use]
    pub const fn hints(&self) -> &Hints {
        &self.hints
    }

    /// The binding active for exactly this contract.
    #[must_use]
    pub fn active(&self, contract: &Contract) -> Option<BindingId> {
        self.active.get(contract).copied()
    }

    /// The binding tagged `Any` for exactly this type.
    #[must_use]
    pub fn any_tagged(&self, ty: &TypeRef) -> Option<BindingId> {
        self.any_tagged.get(ty).copied()
    }

    /// Active contracts with their bindings, in declaration order.
    pub fn active_contracts(&self) -> impl DoubleEndedIterator<Item = (&Contract, BindingId)> {
        self.active_order.iter().map(|(c, id)| (c, *id))
    }

    /// Recorded shadowings in declaration order.
    #[must_use]
    pub fn shadowings(&self) -> &[Shadowing] {
        &self.shadowings
    }

    /// Returns `true` if any contract of `id` was replaced by a later binding.
    #[must_use]
    pub fn is_shadowed(&self, id: BindingId) -> bool {
        self.shadowings.iter().any(|s| s.shadowed == id)
    }

    /// Returns `true` if `id` received an overridden-binding warning.
    #[must_use]
    pub fn is_overriding(&self, id: BindingId) -> bool {
        self.overriding.contains(&id)
    }
}

/// Setups grouped by name; same-named setups are partial declarations
/// of one composition, merged in input order.
#[derive(Debug)]
pub struct SetupIndex<'a> {
    groups: BTreeMap<&'a str, Vec<&'a Setup>>,
    order: Vec<&'a str>,
}

impl<'a> SetupIndex<'a> {
    /// Groups `setups` by name.
    #[must_use]
    pub fn new(setups: &'a [Setup]) -> Self {
        let mut groups: BTreeMap<&str, Vec<&Setup>> = BTreeMap::new();
        let mut order = Vec::new();
        for setup in setups {
            let group = groups.entry(setup.name.as_str()).or_default();
            if group.is_empty() {
                order.push(setup.name.as_str());
            }
            group.push(setup);
        }
        Self { groups, order }
    }

    /// Partial declarations of `name`, in input order.
    #[must_use]
    pub fn partials(&self, name: &str) -> &[&'a Setup] {
        self.groups.get(name).map_or(&[], Vec::as_slice)
    }

    /// Returns `true` if any partial of `name` is global.
    #[must_use]
    pub fn is_global(&self, name: &str) -> bool {
        self.partials(name)
            .iter()
            .any(|s| s.kind == SetupKind::Global)
    }

    /// Names of the setups that produce compositions, in input order.
    #[must_use]
    pub fn compositions(&self) -> Vec<&'a str> {
        self.order
            .iter()
            .copied()
            .filter(|name| !self.is_global(name))
            .collect()
    }

    fn globals(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.order.iter().copied().filter(|name| self.is_global(name))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

struct OrderWalk<'i, 'a> {
    index: &'i SetupIndex<'a>,
    marks: HashMap<&'a str, Mark>,
    stack: Vec<&'a str>,
    order: Vec<&'a str>,
}

impl<'a> OrderWalk<'_, 'a> {
    fn visit(
        &mut self,
        name: &'a str,
        dependent: &str,
        location: &SourceLocation,
        sink: &mut DiagnosticSink,
    ) -> bool {
        match self.marks.get(name) {
            Some(Mark::Done) => return true,
            Some(Mark::Visiting) => {
                let start = self.stack.iter().position(|n| *n == name).unwrap_or(0);
                let mut path: Vec<&str> = self.stack[start..].to_vec();
                path.push(name);
                sink.report(
                    location.clone(),
                    Message::DependsOnCycle {
                        path: path.join(" -> "),
                    },
                );
                return false;
            }
            None => {}
        }
        let partials = self.index.partials(name);
        if partials.is_empty() {
            sink.report(
                location.clone(),
                Message::SetupNotFound {
                    setup: name.to_string(),
                    dependent: dependent.to_string(),
                },
            );
            return false;
        }
        let _ = self.marks.insert(name, Mark::Visiting);
        self.stack.push(name);
        for setup in partials {
            for dependency in &setup.depends_on {
                if !self.visit(dependency.as_str(), name, &setup.location, sink) {
                    return false;
                }
            }
        }
        let _ = self.stack.pop();
        let _ = self.marks.insert(name, Mark::Done);
        self.order.push(name);
        true
    }
}

/// Computes the merge order of `composition`: global setups and bases
/// first, the composition itself last.
///
/// Reports [`Message::DependsOnCycle`] or [`Message::SetupNotFound`] and
/// returns `None` on the first configuration error.
pub fn dependency_order<'a>(
    index: &SetupIndex<'a>,
    composition: &'a str,
    sink: &mut DiagnosticSink,
) -> Option<Vec<&'a str>> {
    let mut walk = OrderWalk {
        index,
        marks: HashMap::new(),
        stack: Vec::new(),
        order: Vec::new(),
    };
    let location = index
        .partials(composition)
        .first()
        .map(|s| s.location.clone())
        .unwrap_or_default();
    if !index.is_global(composition) {
        for global in index.globals() {
            if !walk.visit(global, composition, &location, sink) {
                return None;
            }
        }
    }
    if !walk.visit(composition, composition, &location, sink) {
        return None;
    }
    Some(walk.order)
}

/// Merges the setups of `composition` into its effective table.
///
/// Configuration errors (dependency cycles, unknown setups, duplicate roots,
/// generic external arguments) are reported to `sink` and yield `None`.
pub fn merge(
    index: &SetupIndex<'_>,
    composition: &str,
    caller_hints: &BTreeMap<String, String>,
    sink: &mut DiagnosticSink,
) -> Option<EffectiveTable> {
    tracing::debug!(composition, "merging setups");
    let Some(&name) = index.order.iter().find(|n| **n == composition) else {
        sink.report(
            SourceLocation::default(),
            Message::SetupNotFound {
                setup: composition.to_string(),
                dependent: composition.to_string(),
            },
        );
        return None;
    };
    let order = dependency_order(index, name, sink)?;
    let setups: Vec<&Setup> = order
        .iter()
        .flat_map(|n| index.partials(n).iter().copied())
        .collect();

    let mut hints = Hints::new(caller_hints.clone());
    for setup in &setups {
        hints.overlay(&setup.hints);
    }

    let mut merger = Merger::default();
    for setup in &setups {
        merger.append(setup);
    }

    let mut config_errors = false;
    config_errors |= merger.check_generic_arguments(sink);
    config_errors |= merger.check_duplicate_roots(sink);
    merger.check_implemented_contracts(sink);
    merger.check_factory_injections(sink);
    merger.check_generic_roots(&hints, sink);
    let members = collect_members(&setups, composition, sink);

    if config_errors {
        tracing::warn!(composition, "configuration errors, composition skipped");
        return None;
    }

    let table = merger.finish(composition, hints, members, sink);
    tracing::debug!(
        composition,
        bindings = table.bindings.len(),
        roots = table.roots.len(),
        "setups merged"
    );
    Some(table)
}

#[derive(Default)]
struct Merger {
    bindings: Vec<TableBinding>,
    roots: Vec<TableRoot>,
    next_unique: u32,
}

impl Merger {
    fn append(&mut self, setup: &Setup) {
        let markers: HashSet<String> = setup.markers.iter().cloned().collect();
        for binding in &setup.bindings {
            let table_binding = self.convert_binding(setup, binding, &markers);
            self.bindings.push(table_binding);
        }
        for root in &setup.roots {
            self.roots.push(TableRoot {
                name: root.name.clone(),
                contract: Contract::request(
                    root.ty.with_custom_markers(&markers),
                    root.tag.as_ref(),
                ),
                kind: root.kind,
                setup: setup.name.clone(),
                location: root.location.clone(),
            });
        }
    }

    fn convert_binding(
        &mut self,
        setup: &Setup,
        binding: &Binding,
        markers: &HashSet<String>,
    ) -> TableBinding {
        let recipe = mark_recipe(&binding.recipe, markers);
        let mut contracts = Vec::new();
        for spec in &binding.contracts {
            let ty = spec.ty.with_custom_markers(markers);
            if spec.tags.is_empty() {
                contracts.push(Contract::new(ty));
                continue;
            }
            for tag in &spec.tags {
                let tag = match tag {
                    TagSpec::Value(v) => Tag::Value(v.clone()),
                    TagSpec::Any => Tag::Any,
                    TagSpec::Unique => {
                        let n = self.next_unique;
                        self.next_unique += 1;
                        Tag::Unique(n)
                    }
                };
                contracts.push(Contract::tagged(ty.clone(), Some(tag)));
            }
        }
        if contracts.is_empty() {
            if let Recipe::Construct { implementation, .. } = &recipe {
                contracts.push(Contract::new(implementation.clone()));
            }
        }
        let implements_disposer = match &recipe {
            Recipe::Construct {
                implements: Some(list),
                ..
            } => list.iter().any(is_disposer),
            _ => false,
        };
        TableBinding {
            id: BindingId(self.bindings.len()),
            contracts,
            lifetime: binding
                .lifetime
                .or(setup.default_lifetime)
                .unwrap_or_default(),
            recipe,
            setup: setup.name.clone(),
            scope: binding.scope.clone(),
            disposable: binding.disposable || implements_disposer,
            location: binding.location.clone(),
        }
    }

    fn check_generic_arguments(&self, sink: &mut DiagnosticSink) -> bool {
        let mut failed = false;
        for binding in &self.bindings {
            let Recipe::Arg { name, .. } = &binding.recipe else {
                continue;
            };
            for contract in binding.contracts.iter().filter(|c| c.ty.contains_marker()) {
                sink.report(
                    binding.location.clone(),
                    Message::GenericArgument {
                        argument: name.clone(),
                        ty: contract.ty.to_string(),
                    },
                );
                failed = true;
            }
        }
        failed
    }

    fn check_duplicate_roots(&self, sink: &mut DiagnosticSink) -> bool {
        let mut names = HashSet::new();
        let mut anonymous = HashSet::new();
        let mut failed = false;
        for root in &self.roots {
            let fresh = if root.name.is_empty() {
                anonymous.insert(&root.contract)
            } else {
                names.insert(root.name.as_str())
            };
            if !fresh {
                sink.report(
                    root.location.clone(),
                    Message::DuplicateRoot {
                        root: root.describe(),
                    },
                );
                failed = true;
            }
        }
        failed
    }

    fn check_implemented_contracts(&self, sink: &mut DiagnosticSink) {
        for binding in &self.bindings {
            let Recipe::Construct {
                implementation,
                implements: Some(implements),
                ..
            } = &binding.recipe
            else {
                continue;
            };
            for contract in &binding.contracts {
                let covered = std::iter::once(implementation)
                    .chain(implements.iter())
                    .any(|t| {
                        t == &contract.ty
                            || unify(t, &contract.ty).is_some()
                            || unify(&contract.ty, t).is_some()
                    });
                if !covered {
                    sink.report(
                        binding.location.clone(),
                        Message::NotImplementedContract {
                            implementation: implementation.to_string(),
                            contract: contract.ty.to_string(),
                        },
                    );
                }
            }
        }
    }

    fn check_factory_injections(&self, sink: &mut DiagnosticSink) {
        for binding in &self.bindings {
            let Recipe::Factory {
                expression, steps, ..
            } = &binding.recipe
            else {
                continue;
            };
            for step in steps {
                if let FactoryStep::Inject {
                    variable, location, ..
                } = step
                {
                    let overridden = steps.iter().any(|s| {
                        matches!(s, FactoryStep::Override { variable: v, .. } if v == variable)
                    });
                    if !overridden && !mentions(expression, variable) {
                        sink.report(
                            location.clone(),
                            Message::InjectionSiteNotUsed {
                                variable: variable.clone(),
                                binding: binding.describe(),
                            },
                        );
                    }
                }
            }
        }
    }

    fn check_generic_roots(&self, hints: &Hints, sink: &mut DiagnosticSink) {
        if !hints.resolve_methods() {
            return;
        }
        for root in self.roots.iter().filter(|r| r.contract.ty.contains_marker()) {
            sink.report(
                root.location.clone(),
                Message::TypeArgInResolveMethod {
                    root: root.describe(),
                    ty: root.contract.ty.to_string(),
                },
            );
        }
    }

    fn finish(
        self,
        composition: &str,
        hints: Hints,
        members: Vec<TableMember>,
        sink: &mut DiagnosticSink,
    ) -> EffectiveTable {
        let mut active: HashMap<Contract, BindingId> = HashMap::new();
        let mut shadowings = Vec::new();
        for binding in &self.bindings {
            for contract in &binding.contracts {
                if let Some(previous) = active.insert(contract.clone(), binding.id) {
                    if previous != binding.id {
                        shadowings.push(Shadowing {
                            contract: contract.clone(),
                            shadowed: previous,
                            by: binding.id,
                        });
                    }
                }
            }
        }

        let mut overridden: BTreeMap<BindingId, Vec<&Contract>> = BTreeMap::new();
        for shadowing in &shadowings {
            let winner = active[&shadowing.contract];
            let contracts = overridden.entry(winner).or_default();
            if !contracts.contains(&&shadowing.contract) {
                contracts.push(&shadowing.contract);
            }
        }
        for (winner, contracts) in &overridden {
            let binding = &self.bindings[winner.0];
            tracing::debug!(binding = %winner, "binding overrides earlier bindings");
            sink.report(
                binding.location.clone(),
                Message::OverriddenBinding {
                    contract: contracts
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", "),
                    binding: binding.describe(),
                },
            );
        }
        let overriding = overridden.keys().copied().collect();

        let mut active_order = Vec::new();
        let mut any_tagged = HashMap::new();
        for binding in &self.bindings {
            for contract in &binding.contracts {
                if active.get(contract) == Some(&binding.id)
                    && !active_order.iter().any(|(c, _)| c == contract)
                {
                    active_order.push((contract.clone(), binding.id));
                    if contract.tag == Some(Tag::Any) {
                        let _ = any_tagged.insert(contract.ty.clone(), binding.id);
                    }
                }
            }
        }

        EffectiveTable {
            composition: composition.to_string(),
            bindings: self.bindings,
            roots: self.roots,
            members,
            hints,
            active,
            active_order,
            any_tagged,
            shadowings,
            overriding,
        }
    }
}

fn collect_members(
    setups: &[&Setup],
    composition: &str,
    sink: &mut DiagnosticSink,
) -> Vec<TableMember> {
    let mut members = Vec::new();
    for setup in setups {
        for member in &setup.members {
            if setup.name != composition && !member.is_static {
                sink.report(
                    member.location.clone(),
                    Message::InstanceMemberInDependsOnSetup {
                        member: member.name.clone(),
                        setup: setup.name.clone(),
                        dependent: composition.to_string(),
                    },
                );
            }
            members.push(TableMember {
                name: member.name.clone(),
                is_static: member.is_static,
                setup: setup.name.clone(),
                location: member.location.clone(),
            });
        }
    }
    members
}

fn mark_recipe(recipe: &Recipe, markers: &HashSet<String>) -> Recipe {
    if markers.is_empty() {
        return recipe.clone();
    }
    let mark_injection = |i: &Injection| Injection {
        ty: i.ty.with_custom_markers(markers),
        ..i.clone()
    };
    match recipe {
        Recipe::Construct {
            implementation,
            implements,
            constructors,
        } => Recipe::Construct {
            implementation: implementation.with_custom_markers(markers),
            implements: implements
                .as_ref()
                .map(|list| list.iter().map(|t| t.with_custom_markers(markers)).collect()),
            constructors: constructors
                .iter()
                .map(|c| Constructor {
                    parameters: c.parameters.iter().map(mark_injection).collect(),
                    ordinal: c.ordinal,
                })
                .collect(),
        },
        Recipe::Factory {
            expression,
            steps,
            is_async,
        } => Recipe::Factory {
            expression: expression.clone(),
            steps: steps
                .iter()
                .map(|step| match step {
                    FactoryStep::Inject {
                        variable,
                        ty,
                        tag,
                        location,
                    } => FactoryStep::Inject {
                        variable: variable.clone(),
                        ty: ty.as_ref().map(|t| t.with_custom_markers(markers)),
                        tag: tag.clone(),
                        location: location.clone(),
                    },
                    FactoryStep::Override {
                        variable,
                        ty,
                        location,
                    } => FactoryStep::Override {
                        variable: variable.clone(),
                        ty: ty.as_ref().map(|t| t.with_custom_markers(markers)),
                        location: location.clone(),
                    },
                })
                .collect(),
            is_async: *is_async,
        },
        Recipe::Arg { .. } => recipe.clone(),
    }
}

fn is_disposer(ty: &TypeRef) -> bool {
    ty.name().is_some_and(|name| DISPOSER_TYPES.contains(&name))
}

/// Returns `true` if `expression` mentions `variable` as a whole identifier.
fn mentions(expression: &str, variable: &str) -> bool {
    let is_ident = |c: char| c.is_alphanumeric() || c == '_';
    expression.match_indices(variable).any(|(start, _)| {
        let before = expression[..start].chars().next_back();
        let after = expression[start + variable.len()..].chars().next();
        !before.is_some_and(is_ident) && !after.is_some_and(is_ident)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticId;
    use crate::model::{ArgKind, ContractSpec, Member, Root};
    use purewire_common::types::Culture;

    fn ty(input: &str) -> TypeRef {
        TypeRef::parse(input).expect("valid type")
    }

    fn factory(contract: &str, expression: &str, line: u32) -> Binding {
        Binding {
            contracts: vec![ContractSpec::new(ty(contract))],
            lifetime: None,
            recipe: Recipe::Factory {
                expression: expression.into(),
                steps: Vec::new(),
                is_async: false,
            },
            scope: None,
            disposable: false,
            location: SourceLocation::new("setup.cs", line, 1),
        }
    }

    fn root(name: &str, contract: &str) -> Root {
        Root {
            name: name.into(),
            ty: ty(contract),
            tag: None,
            kind: RootKind::Property,
            location: SourceLocation::default(),
        }
    }

    fn ids(sink: DiagnosticSink) -> Vec<DiagnosticId> {
        sink.finish(&Hints::default(), Culture::En)
            .into_iter()
            .map(|d| d.id)
            .collect()
    }

    fn merge_one(setups: &[Setup], name: &str) -> (Option<EffectiveTable>, DiagnosticSink) {
        let index = SetupIndex::new(setups);
        let mut sink = DiagnosticSink::new();
        let table = merge(&index, name, &BTreeMap::new(), &mut sink);
        (table, sink)
    }

    #[test]
    fn bases_come_first_and_later_bindings_win() {
        let mut base = Setup::new("Base");
        base.bindings.push(factory("int", "1", 1));
        let mut comp = Setup::new("Composition");
        comp.depends_on.push("Base".into());
        comp.bindings.push(factory("int", "2", 2));

        let (table, sink) = merge_one(&[base, comp], "Composition");
        let table = table.expect("merged");
        let active = table.active(&Contract::new(ty("int"))).expect("active");
        assert_eq!(active, BindingId(1));
        assert!(table.is_shadowed(BindingId(0)));
        assert!(table.is_overriding(BindingId(1)));
        assert_eq!(ids(sink), vec![DiagnosticId::WarningOverriddenBinding]);
    }

    #[test]
    fn one_override_warning_for_a_chain() {
        let mut setup = Setup::new("Composition");
        for line in 1..=3 {
            setup.bindings.push(factory("int", &line.to_string(), line));
        }
        let (table, sink) = merge_one(&[setup], "Composition");
        let table = table.expect("merged");
        assert_eq!(table.shadowings().len(), 2);
        let diagnostics = sink.finish(&Hints::default(), Culture::En);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].location.line, 3);
    }

    #[test]
    fn default_lifetime_does_not_leak_into_dependents() {
        let mut base = Setup::new("Base");
        base.default_lifetime = Some(Lifetime::Singleton);
        base.bindings.push(factory("IA", "new A()", 1));
        let mut comp = Setup::new("Composition");
        comp.depends_on.push("Base".into());
        comp.bindings.push(factory("IB", "new B()", 2));

        let (table, _) = merge_one(&[base, comp], "Composition");
        let table = table.expect("merged");
        assert_eq!(table.binding(BindingId(0)).lifetime, Lifetime::Singleton);
        assert_eq!(table.binding(BindingId(1)).lifetime, Lifetime::Transient);
    }

    #[test]
    fn depends_on_cycle_is_reported_once() {
        let mut a = Setup::new("A");
        a.depends_on.push("B".into());
        let mut b = Setup::new("B");
        b.depends_on.push("A".into());

        let (table, sink) = merge_one(&[a, b], "A");
        assert!(table.is_none());
        let diagnostics = sink.finish(&Hints::default(), Culture::En);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].id, DiagnosticId::ErrorDependsOnCycle);
        assert!(diagnostics[0].message.contains("A -> B -> A"));
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let mut a = Setup::new("A");
        a.depends_on.push("A".into());
        let (table, sink) = merge_one(&[a], "A");
        assert!(table.is_none());
        assert_eq!(ids(sink), vec![DiagnosticId::ErrorDependsOnCycle]);
    }

    #[test]
    fn unknown_dependency_aborts() {
        let mut a = Setup::new("A");
        a.depends_on.push("Missing".into());
        let (table, sink) = merge_one(&[a], "A");
        assert!(table.is_none());
        assert_eq!(ids(sink), vec![DiagnosticId::ErrorSetupNotFound]);
    }

    #[test]
    fn global_setups_are_implicit_bases() {
        let mut global = Setup::new("Shared");
        global.kind = SetupKind::Global;
        global.bindings.push(factory("ILog", "new Log()", 1));
        let comp = Setup::new("Composition");
        let setups = [global, comp];
        let index = SetupIndex::new(&setups);
        assert_eq!(index.compositions(), vec!["Composition"]);

        let (table, _) = merge_one(&setups, "Composition");
        let table = table.expect("merged");
        assert!(table.active(&Contract::new(ty("ILog"))).is_some());
    }

    #[test]
    fn partial_setups_merge_in_order() {
        let mut first = Setup::new("Composition");
        first.bindings.push(factory("int", "1", 1));
        let mut second = Setup::new("Composition");
        second.bindings.push(factory("string", "\"a\"", 2));
        let (table, _) = merge_one(&[first, second], "Composition");
        assert_eq!(table.expect("merged").bindings().len(), 2);
    }

    #[test]
    fn duplicate_root_names_abort() {
        let mut setup = Setup::new("Composition");
        setup.roots.push(root("Service", "IService"));
        setup.roots.push(root("Service", "IOther"));
        let (table, sink) = merge_one(&[setup], "Composition");
        assert!(table.is_none());
        assert_eq!(ids(sink), vec![DiagnosticId::ErrorDuplicateRoot]);
    }

    #[test]
    fn anonymous_roots_clash_on_identical_contracts() {
        let mut setup = Setup::new("Composition");
        setup.roots.push(root("", "IService"));
        setup.roots.push(root("", "IService"));
        setup.roots.push(root("", "IOther"));
        let (table, sink) = merge_one(&[setup], "Composition");
        assert!(table.is_none());
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn generic_argument_is_a_configuration_error() {
        let mut setup = Setup::new("Composition");
        setup.bindings.push(Binding {
            contracts: vec![ContractSpec::new(ty("IList<TT>"))],
            lifetime: None,
            recipe: Recipe::Arg {
                name: "items".into(),
                kind: ArgKind::Root,
            },
            scope: None,
            disposable: false,
            location: SourceLocation::default(),
        });
        let (table, sink) = merge_one(&[setup], "Composition");
        assert!(table.is_none());
        assert_eq!(ids(sink), vec![DiagnosticId::ErrorGenericArgument]);
    }

    #[test]
    fn unique_tags_never_collide() {
        let mut setup = Setup::new("Composition");
        for line in 1..=2 {
            let mut binding = factory("IDep", "new Dep()", line);
            binding.contracts[0].tags.push(TagSpec::Unique);
            setup.bindings.push(binding);
        }
        let (table, sink) = merge_one(&[setup], "Composition");
        let table = table.expect("merged");
        assert!(table.shadowings().is_empty());
        assert_eq!(table.active_contracts().count(), 2);
        assert!(sink.is_empty());
    }

    #[test]
    fn custom_markers_apply_to_setup_types() {
        let mut setup = Setup::new("Composition");
        setup.markers.push("TKey".into());
        setup.bindings.push(factory("IRepo<TKey>", "new Repo<TKey>()", 1));
        let (table, _) = merge_one(&[setup], "Composition");
        assert!(table.expect("merged").binding(BindingId(0)).is_generic());
    }

    #[test]
    fn not_implemented_contract_is_reported() {
        let mut setup = Setup::new("Composition");
        setup.bindings.push(Binding {
            contracts: vec![ContractSpec::new(ty("IService")), ContractSpec::new(ty("IOther"))],
            lifetime: None,
            recipe: Recipe::Construct {
                implementation: ty("Service"),
                implements: Some(vec![ty("IService"), ty("IDisposable")]),
                constructors: Vec::new(),
            },
            scope: None,
            disposable: false,
            location: SourceLocation::default(),
        });
        let (table, sink) = merge_one(&[setup], "Composition");
        let table = table.expect("not a configuration error");
        assert!(table.binding(BindingId(0)).disposable);
        assert_eq!(ids(sink), vec![DiagnosticId::ErrorNotImplementedContract]);
    }

    #[test]
    fn unread_factory_injection_is_reported() {
        let mut setup = Setup::new("Composition");
        let mut binding = factory("IService", "new Service(dep)", 1);
        if let Recipe::Factory { steps, .. } = &mut binding.recipe {
            steps.push(FactoryStep::Inject {
                variable: "dep".into(),
                ty: Some(ty("IDep")),
                tag: None,
                location: SourceLocation::default(),
            });
            steps.push(FactoryStep::Inject {
                variable: "depot".into(),
                ty: Some(ty("IDepot")),
                tag: None,
                location: SourceLocation::default(),
            });
        }
        setup.bindings.push(binding);
        let (_, sink) = merge_one(&[setup], "Composition");
        let diagnostics = sink.finish(&Hints::default(), Culture::En);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("depot"));
    }

    #[test]
    fn instance_members_of_bases_warn() {
        let mut base = Setup::new("Base");
        base.members.push(Member {
            name: "counter".into(),
            is_static: false,
            location: SourceLocation::default(),
        });
        base.members.push(Member {
            name: "Format".into(),
            is_static: true,
            location: SourceLocation::default(),
        });
        let mut comp = Setup::new("Composition");
        comp.depends_on.push("Base".into());
        let (table, sink) = merge_one(&[base, comp], "Composition");
        assert_eq!(table.expect("merged").members().len(), 2);
        assert_eq!(
            ids(sink),
            vec![DiagnosticId::WarningInstanceMemberInDependsOnSetup]
        );
    }

    #[test]
    fn generic_roots_warn_when_resolve_methods_are_on() {
        let mut setup = Setup::new("Composition");
        setup.roots.push(root("Box", "IBox<TT>"));
        let (_, sink) = merge_one(&[setup.clone()], "Composition");
        assert_eq!(ids(sink), vec![DiagnosticId::WarningTypeArgInResolveMethod]);

        let _ = setup.hints.insert("Resolve".into(), "Off".into());
        let (_, sink) = merge_one(&[setup], "Composition");
        assert!(sink.is_empty());
    }

    #[test]
    fn mentions_matches_whole_identifiers() {
        assert!(mentions("new Service(dep)", "dep"));
        assert!(!mentions("new Service(depot)", "dep"));
        assert!(!mentions("new Service(_dep)", "dep"));
    }
}
