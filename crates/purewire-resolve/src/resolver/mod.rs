//! Contract resolution.
//!
//! Given a request, finds what satisfies it: an active binding for the
//! exact contract, a binding tagged `Any`, a generic binding through
//! unification, or a virtual node synthesized from a well-known shape.
//! The resolver only answers lookups; the graph builder decides what to
//! do with the answer.

pub mod shapes;

use purewire_common::config::ShapeStrategy;

use crate::graph::EdgeKind;
use crate::merger::{BindingId, EffectiveTable};
use crate::model::{Contract, Tag};
use crate::types::{Substitution, TypeRef, unify};

pub use self::shapes::ShapeRegistry;

/// Forces a request to a specific binding, used for collection elements.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pin {
    /// The binding.
    pub binding: BindingId,
    /// Substitution of a generic binding.
    pub substitution: Substitution,
    /// Type the binding provides under the substitution.
    pub ty: TypeRef,
}

/// A dependency request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Request {
    /// Requested contract.
    pub contract: Contract,
    /// Binding the request must resolve to.
    pub pin: Option<Pin>,
}

impl Request {
    /// An unpinned request.
    #[must_use]
    pub const fn new(contract: Contract) -> Self {
        Self {
            contract,
            pin: None,
        }
    }
}

/// A dependency of a virtual node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualDependency {
    /// What to resolve.
    pub request: Request,
    /// How the virtual node holds it.
    pub kind: EdgeKind,
}

/// The outcome of a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A binding of the effective table.
    Binding {
        /// The binding.
        binding: BindingId,
        /// Marker substitution, empty for non-generic matches.
        substitution: Substitution,
    },
    /// A synthesized node.
    Virtual {
        /// Synthesis strategy.
        strategy: ShapeStrategy,
        /// Dependencies in position order.
        dependencies: Vec<VirtualDependency>,
        /// Argument types a `Func` provider receives from its caller.
        provider_args: Vec<TypeRef>,
    },
    /// Nothing satisfies the request.
    Unresolved,
}

/// Answers lookups against one effective table.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'t> {
    table: &'t EffectiveTable,
    shapes: &'t ShapeRegistry,
}

impl<'t> Resolver<'t> {
    /// Creates a resolver.
    #[must_use]
    pub const fn new(table: &'t EffectiveTable, shapes: &'t ShapeRegistry) -> Self {
        Self { table, shapes }
    }

    /// The table being resolved against.
    #[must_use]
    pub const fn table(&self) -> &'t EffectiveTable {
        self.table
    }

    /// Resolves one request.
    #[must_use]
    pub fn resolve(&self, request: &Request) -> Resolution {
        let contract = &request.contract;
        if let Some(pin) = &request.pin {
            if pin.ty == contract.ty {
                return Resolution::Binding {
                    binding: pin.binding,
                    substitution: pin.substitution.clone(),
                };
            }
            return self.synthesize(request);
        }

        if let Some(binding) = self.table.active(contract) {
            return Resolution::Binding {
                binding,
                substitution: Substitution::default(),
            };
        }
        if let Some(binding) = self.table.any_tagged(&contract.ty) {
            return Resolution::Binding {
                binding,
                substitution: Substitution::default(),
            };
        }
        if let Some((binding, substitution)) = self.unify_generic(contract) {
            tracing::trace!(%contract, %binding, %substitution, "resolved through generic binding");
            return Resolution::Binding {
                binding,
                substitution,
            };
        }
        self.synthesize(request)
    }

    /// The latest declared generic binding whose contract unifies with the request.
    fn unify_generic(&self, contract: &Contract) -> Option<(BindingId, Substitution)> {
        self.table
            .active_contracts()
            .rev()
            .filter(|(c, _)| c.ty.contains_marker() && tag_matches(c.tag.as_ref(), contract.tag.as_ref()))
            .find_map(|(c, binding)| unify(&c.ty, &contract.ty).map(|s| (binding, s)))
    }

    fn synthesize(&self, request: &Request) -> Resolution {
        let contract = &request.contract;
        let Some(strategy) = self.shapes.lookup(&contract.ty) else {
            return Resolution::Unresolved;
        };
        let args = contract.ty.args();
        let carry = |ty: &TypeRef, kind: EdgeKind| VirtualDependency {
            request: Request {
                contract: Contract::tagged(ty.clone(), contract.tag.clone()),
                pin: request.pin.clone(),
            },
            kind,
        };
        match strategy {
            ShapeStrategy::EagerAggregate => {
                if request.pin.is_some() {
                    return Resolution::Unresolved;
                }
                let Some(element) = args.first() else {
                    return Resolution::Unresolved;
                };
                Resolution::Virtual {
                    strategy,
                    dependencies: self.aggregate(element, contract.tag.as_ref()),
                    provider_args: Vec::new(),
                }
            }
            ShapeStrategy::Func => {
                let Some((result, provider_args)) = args.split_last() else {
                    return Resolution::Unresolved;
                };
                Resolution::Virtual {
                    strategy,
                    dependencies: vec![carry(result, EdgeKind::Deferred)],
                    provider_args: provider_args.to_vec(),
                }
            }
            ShapeStrategy::Lazy | ShapeStrategy::ThreadLocal | ShapeStrategy::Completed => {
                let Some(inner) = args.first() else {
                    return Resolution::Unresolved;
                };
                let kind = if strategy == ShapeStrategy::Completed {
                    EdgeKind::Eager
                } else {
                    EdgeKind::Deferred
                };
                Resolution::Virtual {
                    strategy,
                    dependencies: vec![carry(inner, kind)],
                    provider_args: Vec::new(),
                }
            }
            ShapeStrategy::Tuple => {
                if request.pin.is_some() {
                    return Resolution::Unresolved;
                }
                Resolution::Virtual {
                    strategy,
                    dependencies: args
                        .iter()
                        .map(|ty| VirtualDependency {
                            request: Request::new(Contract::new(ty.clone())),
                            kind: EdgeKind::Eager,
                        })
                        .collect(),
                    provider_args: Vec::new(),
                }
            }
        }
    }

    /// One pinned element request per binding of `element`, in declaration order.
    ///
    /// For wrapped elements such as `Func<T>` or `Task<T>` the bindings of
    /// `T` are collected and each element request goes through the wrapper.
    fn aggregate(&self, element: &TypeRef, tag: Option<&Tag>) -> Vec<VirtualDependency> {
        let provided = match self.shapes.lookup(element) {
            Some(
                ShapeStrategy::Func
                | ShapeStrategy::Lazy
                | ShapeStrategy::ThreadLocal
                | ShapeStrategy::Completed,
            ) => element.args().last().unwrap_or(element),
            _ => element,
        };
        let mut seen = Vec::new();
        let mut dependencies = Vec::new();
        for (contract, binding) in self.table.active_contracts() {
            if seen.contains(&binding) {
                continue;
            }
            if let Some(requested) = tag {
                if !tag_matches(contract.tag.as_ref(), Some(requested)) {
                    continue;
                }
            }
            let substitution = if contract.ty == *provided {
                Substitution::default()
            } else if contract.ty.contains_marker() {
                match unify(&contract.ty, provided) {
                    Some(s) => s,
                    None => continue,
                }
            } else {
                continue;
            };
            seen.push(binding);
            dependencies.push(VirtualDependency {
                request: Request {
                    contract: Contract::tagged(element.clone(), contract.tag.clone()),
                    pin: Some(Pin {
                        binding,
                        substitution,
                        ty: provided.clone(),
                    }),
                },
                kind: EdgeKind::Eager,
            });
        }
        dependencies
    }
}

/// Whether a binding tag satisfies a requested tag.
fn tag_matches(binding: Option<&Tag>, requested: Option<&Tag>) -> bool {
    binding == requested || binding == Some(&Tag::Any)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use purewire_common::types::SourceLocation;

    use super::*;
    use crate::diagnostics::DiagnosticSink;
    use crate::merger::{SetupIndex, merge};
    use crate::model::{Binding, ContractSpec, Recipe, Setup, TagSpec};

    fn ty(input: &str) -> TypeRef {
        TypeRef::parse(input).expect("valid type")
    }

    fn bind(contract: &str, tags: &[&str]) -> Binding {
        Binding {
            contracts: vec![ContractSpec {
                ty: ty(contract),
                tags: tags.iter().map(|t| TagSpec::from(*t)).collect(),
            }],
            lifetime: None,
            recipe: Recipe::Factory {
                expression: "new()".into(),
                steps: Vec::new(),
                is_async: false,
            },
            scope: None,
            disposable: false,
            location: SourceLocation::default(),
        }
    }

    fn table(bindings: Vec<Binding>) -> EffectiveTable {
        let mut setup = Setup::new("Composition");
        setup.bindings = bindings;
        let setups = [setup];
        let index = SetupIndex::new(&setups);
        let mut sink = DiagnosticSink::new();
        merge(&index, "Composition", &BTreeMap::new(), &mut sink).expect("merged")
    }

    fn resolve(table: &EffectiveTable, contract: Contract) -> Resolution {
        let shapes = ShapeRegistry::builtin();
        Resolver::new(table, &shapes).resolve(&Request::new(contract))
    }

    #[test]
    fn exact_contract_wins() {
        let table = table(vec![bind("IDep", &[]), bind("IDep", &["a"])]);
        assert_eq!(
            resolve(&table, Contract::new(ty("IDep"))),
            Resolution::Binding {
                binding: BindingId(0),
                substitution: Substitution::default()
            }
        );
        let tagged = Contract::tagged(ty("IDep"), Some(Tag::Value("a".into())));
        assert!(matches!(
            resolve(&table, tagged),
            Resolution::Binding { binding: BindingId(1), .. }
        ));
    }

    #[test]
    fn any_tag_matches_every_request() {
        let table = table(vec![bind("IDep", &["Any"])]);
        let tagged = Contract::tagged(ty("IDep"), Some(Tag::Value("x".into())));
        assert!(matches!(resolve(&table, tagged), Resolution::Binding { .. }));
        assert!(matches!(
            resolve(&table, Contract::new(ty("IDep"))),
            Resolution::Binding { .. }
        ));
    }

    #[test]
    fn latest_generic_binding_wins() {
        let table = table(vec![bind("IBox<TT>", &[]), bind("IBox<TT1>", &[])]);
        let Resolution::Binding {
            binding,
            substitution,
        } = resolve(&table, Contract::new(ty("IBox<int>")))
        else {
            panic!("expected a binding");
        };
        assert_eq!(binding, BindingId(1));
        assert_eq!(substitution.get("TT1"), Some(&ty("int")));
    }

    #[test]
    fn explicit_generic_binding_beats_virtual_shape() {
        let table = table(vec![bind("IEnumerable<TT>", &[])]);
        assert!(matches!(
            resolve(&table, Contract::new(ty("IEnumerable<IDep>"))),
            Resolution::Binding { .. }
        ));
    }

    #[test]
    fn element_wrappers_inside_collections_stay_virtual() {
        let table = table(vec![
            bind("Lazy<TT>", &[]),
            bind("IDep", &["1"]),
            bind("IDep", &["2"]),
        ]);
        assert!(matches!(
            resolve(&table, Contract::new(ty("Lazy<IDep>"))),
            Resolution::Binding { binding: BindingId(0), .. }
        ));

        let Resolution::Virtual { dependencies, .. } =
            resolve(&table, Contract::new(ty("IReadOnlyList<Lazy<IDep>>")))
        else {
            panic!("expected a collection");
        };
        assert_eq!(dependencies.len(), 2);
        let shapes = ShapeRegistry::builtin();
        let resolver = Resolver::new(&table, &shapes);
        for dependency in &dependencies {
            assert!(matches!(
                resolver.resolve(&dependency.request),
                Resolution::Virtual {
                    strategy: ShapeStrategy::Lazy,
                    ..
                }
            ));
        }
    }

    #[test]
    fn collections_of_tasks_wrap_each_binding() {
        let table = table(vec![bind("IDep", &["1"]), bind("IDep", &["2"])]);
        let Resolution::Virtual { dependencies, .. } =
            resolve(&table, Contract::new(ty("IEnumerable<Task<IDep>>")))
        else {
            panic!("expected a collection");
        };
        assert_eq!(dependencies.len(), 2);
        let shapes = ShapeRegistry::builtin();
        let resolver = Resolver::new(&table, &shapes);
        for (expected, dependency) in dependencies.iter().enumerate() {
            let Resolution::Virtual {
                strategy: ShapeStrategy::Completed,
                dependencies: inner,
                ..
            } = resolver.resolve(&dependency.request)
            else {
                panic!("expected a completed task");
            };
            assert!(matches!(
                resolver.resolve(&inner[0].request),
                Resolution::Binding { binding: BindingId(b), .. } if b == expected
            ));
        }
    }

    #[test]
    fn collections_pin_each_binding_in_order() {
        let table = table(vec![
            bind("IDep", &["1"]),
            bind("IDep", &["2"]),
            bind("IDep", &["3"]),
            bind("IOther", &[]),
        ]);
        let Resolution::Virtual { dependencies, .. } =
            resolve(&table, Contract::new(ty("IEnumerable<IDep>")))
        else {
            panic!("expected a collection");
        };
        let pinned: Vec<BindingId> = dependencies
            .iter()
            .filter_map(|d| d.request.pin.as_ref().map(|p| p.binding))
            .collect();
        assert_eq!(pinned, vec![BindingId(0), BindingId(1), BindingId(2)]);
        assert!(dependencies.iter().all(|d| d.kind == EdgeKind::Eager));
    }

    #[test]
    fn collection_of_providers_defers_each_element() {
        let table = table(vec![bind("IDep", &["1"]), bind("IDep", &["2"])]);
        let shapes = ShapeRegistry::builtin();
        let resolver = Resolver::new(&table, &shapes);
        let Resolution::Virtual { dependencies, .. } =
            resolver.resolve(&Request::new(Contract::new(ty("IEnumerable<Func<IDep>>"))))
        else {
            panic!("expected a collection");
        };
        assert_eq!(dependencies.len(), 2);
        let Resolution::Virtual {
            strategy,
            dependencies: inner,
            ..
        } = resolver.resolve(&dependencies[0].request)
        else {
            panic!("expected a provider");
        };
        assert_eq!(strategy, ShapeStrategy::Func);
        assert_eq!(inner[0].kind, EdgeKind::Deferred);
        assert!(matches!(
            resolver.resolve(&inner[0].request),
            Resolution::Binding { binding: BindingId(0), .. }
        ));
    }

    #[test]
    fn func_splits_arguments_from_result() {
        let table = table(Vec::new());
        let Resolution::Virtual {
            strategy,
            dependencies,
            provider_args,
        } = resolve(&table, Contract::new(ty("Func<int, string, IService>")))
        else {
            panic!("expected a provider");
        };
        assert_eq!(strategy, ShapeStrategy::Func);
        assert_eq!(provider_args, vec![ty("int"), ty("string")]);
        assert_eq!(dependencies[0].request.contract.ty, ty("IService"));
    }

    #[test]
    fn unknown_contract_is_unresolved() {
        let table = table(Vec::new());
        assert_eq!(
            resolve(&table, Contract::new(ty("IMissing"))),
            Resolution::Unresolved
        );
    }
}
