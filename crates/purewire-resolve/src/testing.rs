//! Setup fixtures shared by unit tests.

use std::collections::BTreeMap;

use purewire_common::types::SourceLocation;

use crate::diagnostics::DiagnosticSink;
use crate::merger::{EffectiveTable, SetupIndex, merge};
use crate::model::{
    Binding, Constructor, ContractSpec, FactoryStep, Injection, Lifetime, Recipe, Root, RootKind,
    Setup, TagSpec,
};
use crate::types::TypeRef;

pub fn ty(input: &str) -> TypeRef {
    TypeRef::parse(input).expect("valid type")
}

pub fn at(line: u32) -> SourceLocation {
    SourceLocation::new("Composition.cs", line, 1)
}

/// `contract` implemented by `implementation`, one constructor per parameter list.
pub fn construct(contract: &str, implementation: &str, constructors: &[&[&str]]) -> Binding {
    Binding {
        contracts: vec![ContractSpec::new(ty(contract))],
        lifetime: None,
        recipe: Recipe::Construct {
            implementation: ty(implementation),
            implements: None,
            constructors: constructors
                .iter()
                .map(|parameters| Constructor {
                    parameters: parameters
                        .iter()
                        .enumerate()
                        .map(|(i, p)| Injection {
                            name: format!("p{i}"),
                            ty: ty(p),
                            tag: None,
                            location: SourceLocation::default(),
                        })
                        .collect(),
                    ordinal: None,
                })
                .collect(),
        },
        scope: None,
        disposable: false,
        location: SourceLocation::default(),
    }
}

pub fn factory(contract: &str, expression: &str, steps: Vec<FactoryStep>) -> Binding {
    Binding {
        contracts: vec![ContractSpec::new(ty(contract))],
        lifetime: None,
        recipe: Recipe::Factory {
            expression: expression.into(),
            steps,
            is_async: false,
        },
        scope: None,
        disposable: false,
        location: SourceLocation::default(),
    }
}

pub fn inject(variable: &str, contract: &str) -> FactoryStep {
    FactoryStep::Inject {
        variable: variable.into(),
        ty: Some(ty(contract)),
        tag: None,
        location: SourceLocation::default(),
    }
}

pub fn lifetime(mut binding: Binding, lifetime: Lifetime) -> Binding {
    binding.lifetime = Some(lifetime);
    binding
}

pub fn tags(mut binding: Binding, tags: &[&str]) -> Binding {
    binding.contracts[0].tags = tags.iter().map(|t| TagSpec::from(*t)).collect();
    binding
}

pub fn located(mut binding: Binding, line: u32) -> Binding {
    binding.location = at(line);
    binding
}

pub fn root(name: &str, contract: &str) -> Root {
    Root {
        name: name.into(),
        ty: ty(contract),
        tag: None,
        kind: RootKind::Property,
        location: SourceLocation::default(),
    }
}

pub fn setup(bindings: Vec<Binding>, roots: Vec<Root>) -> Setup {
    let mut setup = Setup::new("Composition");
    setup.bindings = bindings;
    setup.roots = roots;
    setup
}

pub fn table(setups: &[Setup]) -> EffectiveTable {
    let index = SetupIndex::new(setups);
    let mut sink = DiagnosticSink::new();
    merge(&index, "Composition", &BTreeMap::new(), &mut sink).expect("merged")
}
