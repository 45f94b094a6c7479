//! Fluent API for declaring setups.
//!
//! Builders collect declarations in memory and produce an immutable
//! [`Setup`] in [`SetupBuilder::build`]. Type expressions are parsed there,
//! so a malformed type surfaces as one error instead of a panic halfway
//! through a chain.

use std::collections::BTreeMap;

use purewire_common::error::Result;
use purewire_common::types::SourceLocation;
use purewire_resolve::model::{
    ArgKind, Binding, Constructor, ContractSpec, FactoryStep, Injection, Lifetime, Recipe, Root,
    RootKind, Setup, SetupKind, TagSpec,
};
use purewire_resolve::types::TypeRef;

/// A constructor parameter before its type is parsed.
#[derive(Debug, Clone)]
pub struct Param {
    name: String,
    ty: String,
    tag: Option<TagSpec>,
}

impl Param {
    /// Creates an untagged parameter.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            tag: None,
        }
    }

    /// Requests the dependency with a tag.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<TagSpec>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

impl From<(&str, &str)> for Param {
    fn from((name, ty): (&str, &str)) -> Self {
        Self::new(name, ty)
    }
}

#[derive(Debug, Clone)]
enum Step {
    Inject {
        variable: String,
        ty: Option<String>,
        tag: Option<TagSpec>,
    },
    Override {
        variable: String,
        ty: Option<String>,
    },
}

#[derive(Debug, Clone)]
enum Target {
    Construct {
        implementation: String,
        implements: Option<Vec<String>>,
        constructors: Vec<(Vec<Param>, Option<i32>)>,
    },
    Factory {
        expression: String,
        steps: Vec<Step>,
        is_async: bool,
    },
    Arg {
        name: String,
        kind: ArgKind,
    },
}

/// Builder for one binding.
///
/// Start with [`BindingBuilder::bind`] (or [`BindingBuilder::new`] for a
/// binding whose contract is its implementation type), then choose a recipe
/// with [`to`](Self::to), [`factory`](Self::factory) or [`arg`](Self::arg).
#[derive(Debug, Clone)]
pub struct BindingBuilder {
    contracts: Vec<(String, Vec<TagSpec>)>,
    lifetime: Option<Lifetime>,
    scope: Option<String>,
    disposable: bool,
    line: Option<u32>,
    target: Option<Target>,
}

impl BindingBuilder {
    /// Creates a binding with no explicit contract.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            contracts: Vec::new(),
            lifetime: None,
            scope: None,
            disposable: false,
            line: None,
            target: None,
        }
    }

    /// Creates a binding for an untagged contract.
    #[must_use]
    pub fn bind(contract: impl Into<String>) -> Self {
        Self::new().contract(contract)
    }

    /// Adds an untagged contract.
    #[must_use]
    pub fn contract(mut self, contract: impl Into<String>) -> Self {
        self.contracts.push((contract.into(), Vec::new()));
        self
    }

    /// Adds a contract under one or more tags.
    #[must_use]
    pub fn tagged_contract<T: Into<TagSpec>>(
        mut self,
        contract: impl Into<String>,
        tags: impl IntoIterator<Item = T>,
    ) -> Self {
        let tags = tags.into_iter().map(Into::into).collect();
        self.contracts.push((contract.into(), tags));
        self
    }

    /// Adds tags to the most recent contract.
    #[must_use]
    pub fn tags<T: Into<TagSpec>>(mut self, tags: impl IntoIterator<Item = T>) -> Self {
        if let Some((_, existing)) = self.contracts.last_mut() {
            existing.extend(tags.into_iter().map(Into::into));
        }
        self
    }

    /// Sets the lifetime.
    #[must_use]
    pub const fn lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    /// Sets the scope boundary of a scoped binding.
    #[must_use]
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Marks instances as needing disposal.
    #[must_use]
    pub const fn disposable(mut self) -> Self {
        self.disposable = true;
        self
    }

    /// Records the declaration line; the file is the setup's source file.
    #[must_use]
    pub const fn line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    /// Constructs `implementation`. Without a constructor call, the
    /// implementation has a parameterless constructor.
    #[must_use]
    pub fn to(mut self, implementation: impl Into<String>) -> Self {
        self.target = Some(Target::Construct {
            implementation: implementation.into(),
            implements: None,
            constructors: Vec::new(),
        });
        self
    }

    /// Declares the types the implementation is known to implement.
    #[must_use]
    pub fn implements<S: Into<String>>(mut self, types: impl IntoIterator<Item = S>) -> Self {
        if let Some(Target::Construct { implements, .. }) = &mut self.target {
            *implements = Some(types.into_iter().map(Into::into).collect());
        }
        self
    }

    /// Adds a constructor of the implementation.
    #[must_use]
    pub fn constructor<P: Into<Param>>(self, params: impl IntoIterator<Item = P>) -> Self {
        self.push_constructor(params, None)
    }

    /// Adds a constructor with an explicit preference ordinal.
    #[must_use]
    pub fn constructor_ordinal<P: Into<Param>>(
        self,
        ordinal: i32,
        params: impl IntoIterator<Item = P>,
    ) -> Self {
        self.push_constructor(params, Some(ordinal))
    }

    fn push_constructor<P: Into<Param>>(
        mut self,
        params: impl IntoIterator<Item = P>,
        ordinal: Option<i32>,
    ) -> Self {
        if let Some(Target::Construct { constructors, .. }) = &mut self.target {
            constructors.push((params.into_iter().map(Into::into).collect(), ordinal));
        }
        self
    }

    /// Evaluates an inline factory expression.
    #[must_use]
    pub fn factory(mut self, expression: impl Into<String>) -> Self {
        self.target = Some(Target::Factory {
            expression: expression.into(),
            steps: Vec::new(),
            is_async: false,
        });
        self
    }

    /// Injects `ty` into a factory variable.
    #[must_use]
    pub fn inject(self, variable: impl Into<String>, ty: impl Into<String>) -> Self {
        self.push_step(Step::Inject {
            variable: variable.into(),
            ty: Some(ty.into()),
            tag: None,
        })
    }

    /// Injects a tagged `ty` into a factory variable.
    #[must_use]
    pub fn inject_tagged(
        self,
        variable: impl Into<String>,
        ty: impl Into<String>,
        tag: impl Into<TagSpec>,
    ) -> Self {
        self.push_step(Step::Inject {
            variable: variable.into(),
            ty: Some(ty.into()),
            tag: Some(tag.into()),
        })
    }

    /// Injects into a factory variable whose type is inferred from overrides.
    #[must_use]
    pub fn inject_inferred(self, variable: impl Into<String>) -> Self {
        self.push_step(Step::Inject {
            variable: variable.into(),
            ty: None,
            tag: None,
        })
    }

    /// Makes a factory variable satisfy later injections of `ty`, or of the
    /// variable's own type when `ty` is `None`.
    #[must_use]
    pub fn override_with(self, variable: impl Into<String>, ty: Option<&str>) -> Self {
        self.push_step(Step::Override {
            variable: variable.into(),
            ty: ty.map(str::to_string),
        })
    }

    /// Marks the factory as asynchronous.
    #[must_use]
    pub fn asynchronous(mut self) -> Self {
        if let Some(Target::Factory { is_async, .. }) = &mut self.target {
            *is_async = true;
        }
        self
    }

    fn push_step(mut self, step: Step) -> Self {
        if let Some(Target::Factory { steps, .. }) = &mut self.target {
            steps.push(step);
        }
        self
    }

    /// Uses a composition constructor argument.
    #[must_use]
    pub fn arg(mut self, name: impl Into<String>) -> Self {
        self.target = Some(Target::Arg {
            name: name.into(),
            kind: ArgKind::Composition,
        });
        self
    }

    /// Uses an argument of the root method.
    #[must_use]
    pub fn root_arg(mut self, name: impl Into<String>) -> Self {
        self.target = Some(Target::Arg {
            name: name.into(),
            kind: ArgKind::Root,
        });
        self
    }

    fn build(self, file: &str) -> Result<Binding> {
        let location = self
            .line
            .map(|line| SourceLocation::new(file, line, 1))
            .unwrap_or_default();
        let contracts = self
            .contracts
            .into_iter()
            .map(|(ty, tags)| {
                Ok(ContractSpec {
                    ty: TypeRef::parse(&ty)?,
                    tags,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let recipe = match self.target {
            Some(Target::Construct {
                implementation,
                implements,
                constructors,
            }) => Recipe::Construct {
                implementation: TypeRef::parse(&implementation)?,
                implements: implements
                    .map(|types| types.iter().map(|t| TypeRef::parse(t)).collect())
                    .transpose()?,
                constructors: constructors
                    .into_iter()
                    .map(|(params, ordinal)| build_constructor(params, ordinal, &location))
                    .collect::<Result<_>>()?,
            },
            Some(Target::Factory {
                expression,
                steps,
                is_async,
            }) => Recipe::Factory {
                expression,
                steps: steps
                    .into_iter()
                    .map(|step| build_step(step, &location))
                    .collect::<Result<_>>()?,
                is_async,
            },
            Some(Target::Arg { name, kind }) => Recipe::Arg { name, kind },
            None => {
                let Some(implementation) = contracts.first().map(|c| c.ty.clone()) else {
                    return Err(purewire_common::error::PurewireError::Config {
                        message: "binding declares neither a contract nor a recipe".into(),
                    });
                };
                Recipe::Construct {
                    implementation,
                    implements: None,
                    constructors: Vec::new(),
                }
            }
        };
        Ok(Binding {
            contracts,
            lifetime: self.lifetime,
            recipe,
            scope: self.scope,
            disposable: self.disposable,
            location,
        })
    }
}

impl Default for BindingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn build_constructor(
    params: Vec<Param>,
    ordinal: Option<i32>,
    location: &SourceLocation,
) -> Result<Constructor> {
    let parameters = params
        .into_iter()
        .map(|param| {
            Ok(Injection {
                name: param.name,
                ty: TypeRef::parse(&param.ty)?,
                tag: param.tag,
                location: location.clone(),
            })
        })
        .collect::<Result<_>>()?;
    Ok(Constructor {
        parameters,
        ordinal,
    })
}

fn build_step(step: Step, location: &SourceLocation) -> Result<FactoryStep> {
    let parse = |ty: Option<String>| ty.as_deref().map(TypeRef::parse).transpose();
    Ok(match step {
        Step::Inject { variable, ty, tag } => FactoryStep::Inject {
            variable,
            ty: parse(ty)?,
            tag,
            location: location.clone(),
        },
        Step::Override { variable, ty } => FactoryStep::Override {
            variable,
            ty: parse(ty)?,
            location: location.clone(),
        },
    })
}

/// Builder for one setup.
#[derive(Debug, Clone)]
pub struct SetupBuilder {
    name: String,
    file: String,
    kind: SetupKind,
    bindings: Vec<BindingBuilder>,
    roots: Vec<(String, String, Option<TagSpec>, RootKind)>,
    depends_on: Vec<String>,
    default_lifetime: Option<Lifetime>,
    hints: BTreeMap<String, String>,
    markers: Vec<String>,
    members: Vec<(String, bool)>,
}

impl SetupBuilder {
    /// Creates a builder for a public setup; its source file defaults to `<name>.cs`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            file: format!("{name}.cs"),
            name,
            kind: SetupKind::Public,
            bindings: Vec::new(),
            roots: Vec::new(),
            depends_on: Vec::new(),
            default_lifetime: None,
            hints: BTreeMap::new(),
            markers: Vec::new(),
            members: Vec::new(),
        }
    }

    /// Sets the source file used for binding locations.
    #[must_use]
    pub fn file(mut self, file: impl Into<String>) -> Self {
        self.file = file.into();
        self
    }

    /// Sets the setup kind.
    #[must_use]
    pub const fn kind(mut self, kind: SetupKind) -> Self {
        self.kind = kind;
        self
    }

    /// Inherits bindings and roots from another setup.
    #[must_use]
    pub fn depends_on(mut self, setup: impl Into<String>) -> Self {
        self.depends_on.push(setup.into());
        self
    }

    /// Sets the lifetime of bindings that declare none.
    #[must_use]
    pub const fn default_lifetime(mut self, lifetime: Lifetime) -> Self {
        self.default_lifetime = Some(lifetime);
        self
    }

    /// Sets a hint.
    #[must_use]
    pub fn hint(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.hints.insert(key.into(), value.into());
        self
    }

    /// Declares an extra generic marker name.
    #[must_use]
    pub fn marker(mut self, name: impl Into<String>) -> Self {
        self.markers.push(name.into());
        self
    }

    /// Offers a member to dependent compositions.
    #[must_use]
    pub fn member(mut self, name: impl Into<String>, is_static: bool) -> Self {
        self.members.push((name.into(), is_static));
        self
    }

    /// Adds a binding.
    #[must_use]
    pub fn bind(mut self, binding: BindingBuilder) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Adds a property root.
    #[must_use]
    pub fn root(self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.root_with(name, ty, None::<TagSpec>, RootKind::Property)
    }

    /// Adds a root with an explicit tag and member shape.
    #[must_use]
    pub fn root_with(
        mut self,
        name: impl Into<String>,
        ty: impl Into<String>,
        tag: Option<impl Into<TagSpec>>,
        kind: RootKind,
    ) -> Self {
        self.roots
            .push((name.into(), ty.into(), tag.map(Into::into), kind));
        self
    }

    /// Parses every type expression and produces the setup.
    ///
    /// # Errors
    ///
    /// Returns an error if a type expression is malformed or a binding has
    /// neither a contract nor a recipe.
    pub fn build(self) -> Result<Setup> {
        let file = self.file;
        let bindings = self
            .bindings
            .into_iter()
            .map(|b| b.build(&file))
            .collect::<Result<_>>()?;
        let roots = self
            .roots
            .into_iter()
            .map(|(name, ty, tag, kind)| {
                Ok(Root {
                    name,
                    ty: TypeRef::parse(&ty)?,
                    tag,
                    kind,
                    location: SourceLocation::default(),
                })
            })
            .collect::<Result<_>>()?;
        let members = self
            .members
            .into_iter()
            .map(|(name, is_static)| purewire_resolve::model::Member {
                name,
                is_static,
                location: SourceLocation::default(),
            })
            .collect();
        tracing::debug!(setup = %self.name, "setup built");
        Ok(Setup {
            name: self.name,
            kind: self.kind,
            bindings,
            roots,
            depends_on: self.depends_on,
            default_lifetime: self.default_lifetime,
            hints: self.hints,
            markers: self.markers,
            members,
            location: SourceLocation::new(file, 0, 0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_construct_binding_with_constructor() {
        let setup = SetupBuilder::new("Composition")
            .bind(
                BindingBuilder::bind("IService")
                    .lifetime(Lifetime::Singleton)
                    .to("Service")
                    .constructor([Param::new("dep", "IDependency").tag("db")])
                    .line(7),
            )
            .root("Root", "IService")
            .build()
            .expect("valid setup");

        let binding = &setup.bindings[0];
        assert_eq!(binding.lifetime, Some(Lifetime::Singleton));
        assert_eq!(binding.location, SourceLocation::new("Composition.cs", 7, 1));
        let Recipe::Construct { constructors, .. } = &binding.recipe else {
            panic!("expected a construct recipe");
        };
        assert_eq!(constructors[0].parameters[0].tag, Some(TagSpec::value("db")));
        assert_eq!(setup.roots[0].ty.to_string(), "IService");
    }

    #[test]
    fn builds_factory_steps() {
        let setup = SetupBuilder::new("Composition")
            .bind(
                BindingBuilder::bind("IService")
                    .factory("new Service(dep)")
                    .inject("dep", "IDependency")
                    .override_with("dep", None),
            )
            .build()
            .expect("valid setup");
        let Recipe::Factory { steps, .. } = &setup.bindings[0].recipe else {
            panic!("expected a factory recipe");
        };
        assert_eq!(steps.len(), 2);
        assert!(matches!(&steps[1], FactoryStep::Override { ty: None, .. }));
    }

    #[test]
    fn contractless_binding_uses_its_implementation() {
        let setup = SetupBuilder::new("Composition")
            .bind(BindingBuilder::new().to("Service"))
            .build()
            .expect("valid setup");
        assert!(setup.bindings[0].contracts.is_empty());
    }

    #[test]
    fn malformed_type_is_an_error() {
        let result = SetupBuilder::new("Composition")
            .bind(BindingBuilder::bind("List<").to("Service"))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn empty_binding_is_an_error() {
        let result = SetupBuilder::new("Composition")
            .bind(BindingBuilder::new())
            .build();
        assert!(result.is_err());
    }
}
