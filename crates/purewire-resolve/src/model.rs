//! Setup documents: the immutable input of a resolution run.
//!
//! A front end produces an ordered list of [`Setup`] records, either through
//! the SDK's fluent builder or by deserializing a YAML/JSON document. Nothing
//! here is mutated once the merger starts.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use purewire_common::constants::{ANY_TAG, UNIQUE_TAG};
use purewire_common::types::SourceLocation;

use crate::types::TypeRef;

/// How long a constructed instance lives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Lifetime {
    /// A new instance for every injection.
    #[default]
    Transient,
    /// One instance per deferred block (per provider call).
    PerBlock,
    /// One instance per root resolution.
    PerResolve,
    /// One instance per scope.
    Scoped,
    /// One instance per composition.
    Singleton,
}

impl Lifetime {
    /// Width of the instantiation scope; wider lifetimes outlive narrower ones.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Transient | Self::PerBlock | Self::PerResolve => 0,
            Self::Scoped => 1,
            Self::Singleton => 2,
        }
    }

    /// Returns `true` for lifetimes whose instances live outside a single resolution.
    #[must_use]
    pub const fn is_long_lived(self) -> bool {
        matches!(self, Self::Scoped | Self::Singleton)
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Transient => "Transient",
            Self::PerBlock => "PerBlock",
            Self::PerResolve => "PerResolve",
            Self::Scoped => "Scoped",
            Self::Singleton => "Singleton",
        };
        write!(f, "{name}")
    }
}

/// A tag as written by the front end.
///
/// In documents tags are plain scalars; the words `Unique` and `Any` are
/// reserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TagSpec {
    /// A literal discriminator, compared textually.
    Value(String),
    /// A fresh synthetic tag per binding.
    Unique,
    /// Matches a request with any tag.
    Any,
}

impl TagSpec {
    /// Creates a literal tag.
    #[must_use]
    pub fn value(value: impl fmt::Display) -> Self {
        Self::Value(value.to_string())
    }
}

impl From<String> for TagSpec {
    fn from(value: String) -> Self {
        match value.as_str() {
            UNIQUE_TAG => Self::Unique,
            ANY_TAG => Self::Any,
            _ => Self::Value(value),
        }
    }
}

impl From<&str> for TagSpec {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl fmt::Display for TagSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v}"),
            Self::Unique => write!(f, "{UNIQUE_TAG}"),
            Self::Any => write!(f, "{ANY_TAG}"),
        }
    }
}

impl Serialize for TagSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TagSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Scalar {
            Text(String),
            Int(i64),
            Float(f64),
            Bool(bool),
        }

        let text = match Scalar::deserialize(deserializer)? {
            Scalar::Text(s) => s,
            Scalar::Int(n) => n.to_string(),
            Scalar::Float(n) => n.to_string(),
            Scalar::Bool(b) => b.to_string(),
        };
        Ok(Self::from(text))
    }
}

/// A tag after merging: unique tags carry their synthetic number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Tag {
    /// A literal discriminator.
    Value(String),
    /// A synthetic tag; never equal to any other binding's tag.
    Unique(u32),
    /// Matches any requested tag.
    Any,
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "\"{v}\""),
            Self::Unique(n) => write!(f, "{UNIQUE_TAG}#{n}"),
            Self::Any => write!(f, "{ANY_TAG}"),
        }
    }
}

/// A resolved dependency request: a type plus an optional tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Contract {
    /// Requested type.
    #[serde(rename = "type")]
    pub ty: TypeRef,
    /// Requested tag.
    pub tag: Option<Tag>,
}

impl Contract {
    /// Creates an untagged contract.
    #[must_use]
    pub const fn new(ty: TypeRef) -> Self {
        Self { ty, tag: None }
    }

    /// Creates a tagged contract.
    #[must_use]
    pub const fn tagged(ty: TypeRef, tag: Option<Tag>) -> Self {
        Self { ty, tag }
    }

    /// Converts a front-end tag for a request. `Unique` cannot be requested
    /// by name; it maps to a tag no binding carries.
    #[must_use]
    pub fn request(ty: TypeRef, tag: Option<&TagSpec>) -> Self {
        let tag = tag.map(|t| match t {
            TagSpec::Value(v) => Tag::Value(v.clone()),
            TagSpec::Unique => Tag::Unique(u32::MAX),
            TagSpec::Any => Tag::Any,
        });
        Self { ty, tag }
    }
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{}({tag})", self.ty),
            None => write!(f, "{}", self.ty),
        }
    }
}

/// A contract as declared on a binding: one type, zero or more tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSpec {
    /// Contract type.
    #[serde(rename = "type")]
    pub ty: TypeRef,
    /// Tags; empty means untagged.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TagSpec>,
}

impl ContractSpec {
    /// Creates an untagged contract spec.
    #[must_use]
    pub const fn new(ty: TypeRef) -> Self {
        Self {
            ty,
            tags: Vec::new(),
        }
    }
}

/// A constructor or method parameter to inject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Injection {
    /// Parameter name.
    pub name: String,
    /// Parameter type.
    #[serde(rename = "type")]
    pub ty: TypeRef,
    /// Requested tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<TagSpec>,
    /// Declaration site of the parameter.
    #[serde(default)]
    pub location: SourceLocation,
}

/// One constructor of an implementation type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constructor {
    /// Parameters in declaration order.
    #[serde(default)]
    pub parameters: Vec<Injection>,
    /// Explicit preference; lower ordinals are tried first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordinal: Option<i32>,
}

/// A statement inside an inline factory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactoryStep {
    /// Injects a dependency into a local variable.
    Inject {
        /// Local variable receiving the value.
        variable: String,
        /// Injected type; inferred from overrides when absent.
        #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
        ty: Option<TypeRef>,
        /// Requested tag.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tag: Option<TagSpec>,
        /// Injection site.
        #[serde(default)]
        location: SourceLocation,
    },
    /// Makes a local variable satisfy later injections of its type.
    Override {
        /// Local variable supplying the value.
        variable: String,
        /// Overridden type; the variable's injected type when absent.
        #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
        ty: Option<TypeRef>,
        /// Override site.
        #[serde(default)]
        location: SourceLocation,
    },
}

/// Where an externally supplied argument comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArgKind {
    /// A composition constructor argument.
    #[default]
    Composition,
    /// An argument of the root method.
    Root,
}

/// How a binding constructs its instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recipe {
    /// Calls a constructor of a concrete type.
    Construct {
        /// Implementation type.
        implementation: TypeRef,
        /// Types the implementation is known to implement, when known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        implements: Option<Vec<TypeRef>>,
        /// Available constructors; empty means a parameterless constructor.
        #[serde(default)]
        constructors: Vec<Constructor>,
    },
    /// Evaluates an inline factory expression.
    Factory {
        /// Factory body as written by the user.
        expression: String,
        /// Statements declaring the factory's injections.
        #[serde(default)]
        steps: Vec<FactoryStep>,
        /// Whether the body uses asynchronous suspension.
        #[serde(default, rename = "async")]
        is_async: bool,
    },
    /// Uses a value supplied from outside the composition.
    Arg {
        /// Argument name.
        name: String,
        /// Argument origin.
        #[serde(default)]
        kind: ArgKind,
    },
}

/// A registration mapping contracts to a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    /// Contracts this binding satisfies; empty means the implementation type.
    #[serde(default)]
    pub contracts: Vec<ContractSpec>,
    /// Explicit lifetime; the setup default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifetime: Option<Lifetime>,
    /// Construction recipe.
    pub recipe: Recipe,
    /// Scope boundary of a scoped binding; absent means the composition scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Whether instances must be disposed.
    #[serde(default)]
    pub disposable: bool,
    /// Declaration site.
    #[serde(default)]
    pub location: SourceLocation,
}

/// Visibility of the composition generated from a setup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SetupKind {
    /// A public composition.
    #[default]
    Public,
    /// An internal composition.
    Internal,
    /// Not a composition; implicitly a base of every other setup.
    Global,
}

/// Shape of a generated root member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RootKind {
    /// An instance property.
    #[default]
    Property,
    /// An instance method.
    Method,
    /// A static member without a composition instance.
    Static,
    /// A partial method implemented by the composition.
    Partial,
}

/// An entry point of a composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Root {
    /// Exposed member name; empty for resolve-only roots.
    #[serde(default)]
    pub name: String,
    /// Root type.
    #[serde(rename = "type")]
    pub ty: TypeRef,
    /// Root tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<TagSpec>,
    /// Member shape.
    #[serde(default)]
    pub kind: RootKind,
    /// Declaration site.
    #[serde(default)]
    pub location: SourceLocation,
}

/// A member a setup contributes to the compositions depending on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Member name.
    pub name: String,
    /// Static members are forwarded; instance members are re-instantiated.
    #[serde(default)]
    pub is_static: bool,
    /// Declaration site.
    #[serde(default)]
    pub location: SourceLocation,
}

/// A named group of bindings and roots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setup {
    /// Composition name.
    pub name: String,
    /// Composition kind.
    #[serde(default)]
    pub kind: SetupKind,
    /// Bindings in declaration order.
    #[serde(default)]
    pub bindings: Vec<Binding>,
    /// Roots in declaration order.
    #[serde(default)]
    pub roots: Vec<Root>,
    /// Setups whose bindings and roots this one inherits.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Lifetime for bindings of this setup that declare none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_lifetime: Option<Lifetime>,
    /// Configuration hints.
    #[serde(default)]
    pub hints: BTreeMap<String, String>,
    /// Extra generic marker names.
    #[serde(default)]
    pub markers: Vec<String>,
    /// Members offered to dependent compositions.
    #[serde(default)]
    pub members: Vec<Member>,
    /// Declaration site.
    #[serde(default)]
    pub location: SourceLocation,
}

impl Setup {
    /// Creates an empty public setup.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}
