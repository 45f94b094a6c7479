//! Type expressions with generic markers.
//!
//! Types are written as strings in setup documents (`IReadOnlyList<IDependency>`,
//! `Func<int, IService<TT>>`, `(IA, IB)`, `IDependency[]`) and parsed into
//! [`TypeRef`] trees. Generic markers are unbound placeholders that the
//! resolver binds by unification.

pub mod parser;
pub mod unify;

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use purewire_common::constants::MARKER_PREFIX;

pub use self::unify::{Substitution, unify};

/// A parsed type expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeRef {
    /// A named type with optional generic arguments.
    Named {
        /// Possibly dotted type name.
        name: String,
        /// Generic type arguments.
        args: Vec<TypeRef>,
    },
    /// An unbound generic marker.
    Marker(String),
    /// A single-dimensional array.
    Array(Box<TypeRef>),
    /// A value tuple with at least two items.
    Tuple(Vec<TypeRef>),
}

impl TypeRef {
    /// Creates a non-generic named type.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Creates a generic named type.
    #[must_use]
    pub fn generic(name: impl Into<String>, args: Vec<Self>) -> Self {
        Self::Named {
            name: name.into(),
            args,
        }
    }

    /// Creates a generic marker.
    #[must_use]
    pub fn marker(name: impl Into<String>) -> Self {
        Self::Marker(name.into())
    }

    /// Creates an array of `element`.
    #[must_use]
    pub fn array(element: Self) -> Self {
        Self::Array(Box::new(element))
    }

    /// Parses a type expression.
    ///
    /// # Errors
    ///
    /// Returns [`purewire_common::error::PurewireError::TypeSyntax`] when the
    /// input is not a well-formed type.
    pub fn parse(input: &str) -> purewire_common::error::Result<Self> {
        parser::parse_type(input)
    }

    /// Returns the full name of a named type.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Named { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Returns the name without its namespace, e.g. `Func` for `System.Func`.
    #[must_use]
    pub fn simple_name(&self) -> Option<&str> {
        self.name()
            .map(|name| name.rsplit('.').next().unwrap_or(name))
    }

    /// Generic arguments of a named type, tuple items, or the array element.
    #[must_use]
    pub fn args(&self) -> &[Self] {
        match self {
            Self::Named { args, .. } | Self::Tuple(args) => args,
            Self::Array(element) => std::slice::from_ref(element.as_ref()),
            Self::Marker(_) => &[],
        }
    }

    /// Returns `true` if this type is a marker.
    #[must_use]
    pub const fn is_marker(&self) -> bool {
        matches!(self, Self::Marker(_))
    }

    /// Returns `true` if the type is or contains a marker at any depth.
    #[must_use]
    pub fn contains_marker(&self) -> bool {
        match self {
            Self::Marker(_) => true,
            _ => self.args().iter().any(Self::contains_marker),
        }
    }

    /// Collects the names of all markers used in the type.
    #[must_use]
    pub fn markers(&self) -> BTreeSet<&str> {
        let mut found = BTreeSet::new();
        self.collect_markers(&mut found);
        found
    }

    fn collect_markers<'a>(&'a self, found: &mut BTreeSet<&'a str>) {
        if let Self::Marker(name) = self {
            let _ = found.insert(name.as_str());
        }
        for arg in self.args() {
            arg.collect_markers(found);
        }
    }

    /// Replaces bound markers with their substitutions.
    #[must_use]
    pub fn substitute(&self, substitution: &Substitution) -> Self {
        match self {
            Self::Marker(name) => substitution
                .get(name)
                .cloned()
                .unwrap_or_else(|| self.clone()),
            Self::Named { name, args } => Self::Named {
                name: name.clone(),
                args: args.iter().map(|a| a.substitute(substitution)).collect(),
            },
            Self::Array(element) => Self::array(element.substitute(substitution)),
            Self::Tuple(items) => {
                Self::Tuple(items.iter().map(|a| a.substitute(substitution)).collect())
            }
        }
    }

    /// Turns argument-less named types listed in `custom` into markers.
    ///
    /// Setups may declare their own marker names on top of the built-in ones.
    #[must_use]
    pub fn with_custom_markers(&self, custom: &HashSet<String>) -> Self {
        if custom.is_empty() {
            return self.clone();
        }
        match self {
            Self::Named { name, args } if args.is_empty() && custom.contains(name) => {
                Self::Marker(name.clone())
            }
            Self::Named { name, args } => Self::Named {
                name: name.clone(),
                args: args.iter().map(|a| a.with_custom_markers(custom)).collect(),
            },
            Self::Array(element) => Self::array(element.with_custom_markers(custom)),
            Self::Tuple(items) => Self::Tuple(
                items
                    .iter()
                    .map(|a| a.with_custom_markers(custom))
                    .collect(),
            ),
            Self::Marker(_) => self.clone(),
        }
    }
}

/// Returns `true` for the built-in marker names.
///
/// `TT`, `TT` followed by digits (`TT1`), or `TT` followed by an
/// uppercase-led word (`TTS`, `TTList`).
#[must_use]
pub fn is_builtin_marker(name: &str) -> bool {
    let Some(rest) = name.strip_prefix(MARKER_PREFIX) else {
        return false;
    };
    if rest.is_empty() {
        return true;
    }
    if rest.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    rest.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && rest.chars().all(|c| c.is_ascii_alphanumeric())
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Marker(name) => write!(f, "{name}"),
            Self::Named { name, args } => {
                write!(f, "{name}")?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    write_list(f, args)?;
                    write!(f, ">")?;
                }
                Ok(())
            }
            Self::Array(element) => write!(f, "{element}[]"),
            Self::Tuple(items) => {
                write!(f, "(")?;
                write_list(f, items)?;
                write!(f, ")")
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[TypeRef]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl TryFrom<String> for TypeRef {
    type Error = purewire_common::error::PurewireError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TypeRef> for String {
    fn from(value: TypeRef) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(input: &str) -> TypeRef {
        TypeRef::parse(input).expect("valid type")
    }

    #[test]
    fn builtin_marker_names() {
        assert!(is_builtin_marker("TT"));
        assert!(is_builtin_marker("TT1"));
        assert!(is_builtin_marker("TTList"));
        assert!(is_builtin_marker("TTS"));
        assert!(!is_builtin_marker("TTask"));
        assert!(!is_builtin_marker("T"));
        assert!(!is_builtin_marker("Service"));
    }

    #[test]
    fn display_is_canonical() {
        assert_eq!(
            ty("Func< int ,IService<TT> >").to_string(),
            "Func<int, IService<TT>>"
        );
        assert_eq!(ty("(IA,IB)[]").to_string(), "(IA, IB)[]");
    }

    #[test]
    fn markers_are_collected_at_any_depth() {
        let t = ty("IDictionary<TT1, IList<TT2>>");
        assert!(t.contains_marker());
        let markers: Vec<&str> = t.markers().into_iter().collect();
        assert_eq!(markers, vec!["TT1", "TT2"]);
        assert!(!ty("IList<int>").contains_marker());
    }

    #[test]
    fn substitute_replaces_bound_markers_only() {
        let mut subst = Substitution::default();
        subst.bind("TT1", ty("int"));
        let t = ty("IMap<TT1, TT2>").substitute(&subst);
        assert_eq!(t.to_string(), "IMap<int, TT2>");
    }

    #[test]
    fn custom_markers_are_applied() {
        let custom: HashSet<String> = std::iter::once("TKey".to_string()).collect();
        let t = ty("IRepo<TKey>").with_custom_markers(&custom);
        assert_eq!(t.args()[0], TypeRef::marker("TKey"));
    }

    #[test]
    fn simple_name_strips_namespace() {
        assert_eq!(ty("System.Func<int>").simple_name(), Some("Func"));
        assert_eq!(ty("Lazy<int>").simple_name(), Some("Lazy"));
        assert_eq!(ty("int[]").simple_name(), None);
    }

    #[test]
    fn serde_uses_string_form() {
        let json = serde_json::to_string(&ty("IList<TT>")).expect("serialize");
        assert_eq!(json, "\"IList<TT>\"");
        let back: TypeRef = serde_json::from_str("\"Lazy<IService>\"").expect("deserialize");
        assert_eq!(back.simple_name(), Some("Lazy"));
        assert!(serde_json::from_str::<TypeRef>("\"List<\"").is_err());
    }
}
