//! Positional unification of marker patterns against requested types.

use std::collections::BTreeMap;
use std::fmt;

use super::TypeRef;

/// Marker bindings produced by unification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Substitution(BTreeMap<String, TypeRef>);

impl Substitution {
    /// Returns the type bound to `marker`.
    #[must_use]
    pub fn get(&self, marker: &str) -> Option<&TypeRef> {
        self.0.get(marker)
    }

    /// Binds `marker` to `ty`, replacing any previous binding.
    pub fn bind(&mut self, marker: impl Into<String>, ty: TypeRef) {
        let _ = self.0.insert(marker.into(), ty);
    }

    /// Returns `true` when nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over bindings in marker-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypeRef)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl fmt::Display for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (marker, ty)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{marker}={ty}")?;
        }
        Ok(())
    }
}

/// Unifies `pattern` against `concrete`.
///
/// Markers in `pattern` bind positionally to the corresponding part of
/// `concrete`; every occurrence of a marker must bind to a structurally equal
/// type. Markers appearing in `concrete` are opaque and only match a pattern
/// marker or an identical marker.
///
/// Returns `None` when the shapes differ or a marker would need two
/// different substitutions.
#[must_use]
pub fn unify(pattern: &TypeRef, concrete: &TypeRef) -> Option<Substitution> {
    let mut substitution = Substitution::default();
    unify_into(pattern, concrete, &mut substitution).then_some(substitution)
}

fn unify_into(pattern: &TypeRef, concrete: &TypeRef, subst: &mut Substitution) -> bool {
    match (pattern, concrete) {
        (TypeRef::Marker(marker), _) => match subst.get(marker) {
            Some(bound) => bound == concrete,
            None => {
                subst.bind(marker.clone(), concrete.clone());
                true
            }
        },
        (
            TypeRef::Named { name: pn, args: pa },
            TypeRef::Named { name: cn, args: ca },
        ) => pn == cn && unify_all(pa, ca, subst),
        (TypeRef::Array(pe), TypeRef::Array(ce)) => unify_into(pe, ce, subst),
        (TypeRef::Tuple(pi), TypeRef::Tuple(ci)) => unify_all(pi, ci, subst),
        _ => false,
    }
}

fn unify_all(patterns: &[TypeRef], concretes: &[TypeRef], subst: &mut Substitution) -> bool {
    patterns.len() == concretes.len()
        && patterns
            .iter()
            .zip(concretes)
            .all(|(p, c)| unify_into(p, c, subst))
}
