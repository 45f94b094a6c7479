//! Registry of well-known type shapes the resolver can synthesize.

use purewire_common::config::{ShapeRegistration, ShapeStrategy};

use crate::types::TypeRef;

const COLLECTIONS: &[&str] = &[
    "IEnumerable",
    "IAsyncEnumerable",
    "ICollection",
    "IReadOnlyCollection",
    "IList",
    "IReadOnlyList",
    "List",
    "ISet",
    "IReadOnlySet",
    "HashSet",
    "SortedSet",
    "LinkedList",
    "Queue",
    "Stack",
    "ImmutableArray",
    "IImmutableList",
    "ImmutableList",
    "IImmutableSet",
    "ImmutableHashSet",
    "ImmutableSortedSet",
    "IImmutableQueue",
    "ImmutableQueue",
    "IImmutableStack",
    "ImmutableStack",
    "Span",
    "ReadOnlySpan",
    "Memory",
    "ReadOnlyMemory",
    "ConcurrentBag",
    "ConcurrentQueue",
    "ConcurrentStack",
    "BlockingCollection",
    "IProducerConsumerCollection",
];

#[derive(Debug, Clone)]
struct Shape {
    name: String,
    arity: Option<usize>,
    strategy: ShapeStrategy,
}

impl Shape {
    fn new(name: &str, arity: Option<usize>, strategy: ShapeStrategy) -> Self {
        Self {
            name: simple(name).to_string(),
            arity,
            strategy,
        }
    }

    fn matches(&self, name: &str, arity: usize) -> bool {
        self.name == name && self.arity.is_none_or(|a| a == arity)
    }
}

/// Maps generic type names to synthesis strategies.
///
/// Lookups match on the namespace-free name and the number of type
/// arguments. Later registrations take precedence over earlier ones.
#[derive(Debug, Clone)]
pub struct ShapeRegistry {
    shapes: Vec<Shape>,
}

impl ShapeRegistry {
    /// The built-in collections, providers, tasks and tuples.
    #[must_use]
    pub fn builtin() -> Self {
        let mut shapes: Vec<Shape> = COLLECTIONS
            .iter()
            .map(|name| Shape::new(name, Some(1), ShapeStrategy::EagerAggregate))
            .collect();
        shapes.extend([
            Shape::new("Func", None, ShapeStrategy::Func),
            Shape::new("Lazy", Some(1), ShapeStrategy::Lazy),
            Shape::new("ThreadLocal", Some(1), ShapeStrategy::ThreadLocal),
            Shape::new("Task", Some(1), ShapeStrategy::Completed),
            Shape::new("ValueTask", Some(1), ShapeStrategy::Completed),
            Shape::new("ValueTuple", None, ShapeStrategy::Tuple),
            Shape::new("Tuple", None, ShapeStrategy::Tuple),
        ]);
        Self { shapes }
    }

    /// The built-in registry extended with `registrations`.
    #[must_use]
    pub fn with_registrations(registrations: &[ShapeRegistration]) -> Self {
        let mut registry = Self::builtin();
        for registration in registrations {
            registry.register(registration);
        }
        registry
    }

    /// Adds a shape; it wins over any earlier shape with the same name and arity.
    pub fn register(&mut self, registration: &ShapeRegistration) {
        tracing::debug!(
            name = %registration.name,
            strategy = ?registration.strategy,
            "registering virtual shape"
        );
        self.shapes.push(Shape::new(
            &registration.name,
            registration.arity,
            registration.strategy,
        ));
    }

    /// Strategy for a requested type, if it has a known shape.
    ///
    /// Arrays aggregate their element type and structural tuples resolve
    /// per slot; other types need type arguments to match.
    #[must_use]
    pub fn lookup(&self, ty: &TypeRef) -> Option<ShapeStrategy> {
        match ty {
            TypeRef::Array(_) => Some(ShapeStrategy::EagerAggregate),
            TypeRef::Tuple(_) => Some(ShapeStrategy::Tuple),
            TypeRef::Named { name, args } if !args.is_empty() => {
                let name = simple(name);
                self.shapes
                    .iter()
                    .rev()
                    .find(|shape| shape.matches(name, args.len()))
                    .map(|shape| shape.strategy)
            }
            _ => None,
        }
    }
}

impl Default for ShapeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn simple(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(registry: &ShapeRegistry, input: &str) -> Option<ShapeStrategy> {
        registry.lookup(&TypeRef::parse(input).expect("valid type"))
    }

    #[test]
    fn builtin_shapes() {
        let registry = ShapeRegistry::builtin();
        assert_eq!(
            lookup(&registry, "IEnumerable<IDep>"),
            Some(ShapeStrategy::EagerAggregate)
        );
        assert_eq!(
            lookup(&registry, "System.Collections.Generic.IReadOnlyList<IDep>"),
            Some(ShapeStrategy::EagerAggregate)
        );
        assert_eq!(lookup(&registry, "IDep[]"), Some(ShapeStrategy::EagerAggregate));
        assert_eq!(lookup(&registry, "Func<int, IDep>"), Some(ShapeStrategy::Func));
        assert_eq!(lookup(&registry, "Lazy<IDep>"), Some(ShapeStrategy::Lazy));
        assert_eq!(lookup(&registry, "Task<IDep>"), Some(ShapeStrategy::Completed));
        assert_eq!(lookup(&registry, "(IA, IB)"), Some(ShapeStrategy::Tuple));
    }

    #[test]
    fn arity_and_plain_names_do_not_match() {
        let registry = ShapeRegistry::builtin();
        assert_eq!(lookup(&registry, "Lazy<IA, IB>"), None);
        assert_eq!(lookup(&registry, "IEnumerable"), None);
        assert_eq!(lookup(&registry, "IService<int>"), None);
    }

    #[test]
    fn registrations_extend_and_override() {
        let registry = ShapeRegistry::with_registrations(&[
            ShapeRegistration {
                name: "My.Bag".into(),
                arity: Some(1),
                strategy: ShapeStrategy::EagerAggregate,
            },
            ShapeRegistration {
                name: "Lazy".into(),
                arity: Some(1),
                strategy: ShapeStrategy::Func,
            },
        ]);
        assert_eq!(lookup(&registry, "Bag<IDep>"), Some(ShapeStrategy::EagerAggregate));
        assert_eq!(lookup(&registry, "Lazy<IDep>"), Some(ShapeStrategy::Func));
    }
}
