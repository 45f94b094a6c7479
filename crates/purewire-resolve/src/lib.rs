//! # purewire-resolve
//!
//! Compile-time dependency-injection resolution for purewire setups.
//!
//! Handles:
//! - **Types**: Parsing, substitution and unification of type expressions.
//! - **Merger**: Folding a composition and its dependencies into one binding table.
//! - **Resolver**: Matching requested contracts to bindings or virtual shapes.
//! - **Builder**: Per-root graph construction, constructor choice and cycle breaking.
//! - **Validator**: Lifetime capture checks on the finished graph.
//! - **Plan**: Dependency-first construction plans for clean roots.
//! - **Diagnostics**: Stable ids, localized messages and severity hints.
//!
//! [`Engine`] runs the whole pipeline over a set of [`Setup`](model::Setup)s.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod builder;
pub mod diagnostics;
pub mod graph;
pub mod hints;
pub mod merger;
pub mod model;
pub mod pipeline;
pub mod plan;
pub mod resolver;
pub mod types;
pub mod validator;

#[cfg(test)]
mod testing;

pub use diagnostics::{Diagnostic, DiagnosticId, Severity};
pub use pipeline::{CompositionReport, Engine, Report, RootReport};
