//! # purewire-sdk
//!
//! Public SDK for using purewire as a Rust library.
//!
//! Provides two main entry points:
//! - [`SetupBuilder`](builder::SetupBuilder): Fluent API for declaring setups and their bindings.
//! - [`Composer`](composer::Composer): Loads setup documents and resolves every composition.
//!
//! # Example
//!
//! ```rust,no_run
//! use purewire_sdk::builder::{BindingBuilder, SetupBuilder};
//! use purewire_sdk::composer::Composer;
//!
//! let mut composer = Composer::default();
//! composer
//!     .add(
//!         SetupBuilder::new("Composition")
//!             .bind(BindingBuilder::bind("IService").to("Service"))
//!             .root("Service", "IService"),
//!     )
//!     .expect("valid setup");
//! let report = composer.compose();
//! assert!(!report.has_errors());
//! ```

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod builder;
pub mod composer;

pub use purewire_resolve::model::{Lifetime, RootKind, SetupKind};
pub use purewire_resolve::{CompositionReport, DiagnosticId, Report};
