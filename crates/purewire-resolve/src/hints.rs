//! Key/value configuration hints with typed accessors.
//!
//! Hints are layered: caller hints first, then every merged setup in
//! dependency order, so a dependent setup overrides its bases per key.

use std::collections::BTreeMap;

use serde::Serialize;

use purewire_common::types::Culture;

use crate::diagnostics::{DiagnosticId, Severity};

/// Hint enabling diagnostics about roots unavailable to resolve methods.
pub const RESOLVE: &str = "Resolve";
/// Hint recorded in plans for lazily initialized shared slots.
pub const THREAD_SAFE: &str = "ThreadSafe";
/// Hint selecting the diagnostic culture.
pub const CULTURE: &str = "Culture";
/// Hint controlling the severity of not-implemented contracts.
pub const SEVERITY_OF_NOT_IMPLEMENTED_CONTRACT: &str = "SeverityOfNotImplementedContract";
/// Prefix of per-diagnostic severity hints, e.g. `Severity.WarningBindingNotUsed`.
pub const SEVERITY_PREFIX: &str = "Severity.";

/// Merged hints of a composition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Hints(BTreeMap<String, String>);

impl Hints {
    /// Creates hints from a caller map.
    #[must_use]
    pub const fn new(values: BTreeMap<String, String>) -> Self {
        Self(values)
    }

    /// Overlays `values`; existing keys are replaced.
    pub fn overlay(&mut self, values: &BTreeMap<String, String>) {
        for (key, value) in values {
            let _ = self.0.insert(key.clone(), value.clone());
        }
    }

    /// Sets one hint.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let _ = self.0.insert(key.into(), value.into());
    }

    /// Returns the raw value of a hint.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        match self.get(key).map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "on" || v == "true" => true,
            Some(v) if v == "off" || v == "false" => false,
            _ => default,
        }
    }

    /// Whether resolve methods are generated (default on).
    #[must_use]
    pub fn resolve_methods(&self) -> bool {
        self.flag(RESOLVE, true)
    }

    /// Whether shared slots need thread-safe initialization (default on).
    #[must_use]
    pub fn thread_safe(&self) -> bool {
        self.flag(THREAD_SAFE, true)
    }

    /// Culture requested by the composition, if any.
    #[must_use]
    pub fn culture(&self) -> Option<Culture> {
        self.get(CULTURE).map(Culture::from_name)
    }

    /// Severity override for `id`, if a hint sets one.
    #[must_use]
    pub fn severity_for(&self, id: DiagnosticId) -> Option<Severity> {
        if id == DiagnosticId::ErrorNotImplementedContract {
            if let Some(severity) = self
                .get(SEVERITY_OF_NOT_IMPLEMENTED_CONTRACT)
                .and_then(Severity::from_hint)
            {
                return Some(severity);
            }
        }
        self.get(&format!("{SEVERITY_PREFIX}{id}"))
            .and_then(Severity::from_hint)
    }

    /// Iterates over hints in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_default_on() {
        let hints = Hints::default();
        assert!(hints.resolve_methods());
        assert!(hints.thread_safe());
    }

    #[test]
    fn overlay_replaces_per_key() {
        let mut hints = Hints::default();
        hints.set(RESOLVE, "On");
        hints.set(THREAD_SAFE, "Off");
        let mut child = BTreeMap::new();
        let _ = child.insert(RESOLVE.to_string(), "Off".to_string());
        hints.overlay(&child);
        assert!(!hints.resolve_methods());
        assert!(!hints.thread_safe());
    }

    #[test]
    fn severity_hints() {
        let mut hints = Hints::default();
        hints.set(SEVERITY_OF_NOT_IMPLEMENTED_CONTRACT, "Info");
        hints.set("Severity.WarningMetadataDefect", "Error");
        assert_eq!(
            hints.severity_for(DiagnosticId::ErrorNotImplementedContract),
            Some(Severity::Info)
        );
        assert_eq!(
            hints.severity_for(DiagnosticId::WarningMetadataDefect),
            Some(Severity::Error)
        );
        assert_eq!(hints.severity_for(DiagnosticId::WarningBindingNotUsed), None);
    }

    #[test]
    fn culture_hint() {
        let mut hints = Hints::default();
        assert_eq!(hints.culture(), None);
        hints.set(CULTURE, "ru-RU");
        assert_eq!(hints.culture(), Some(Culture::Ru));
    }
}
