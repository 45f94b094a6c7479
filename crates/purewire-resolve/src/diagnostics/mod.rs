//! Diagnostic ids, severities and the per-composition sink.
//!
//! Every rule of the engine reports a typed [`Message`] with a stable
//! [`DiagnosticId`] and a source location. Messages are rendered in the
//! composition's culture only when the sink is finished, after the merged
//! hints are known, so severity overrides and localization never change
//! which diagnostics exist.

mod messages;

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use purewire_common::types::{Culture, SourceLocation};

use crate::hints::Hints;

pub use self::messages::Message;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Severity {
    /// Dropped from reports.
    Hidden,
    /// Informational.
    Info,
    /// Advisory; never aborts processing.
    Warning,
    /// Makes the affected root or composition unusable.
    Error,
}

impl Severity {
    /// Parses a hint value such as `Error` or `hidden`.
    #[must_use]
    pub fn from_hint(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warning" => Some(Self::Warning),
            "info" => Some(Self::Info),
            "hidden" => Some(Self::Hidden),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Hidden => "hidden",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        write!(f, "{name}")
    }
}

/// Stable diagnostic identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DiagnosticId {
    /// No binding, generic unification or virtual shape satisfies a contract.
    ErrorUnableToResolve,
    /// An eager dependency cycle.
    ErrorCyclicDependency,
    /// A long-lived node captures a narrower one.
    ErrorLifetimeDefect,
    /// A factory injection whose type cannot be pinned down.
    ErrorTypeCannotBeInferred,
    /// A factory that needs true asynchronous construction.
    ErrorAsyncFactoryNotSupported,
    /// Setups depend on each other in a cycle.
    ErrorDependsOnCycle,
    /// A `depends_on` entry names an unknown setup.
    ErrorSetupNotFound,
    /// Two roots share a name, or two anonymous roots share a contract.
    ErrorDuplicateRoot,
    /// An external argument whose type contains a generic marker.
    ErrorGenericArgument,
    /// An implementation that does not implement one of its contracts.
    ErrorNotImplementedContract,
    /// A shadowed binding that nothing uses.
    WarningBindingNotUsed,
    /// A binding replacing an earlier one for the same contract.
    WarningOverriddenBinding,
    /// An active binding no root reaches.
    WarningMetadataDefect,
    /// A factory injection whose variable the factory never reads.
    WarningInjectionSiteNotUsed,
    /// An instance member inherited through `depends_on`.
    WarningInstanceMemberInDependsOnSetup,
    /// A generic root that resolve methods cannot serve.
    WarningTypeArgInResolveMethod,
}

impl DiagnosticId {
    /// Every id, in code order.
    pub const ALL: [Self; 16] = [
        Self::ErrorUnableToResolve,
        Self::ErrorCyclicDependency,
        Self::ErrorLifetimeDefect,
        Self::ErrorTypeCannotBeInferred,
        Self::ErrorAsyncFactoryNotSupported,
        Self::ErrorDependsOnCycle,
        Self::ErrorSetupNotFound,
        Self::ErrorDuplicateRoot,
        Self::ErrorGenericArgument,
        Self::ErrorNotImplementedContract,
        Self::WarningBindingNotUsed,
        Self::WarningOverriddenBinding,
        Self::WarningMetadataDefect,
        Self::WarningInjectionSiteNotUsed,
        Self::WarningInstanceMemberInDependsOnSetup,
        Self::WarningTypeArgInResolveMethod,
    ];

    /// Short stable code, e.g. `PWE001`.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ErrorUnableToResolve => "PWE001",
            Self::ErrorCyclicDependency => "PWE002",
            Self::ErrorLifetimeDefect => "PWE003",
            Self::ErrorTypeCannotBeInferred => "PWE004",
            Self::ErrorAsyncFactoryNotSupported => "PWE005",
            Self::ErrorDependsOnCycle => "PWE006",
            Self::ErrorSetupNotFound => "PWE007",
            Self::ErrorDuplicateRoot => "PWE008",
            Self::ErrorGenericArgument => "PWE009",
            Self::ErrorNotImplementedContract => "PWE010",
            Self::WarningBindingNotUsed => "PWW001",
            Self::WarningOverriddenBinding => "PWW002",
            Self::WarningMetadataDefect => "PWW003",
            Self::WarningInjectionSiteNotUsed => "PWW004",
            Self::WarningInstanceMemberInDependsOnSetup => "PWW005",
            Self::WarningTypeArgInResolveMethod => "PWW006",
        }
    }

    /// Returns `true` for the `Error*` family.
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(self.default_severity(), Severity::Error)
    }

    /// Severity before any hint is applied.
    #[must_use]
    pub const fn default_severity(self) -> Severity {
        match self {
            Self::ErrorUnableToResolve
            | Self::ErrorCyclicDependency
            | Self::ErrorLifetimeDefect
            | Self::ErrorTypeCannotBeInferred
            | Self::ErrorAsyncFactoryNotSupported
            | Self::ErrorDependsOnCycle
            | Self::ErrorSetupNotFound
            | Self::ErrorDuplicateRoot
            | Self::ErrorGenericArgument
            | Self::ErrorNotImplementedContract => Severity::Error,
            Self::WarningBindingNotUsed
            | Self::WarningOverriddenBinding
            | Self::WarningMetadataDefect
            | Self::WarningInjectionSiteNotUsed
            | Self::WarningInstanceMemberInDependsOnSetup
            | Self::WarningTypeArgInResolveMethod => Severity::Warning,
        }
    }

    /// Whether hints may change the severity of this id.
    #[must_use]
    pub const fn is_reclassifiable(self) -> bool {
        !self.is_error() || matches!(self, Self::ErrorNotImplementedContract)
    }

    /// Looks an id up by its name, e.g. `WarningBindingNotUsed`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.to_string() == name)
    }
}

impl fmt::Display for DiagnosticId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A rendered diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Stable identifier.
    pub id: DiagnosticId,
    /// Short stable code.
    pub code: &'static str,
    /// Effective severity after hints.
    pub severity: Severity,
    /// Localized message.
    pub message: String,
    /// Primary source location.
    pub location: SourceLocation,
}

impl Diagnostic {
    /// Returns `true` when the effective severity is [`Severity::Error`].
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} {}: {}",
            self.location, self.severity, self.code, self.message
        )
    }
}

/// Collects diagnostics for one composition, deduplicating identical reports.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    pending: Vec<(SourceLocation, Message)>,
    seen: HashSet<(DiagnosticId, SourceLocation, Message)>,
}

impl DiagnosticSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a diagnostic unless an identical one was already recorded.
    pub fn report(&mut self, location: SourceLocation, message: Message) {
        let key = (message.id(), location.clone(), message.clone());
        if self.seen.insert(key) {
            tracing::trace!(id = %message.id(), %location, "diagnostic reported");
            self.pending.push((location, message));
        }
    }

    /// Number of recorded diagnostics, hidden ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` when nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Returns `true` if any recorded diagnostic is an error under `hints`.
    #[must_use]
    pub fn has_errors(&self, hints: &Hints) -> bool {
        self.pending
            .iter()
            .any(|(_, m)| effective_severity(m.id(), hints) == Severity::Error)
    }

    /// Applies severity hints, renders messages and drops hidden diagnostics.
    #[must_use]
    pub fn finish(self, hints: &Hints, culture: Culture) -> Vec<Diagnostic> {
        self.pending
            .into_iter()
            .filter_map(|(location, message)| {
                let id = message.id();
                let severity = effective_severity(id, hints);
                (severity != Severity::Hidden).then(|| Diagnostic {
                    id,
                    code: id.code(),
                    severity,
                    message: message.render(culture),
                    location,
                })
            })
            .collect()
    }
}

fn effective_severity(id: DiagnosticId, hints: &Hints) -> Severity {
    if !id.is_reclassifiable() {
        return id.default_severity();
    }
    hints.severity_for(id).unwrap_or_else(|| id.default_severity())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unused(binding: &str) -> Message {
        Message::BindingNotUsed {
            binding: binding.into(),
        }
    }

    #[test]
    fn codes_are_unique() {
        let codes: HashSet<&str> = DiagnosticId::ALL.iter().map(|id| id.code()).collect();
        assert_eq!(codes.len(), DiagnosticId::ALL.len());
    }

    #[test]
    fn id_names_round_trip() {
        for id in DiagnosticId::ALL {
            assert_eq!(DiagnosticId::from_name(&id.to_string()), Some(id));
        }
        assert_eq!(DiagnosticId::from_name("Nope"), None);
    }

    #[test]
    fn identical_reports_are_kept_once() {
        let mut sink = DiagnosticSink::new();
        sink.report(SourceLocation::new("a.cs", 1, 1), unused("A"));
        sink.report(SourceLocation::new("a.cs", 1, 1), unused("A"));
        sink.report(SourceLocation::new("a.cs", 2, 1), unused("A"));
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn hints_reclassify_warnings() {
        let mut sink = DiagnosticSink::new();
        sink.report(SourceLocation::default(), unused("A"));
        let mut hints = Hints::default();
        hints.set("Severity.WarningBindingNotUsed", "Hidden");
        assert!(sink.finish(&hints, Culture::En).is_empty());
    }

    #[test]
    fn errors_cannot_be_demoted() {
        let mut sink = DiagnosticSink::new();
        sink.report(
            SourceLocation::default(),
            Message::UnableToResolve {
                contract: "IService".into(),
                consumer: "Root".into(),
            },
        );
        let mut hints = Hints::default();
        hints.set("Severity.ErrorUnableToResolve", "Info");
        assert!(sink.has_errors(&hints));
        let diagnostics = sink.finish(&hints, Culture::En);
        assert_eq!(diagnostics[0].severity, Severity::Error);
    }

    #[test]
    fn not_implemented_contract_follows_its_hint() {
        let message = Message::NotImplementedContract {
            implementation: "Service".into(),
            contract: "IOther".into(),
        };
        let mut sink = DiagnosticSink::new();
        sink.report(SourceLocation::default(), message);
        let mut hints = Hints::default();
        hints.set("SeverityOfNotImplementedContract", "Warning");
        assert!(!sink.has_errors(&hints));
        let diagnostics = sink.finish(&hints, Culture::En);
        assert_eq!(diagnostics[0].severity, Severity::Warning);
    }

    #[test]
    fn culture_changes_message_not_id() {
        let build = || {
            let mut sink = DiagnosticSink::new();
            sink.report(SourceLocation::new("a.cs", 3, 7), unused("Dependency"));
            sink
        };
        let en = build().finish(&Hints::default(), Culture::En);
        let ru = build().finish(&Hints::default(), Culture::Ru);
        assert_eq!(en[0].id, ru[0].id);
        assert_eq!(en[0].location, ru[0].location);
        assert_ne!(en[0].message, ru[0].message);
    }
}
