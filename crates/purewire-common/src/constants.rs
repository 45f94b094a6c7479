//! System-wide constants.

/// Binary name for the CLI.
pub const BIN_NAME: &str = "pwire";

/// Default setup document read by the CLI.
pub const DEFAULT_SETUP_FILE: &str = "purewire.yaml";

/// Reserved tag word selecting a fresh synthetic tag per binding.
pub const UNIQUE_TAG: &str = "Unique";

/// Reserved tag word matching any requested tag.
pub const ANY_TAG: &str = "Any";

/// Prefix of the built-in generic marker names (`TT`, `TT1`, `TTList`, ...).
pub const MARKER_PREFIX: &str = "TT";

/// Contract types carrying the disposer capability.
pub const DISPOSER_TYPES: &[&str] = &[
    "IDisposable",
    "System.IDisposable",
    "IAsyncDisposable",
    "System.IAsyncDisposable",
];
