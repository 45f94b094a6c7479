//! Unified error types for the purewire workspace.
//!
//! Problems in the dependency-injection model itself (missing bindings,
//! cycles, lifetime defects) are reported as diagnostics, not as errors.
//! This enum covers everything that prevents the engine from reading its
//! input in the first place.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum PurewireError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// A type expression could not be parsed.
    #[error("invalid type expression \"{input}\" at offset {offset}: {message}")]
    TypeSyntax {
        /// The full type expression.
        input: String,
        /// Byte offset where parsing stopped.
        offset: usize,
        /// What the parser expected.
        message: String,
    },

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },

    /// A YAML document could not be read.
    #[error("YAML error: {source}")]
    Yaml {
        /// Underlying YAML error.
        #[from]
        source: serde_yaml::Error,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, PurewireError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_syntax_message_names_offset() {
        let err = PurewireError::TypeSyntax {
            input: "List<".into(),
            offset: 5,
            message: "expected type".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("offset 5"), "got: {msg}");
        assert!(msg.contains("List<"), "got: {msg}");
    }

    #[test]
    fn json_errors_convert() {
        let source = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: PurewireError = source.into();
        assert!(err.to_string().starts_with("serialization error"));
    }
}
