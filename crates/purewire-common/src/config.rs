//! Engine configuration model.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PurewireError, Result};
use crate::types::Culture;

/// How the resolver synthesizes a binding for a well-known type shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeStrategy {
    /// Eagerly aggregate every binding of the element type, in declaration order.
    EagerAggregate,
    /// Deferred provider invoked by the caller, fresh resolution on each call.
    Func,
    /// Deferred provider memoized on first access.
    Lazy,
    /// Deferred provider re-invoked once per thread.
    ThreadLocal,
    /// Synchronous resolution wrapped in an already-completed future.
    Completed,
    /// Eager aggregate of independently resolved per-slot contracts.
    Tuple,
}

/// Registration of an extra virtual shape on top of the built-in registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeRegistration {
    /// Generic type name, e.g. `IReadOnlyList` or `System.Collections.Generic.HashSet`.
    pub name: String,
    /// Required number of type arguments; `None` accepts any arity.
    #[serde(default)]
    pub arity: Option<usize>,
    /// Synthesis strategy for matching requests.
    pub strategy: ShapeStrategy,
}

/// Root configuration for a resolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Locale for diagnostic messages.
    pub culture: Culture,
    /// Caller hints, applied below every setup's own hints.
    pub hints: BTreeMap<String, String>,
    /// Whether independent compositions are processed in parallel.
    pub parallel: bool,
    /// Extra virtual shapes registered on top of the built-in ones.
    pub collection_shapes: Vec<ShapeRegistration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            culture: Culture::default(),
            hints: BTreeMap::new(),
            parallel: true,
            collection_shapes: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Loads a configuration file, choosing YAML or JSON by extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not match the model.
    pub fn load(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "loading engine configuration");
        let content = std::fs::read_to_string(path).map_err(|e| PurewireError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
        if is_yaml {
            Ok(serde_yaml::from_str(&content)?)
        } else {
            Ok(serde_json::from_str(&content)?)
        }
    }

    /// Sets a caller hint, replacing any previous value for the key.
    pub fn set_hint(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let _ = self.hints.insert(key.into(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn default_config_is_parallel_english() {
        let config = EngineConfig::default();
        assert!(config.parallel);
        assert_eq!(config.culture, Culture::En);
        assert!(config.hints.is_empty());
    }

    #[test]
    fn load_yaml_config() {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .expect("tempfile");
        writeln!(
            file,
            "culture: ru\nparallel: false\nhints:\n  Resolve: \"Off\"\ncollection_shapes:\n  - name: IMyBag\n    arity: 1\n    strategy: eager_aggregate"
        )
        .expect("write");

        let config = EngineConfig::load(file.path()).expect("should load");
        assert_eq!(config.culture, Culture::Ru);
        assert!(!config.parallel);
        assert_eq!(config.hints.get("Resolve").map(String::as_str), Some("Off"));
        assert_eq!(config.collection_shapes.len(), 1);
        assert_eq!(
            config.collection_shapes[0].strategy,
            ShapeStrategy::EagerAggregate
        );
    }

    #[test]
    fn load_json_config_with_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".json")
            .tempfile()
            .expect("tempfile");
        write!(file, "{{\"hints\": {{\"ThreadSafe\": \"Off\"}}}}").expect("write");

        let config = EngineConfig::load(file.path()).expect("should load");
        assert!(config.parallel);
        assert_eq!(config.hints.len(), 1);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = EngineConfig::load(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, PurewireError::Io { .. }));
    }
}
