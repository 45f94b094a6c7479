//! Loads setup documents and runs the resolution engine over them.
//!
//! Wraps `purewire-resolve`'s [`Engine`] into a high-level API for SDK
//! consumers and the CLI.

use std::path::Path;

use serde::Deserialize;

use purewire_common::config::EngineConfig;
use purewire_common::error::{PurewireError, Result};
use purewire_resolve::model::Setup;
use purewire_resolve::{Engine, Report};

use crate::builder::SetupBuilder;

/// Encoding of a setup document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// YAML.
    Yaml,
    /// JSON.
    Json,
}

impl DocumentFormat {
    /// Picks the format from a file extension; anything but `json` is YAML.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

/// A document holds one setup, a list of setups, or a `setups` table.
#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    Table { setups: Vec<Setup> },
    Many(Vec<Setup>),
    One(Box<Setup>),
}

impl Document {
    fn into_setups(self) -> Vec<Setup> {
        match self {
            Self::Table { setups } | Self::Many(setups) => setups,
            Self::One(setup) => vec![*setup],
        }
    }
}

/// Accumulates setups, then resolves them in one run.
#[derive(Debug)]
pub struct Composer {
    engine: Engine,
    setups: Vec<Setup>,
}

impl Composer {
    /// Creates a composer with the given engine configuration.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            engine: Engine::new(config),
            setups: Vec::new(),
        }
    }

    /// Adds a setup.
    pub fn add_setup(&mut self, setup: Setup) -> &mut Self {
        self.setups.push(setup);
        self
    }

    /// Builds and adds a setup.
    ///
    /// # Errors
    ///
    /// Returns an error if the builder holds a malformed type expression.
    pub fn add(&mut self, builder: SetupBuilder) -> Result<&mut Self> {
        let setup = builder.build()?;
        Ok(self.add_setup(setup))
    }

    /// Loads every setup of a document file.
    ///
    /// Bindings without a source file are attributed to the document.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid document.
    pub fn load(&mut self, path: &Path) -> Result<&mut Self> {
        tracing::info!(path = %path.display(), "loading setup document");
        let content = std::fs::read_to_string(path).map_err(|e| PurewireError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut setups = parse_document(&content, DocumentFormat::from_path(path))?;
        let file = path.display().to_string();
        for setup in &mut setups {
            attribute(setup, &file);
        }
        tracing::debug!(count = setups.len(), "setups loaded");
        self.setups.extend(setups);
        Ok(self)
    }

    /// Loads every setup of an in-memory document.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not a valid document.
    pub fn load_str(&mut self, content: &str, format: DocumentFormat) -> Result<&mut Self> {
        let setups = parse_document(content, format)?;
        self.setups.extend(setups);
        Ok(self)
    }

    /// Setups accumulated so far, in declaration order.
    #[must_use]
    pub fn setups(&self) -> &[Setup] {
        &self.setups
    }

    /// The engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        self.engine.config()
    }

    /// Resolves every composition.
    #[must_use]
    pub fn compose(&self) -> Report {
        self.engine.run(&self.setups)
    }
}

impl Default for Composer {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

fn parse_document(content: &str, format: DocumentFormat) -> Result<Vec<Setup>> {
    let document: Document = match format {
        DocumentFormat::Yaml => serde_yaml::from_str(content)?,
        DocumentFormat::Json => serde_json::from_str(content)?,
    };
    Ok(document.into_setups())
}

fn attribute(setup: &mut Setup, file: &str) {
    let locations = std::iter::once(&mut setup.location)
        .chain(setup.bindings.iter_mut().map(|b| &mut b.location))
        .chain(setup.roots.iter_mut().map(|r| &mut r.location));
    for location in locations.filter(|l| l.is_unknown() && l.line > 0) {
        location.file = file.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r"
- name: Base
  bindings:
    - contracts: [{ type: int }]
      recipe: { factory: { expression: '1' } }
- name: Composition
  depends_on: [Base]
  roots:
    - { name: Value, type: int }
";

    #[test]
    fn loads_a_list_of_setups() {
        let mut composer = Composer::default();
        let _ = composer
            .load_str(DOCUMENT, DocumentFormat::Yaml)
            .expect("valid document");
        assert_eq!(composer.setups().len(), 2);
        let report = composer.compose();
        assert!(!report.has_errors());
        assert!(
            report
                .composition("Composition")
                .and_then(|c| c.plan("Value"))
                .is_some()
        );
    }

    #[test]
    fn loads_a_single_json_setup() {
        let mut composer = Composer::default();
        let _ = composer
            .load_str(
                r#"{ "name": "Composition", "roots": [{ "name": "Text", "type": "string" }] }"#,
                DocumentFormat::Json,
            )
            .expect("valid document");
        assert_eq!(composer.setups()[0].name, "Composition");
    }

    #[test]
    fn malformed_type_is_rejected() {
        let mut composer = Composer::default();
        let result = composer.load_str(
            "name: Composition\nroots:\n  - { name: Broken, type: 'List<' }\n",
            DocumentFormat::Yaml,
        );
        assert!(result.is_err());
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(
            DocumentFormat::from_path(Path::new("setup.JSON")),
            DocumentFormat::Json
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("setup.yml")),
            DocumentFormat::Yaml
        );
    }
}
