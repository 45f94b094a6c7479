//! Domain primitive types used across the purewire workspace.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Position of a declaration in the front-end source that produced it.
///
/// The core never reads source files; locations are carried through
/// unchanged so diagnostics point back at the declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Source file path, empty when unknown.
    #[serde(default)]
    pub file: String,
    /// One-based line number, zero when unknown.
    #[serde(default)]
    pub line: u32,
    /// One-based column number, zero when unknown.
    #[serde(default)]
    pub column: u32,
}

impl SourceLocation {
    /// Creates a location from its parts.
    #[must_use]
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// Returns `true` when no file was recorded.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.file.is_empty()
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            write!(f, "<unknown>")
        } else {
            write!(f, "{}:{}:{}", self.file, self.line, self.column)
        }
    }
}

/// Locale used to render diagnostic messages.
///
/// Diagnostic ids and locations do not depend on the culture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Culture {
    /// English.
    #[default]
    En,
    /// Russian.
    Ru,
}

impl Culture {
    /// Parses a culture name, falling back to English for unknown names.
    ///
    /// Region suffixes are ignored, so `ru-RU` selects Russian.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }
}

impl FromStr for Culture {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let language = s.split(['-', '_']).next().unwrap_or_default();
        match language.to_ascii_lowercase().as_str() {
            "en" => Ok(Self::En),
            "ru" => Ok(Self::Ru),
            other => Err(format!("unsupported culture: {other}")),
        }
    }
}

impl fmt::Display for Culture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::En => write!(f, "en"),
            Self::Ru => write!(f, "ru"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_location_displays_placeholder() {
        assert_eq!(SourceLocation::default().to_string(), "<unknown>");
    }

    #[test]
    fn location_displays_file_line_column() {
        let loc = SourceLocation::new("Composition.cs", 12, 5);
        assert_eq!(loc.to_string(), "Composition.cs:12:5");
    }

    #[test]
    fn culture_ignores_region() {
        assert_eq!(Culture::from_name("ru-RU"), Culture::Ru);
        assert_eq!(Culture::from_name("EN_us"), Culture::En);
    }

    #[test]
    fn unknown_culture_falls_back_to_english() {
        assert_eq!(Culture::from_name("fr"), Culture::En);
        assert!("fr".parse::<Culture>().is_err());
    }
}
