//! Core types shared across rbsource: where a definition lives, how a host
//! reports it, and the record handed back to callers.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::{ExtractError, Result};

// ---------------------------------------------------------------------------
// Host reflection
// ---------------------------------------------------------------------------

/// Anything that can say where its definition starts: a method handle, a
/// proc, a stack frame. Mirrors what a Ruby `source_location` reports.
pub trait LocateSource {
    /// File and 1-based line of the definition, or `None` when the host has
    /// no location (native methods, `eval` without a file).
    fn source_location(&self) -> Option<(PathBuf, usize)>;

    /// Display name used in error messages, e.g. `Foo#bar`.
    fn name(&self) -> String;
}

// ---------------------------------------------------------------------------
// Locator
// ---------------------------------------------------------------------------

/// Where to start looking: file, 1-based line, and the name being located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocator {
    pub file_path: PathBuf,
    pub start_line: usize,
    pub name: String,
}

impl SourceLocator {
    pub fn new(file_path: impl Into<PathBuf>, start_line: usize, name: impl Into<String>) -> Self {
        SourceLocator { file_path: file_path.into(), start_line, name: name.into() }
    }

    /// Ask a host object for its location.
    pub fn resolve(target: &(impl LocateSource + ?Sized)) -> Result<Self> {
        let name = target.name();
        match target.source_location() {
            Some((file_path, start_line)) => Ok(SourceLocator { file_path, start_line, name }),
            None => Err(ExtractError::LocationUnavailable { name }),
        }
    }

    /// Parse `path:line`. The name defaults to the same text. Splits on the
    /// last `:` so paths containing colons still work.
    pub fn parse(text: &str) -> Option<Self> {
        let (path, line) = text.trim().rsplit_once(':')?;
        let line: usize = line.parse().ok()?;
        if path.is_empty() {
            return None;
        }
        Some(SourceLocator::new(path, line, text.trim()))
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

impl LocateSource for SourceLocator {
    fn source_location(&self) -> Option<(PathBuf, usize)> {
        Some((self.file_path.clone(), self.start_line))
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A definition's leading comment and verbatim source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Extraction {
    pub name: String,
    pub file: PathBuf,
    pub line: usize,
    /// Empty when nothing but code or a blank line sits above the definition.
    pub comment: String,
    pub source: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Native;

    impl LocateSource for Native {
        fn source_location(&self) -> Option<(PathBuf, usize)> {
            None
        }
        fn name(&self) -> String {
            "Kernel#puts".to_string()
        }
    }

    #[test]
    fn parse_path_and_line() {
        let loc = SourceLocator::parse("lib/foo.rb:12").unwrap();
        assert_eq!(loc.file_path, PathBuf::from("lib/foo.rb"));
        assert_eq!(loc.start_line, 12);
        assert_eq!(loc.name, "lib/foo.rb:12");

        let windows = SourceLocator::parse("C:\\src\\foo.rb:3").unwrap();
        assert_eq!(windows.file_path, PathBuf::from("C:\\src\\foo.rb"));
        assert_eq!(windows.start_line, 3);
    }

    #[test]
    fn parse_rejects_malformed_locations() {
        assert!(SourceLocator::parse("lib/foo.rb").is_none());
        assert!(SourceLocator::parse("lib/foo.rb:abc").is_none());
        assert!(SourceLocator::parse(":12").is_none());
    }

    #[test]
    fn resolve_without_location_fails_with_name() {
        let err = SourceLocator::resolve(&Native).unwrap_err();
        assert!(matches!(err, ExtractError::LocationUnavailable { ref name } if name == "Kernel#puts"));
        assert_eq!(err.to_string(), "Could not locate source for Kernel#puts!");
    }

    #[test]
    fn locator_resolves_to_itself() {
        let loc = SourceLocator::new("a.rb", 4, "A#b");
        assert_eq!(SourceLocator::resolve(&loc).unwrap(), loc);
    }

    #[test]
    fn extraction_serializes_all_fields() {
        let record = Extraction {
            name: "A#b".to_string(),
            file: PathBuf::from("a.rb"),
            line: 4,
            comment: "# hi\n".to_string(),
            source: "def b; end\n".to_string(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["name"], "A#b");
        assert_eq!(json["line"], 4);
        assert_eq!(json["comment"], "# hi\n");
        assert_eq!(json["source"], "def b; end\n");
    }
}
