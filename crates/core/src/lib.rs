//! rbsource — recover the verbatim source of a Ruby definition from a file
//! path and a starting line, together with the comment block above it.
//!
//! There is no syntax tree to consult. The scanner grows a window of lines
//! from the start line and asks a syntax oracle whether the window is a
//! complete program yet; the first window the oracle accepts is the answer.
//!
//! # Modules
//!
//! - [`lines`] — Line-addressable file buffer
//! - [`mask`] — Interpolation masking for probe text
//! - [`lexical`] — Heredoc, percent-literal and `def` shape detection
//! - [`scanner`] — Incremental boundary scanner
//! - [`oracle`] — Pluggable syntax oracles and the quiet probe adapter
//! - [`comment`] — Leading comment assembly
//! - [`config`] — `.rbsource.toml` loading
//! - [`types`] — Locators, the host reflection trait, result records
//! - [`error`] — Typed failures

pub mod comment;
pub mod config;
pub mod error;
pub mod lexical;
pub mod lines;
pub mod mask;
pub mod oracle;
pub mod scanner;
pub mod types;

use std::io::Write;
use std::sync::LazyLock;

use rayon::prelude::*;
use tracing::debug;

pub use config::{load_config, load_config_file, ExtractConfig};
pub use error::{ConfigError, ExtractError, OracleError, Result};
pub use types::{Extraction, LocateSource, SourceLocator};

use lines::SourceFile;
use oracle::{create_oracle, BalanceOracle, Probe, SyntaxOracle};
use scanner::ScanOutcome;

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// Configured entry point: owns the oracle and the scan settings.
pub struct Extractor {
    probe: Probe,
    config: ExtractConfig,
}

impl Extractor {
    /// Build an extractor with the oracle named in `config`.
    pub fn new(config: ExtractConfig) -> std::result::Result<Self, ConfigError> {
        let oracle = create_oracle(&config.oracle, &config.ruby)?;
        Ok(Self::with_oracle(oracle, config))
    }

    /// Build an extractor around a caller-supplied oracle. `config.oracle` is
    /// not consulted.
    pub fn with_oracle(oracle: Box<dyn SyntaxOracle>, config: ExtractConfig) -> Self {
        Extractor { probe: Probe::new(oracle), config }
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    pub fn oracle_name(&self) -> &str {
        self.probe.oracle_name()
    }

    fn open(&self, locator: &SourceLocator) -> Result<SourceFile> {
        let file = SourceFile::open(&locator.file_path).map_err(|source| ExtractError::FileUnreadable {
            name: locator.name.clone(),
            path: locator.file_path.clone(),
            source,
        })?;
        if locator.start_line == 0 || locator.start_line > file.line_count() {
            return Err(ExtractError::OutOfRangeLocation {
                name: locator.name.clone(),
                path: locator.file_path.clone(),
                line: locator.start_line,
                line_count: file.line_count(),
            });
        }
        Ok(file)
    }

    /// Verbatim text of the definition starting at the locator's line.
    pub fn source(&self, locator: &SourceLocator) -> Result<String> {
        self.source_in(&self.open(locator)?, locator)
    }

    /// Whole-line comments directly above the locator's line, or `""`.
    pub fn comment(&self, locator: &SourceLocator) -> Result<String> {
        Ok(comment::leading_comment(&self.open(locator)?, locator.start_line))
    }

    /// Leading comment followed by the source.
    pub fn comment_and_source(&self, locator: &SourceLocator) -> Result<String> {
        let record = self.extract(locator)?;
        Ok(record.comment + &record.source)
    }

    pub fn extract(&self, locator: &SourceLocator) -> Result<Extraction> {
        self.extract_in(&self.open(locator)?, locator)
    }

    /// Comment and source read from one loaded copy of the file.
    fn extract_in(&self, file: &SourceFile, locator: &SourceLocator) -> Result<Extraction> {
        Ok(Extraction {
            name: locator.name.clone(),
            file: locator.file_path.clone(),
            line: locator.start_line,
            comment: comment::leading_comment(file, locator.start_line),
            source: self.source_in(file, locator)?,
        })
    }

    fn source_in(&self, file: &SourceFile, locator: &SourceLocator) -> Result<String> {
        let outcome = scanner::scan(file, locator.start_line, &self.probe, &self.config.eager_calls)
            .map_err(|e| ExtractError::OracleUnavailable {
                name: locator.name.clone(),
                reason: e.to_string(),
            })?;

        match outcome {
            ScanOutcome::Found { source, lines, probes } => {
                debug!(
                    name = locator.name.as_str(),
                    line = locator.start_line,
                    lines,
                    probes,
                    "Extracted source"
                );
                Ok(source)
            }
            ScanOutcome::Exhausted { probes } => {
                debug!(name = locator.name.as_str(), line = locator.start_line, probes, "Source not found");
                Err(ExtractError::ParseNeverSucceeded {
                    name: locator.name.clone(),
                    path: locator.file_path.clone(),
                    line: locator.start_line,
                })
            }
        }
    }

    /// Extract many definitions on the rayon pool. Results keep input order.
    pub fn source_many(&self, locators: &[SourceLocator]) -> Vec<Result<String>> {
        locators.par_iter().map(|locator| self.source(locator)).collect()
    }

    /// Run the oracle on arbitrary text, diagnostics included.
    pub fn check(&self, text: &str, diagnostics: &mut dyn Write) -> std::result::Result<bool, OracleError> {
        self.probe.check_verbose(text, diagnostics)
    }
}

// ---------------------------------------------------------------------------
// Default extractor
// ---------------------------------------------------------------------------

static DEFAULT_EXTRACTOR: LazyLock<Extractor> =
    LazyLock::new(|| Extractor::with_oracle(Box::new(BalanceOracle), ExtractConfig::default()));

/// Source of `target`'s definition, using the built-in balance oracle.
pub fn source_for(target: &(impl LocateSource + ?Sized)) -> Result<String> {
    DEFAULT_EXTRACTOR.source(&SourceLocator::resolve(target)?)
}

/// Leading comment of `target`'s definition; `""` when there is none.
pub fn comment_for(target: &(impl LocateSource + ?Sized)) -> Result<String> {
    DEFAULT_EXTRACTOR.comment(&SourceLocator::resolve(target)?)
}

pub fn comment_and_source_for(target: &(impl LocateSource + ?Sized)) -> Result<String> {
    DEFAULT_EXTRACTOR.comment_and_source(&SourceLocator::resolve(target)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_rb(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("sample.rb");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn method_and_empty_comment() {
        let dir = TempDir::new().unwrap();
        let path = write_rb(&dir, "class X\n  def bar\n    1 + 1\n  end\nend\n");
        let loc = SourceLocator::new(&path, 2, "X#bar");
        let extractor = Extractor::new(ExtractConfig::default()).unwrap();
        assert_eq!(extractor.source(&loc).unwrap(), "  def bar\n    1 + 1\n  end\n");
        assert_eq!(extractor.comment(&loc).unwrap(), "");
    }

    #[test]
    fn comment_and_source_concatenate() {
        let dir = TempDir::new().unwrap();
        let path = write_rb(&dir, "# Adds.\n# Twice.\ndef add(a, b)\n  a + b\nend\n");
        let loc = SourceLocator::new(&path, 3, "add");
        assert_eq!(
            comment_and_source_for(&loc).unwrap(),
            "# Adds.\n# Twice.\ndef add(a, b)\n  a + b\nend\n"
        );
        let record = DEFAULT_EXTRACTOR.extract(&loc).unwrap();
        assert_eq!(record.comment, "# Adds.\n# Twice.\n");
        assert_eq!(record.source, "def add(a, b)\n  a + b\nend\n");
        assert_eq!(record.line, 3);
    }

    #[test]
    fn extract_reads_the_file_once() {
        let dir = TempDir::new().unwrap();
        let path = write_rb(&dir, "# Greets.\ndef hi\n  :hi\nend\n");
        let loc = SourceLocator::new(&path, 2, "hi");
        let file = DEFAULT_EXTRACTOR.open(&loc).unwrap();
        std::fs::remove_file(&path).unwrap();

        let record = DEFAULT_EXTRACTOR.extract_in(&file, &loc).unwrap();
        assert_eq!(record.comment, "# Greets.\n");
        assert_eq!(record.source, "def hi\n  :hi\nend\n");
        assert!(matches!(DEFAULT_EXTRACTOR.extract(&loc), Err(ExtractError::FileUnreadable { .. })));
    }

    #[test]
    fn out_of_range_lines() {
        let dir = TempDir::new().unwrap();
        let path = write_rb(&dir, "def x; end\n");
        for line in [0, 2] {
            let err = source_for(&SourceLocator::new(&path, line, "x")).unwrap_err();
            assert!(
                matches!(err, ExtractError::OutOfRangeLocation { line_count: 1, .. }),
                "line {line}: {err}"
            );
        }
    }

    #[test]
    fn missing_file_is_unreadable() {
        let dir = TempDir::new().unwrap();
        let loc = SourceLocator::new(dir.path().join("gone.rb"), 1, "Gone#x");
        let err = comment_for(&loc).unwrap_err();
        assert!(matches!(err, ExtractError::FileUnreadable { .. }));
        assert!(err.is_not_found());
        assert_eq!(err.name(), "Gone#x");
    }

    #[test]
    fn unterminated_definition_never_parses() {
        let dir = TempDir::new().unwrap();
        let path = write_rb(&dir, "def x\n  1\n");
        let err = source_for(&SourceLocator::new(&path, 1, "x")).unwrap_err();
        assert!(matches!(err, ExtractError::ParseNeverSucceeded { line: 1, .. }));
    }

    #[test]
    fn unavailable_oracle_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = write_rb(&dir, "def x\n  1\nend\n");
        let config = ExtractConfig {
            oracle: "ruby".to_string(),
            ruby: PathBuf::from("/nonexistent/bin/ruby-for-rbsource-tests"),
            ..ExtractConfig::default()
        };
        let extractor = Extractor::new(config).unwrap();
        let err = extractor.source(&SourceLocator::new(&path, 1, "x")).unwrap_err();
        assert!(matches!(err, ExtractError::OracleUnavailable { .. }));
        assert!(!err.is_not_found());
    }

    #[test]
    fn batch_keeps_order() {
        let dir = TempDir::new().unwrap();
        let path = write_rb(&dir, "def a\n  1\nend\n\ndef b; 2; end\n");
        let locators = vec![
            SourceLocator::new(&path, 5, "b"),
            SourceLocator::new(&path, 1, "a"),
            SourceLocator::new(&path, 9, "missing"),
        ];
        let results = DEFAULT_EXTRACTOR.source_many(&locators);
        assert_eq!(results[0].as_deref().unwrap(), "def b; 2; end\n");
        assert_eq!(results[1].as_deref().unwrap(), "def a\n  1\nend\n");
        assert!(results[2].is_err());
    }

    #[test]
    fn check_reports_diagnostics() {
        let mut out = Vec::new();
        assert!(!DEFAULT_EXTRACTOR.check("def x\n", &mut out).unwrap());
        assert!(String::from_utf8(out).unwrap().starts_with("-:"));
    }
}
