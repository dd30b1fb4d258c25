//! Test harness for extraction integration tests.
//!
//! Copies a fixture directory of Ruby files into a temp dir and runs an
//! `Extractor` against it, so tests never touch the checked-in fixtures.

#![allow(dead_code)]

pub mod fixtures;

use rbsource_core::oracle::SyntaxOracle;
use rbsource_core::{ExtractConfig, Extractor, Result, SourceLocator};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct TestHarness {
    pub extractor: Extractor,
    temp_dir: TempDir,
}

impl TestHarness {
    /// Create a harness from a named fixture directory, using the default
    /// configuration (balance oracle).
    pub fn from_fixture(name: &str) -> Self {
        Self::from_fixture_with(name, ExtractConfig::default())
    }

    pub fn from_fixture_with(name: &str, config: ExtractConfig) -> Self {
        let extractor = Extractor::new(config).expect("Failed to build extractor");
        Self::build(name, extractor)
    }

    /// Same fixture, caller-supplied oracle.
    pub fn with_oracle(name: &str, oracle: Box<dyn SyntaxOracle>) -> Self {
        Self::build(name, Extractor::with_oracle(oracle, ExtractConfig::default()))
    }

    fn build(name: &str, extractor: Extractor) -> Self {
        let fixture_src = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name);
        assert!(fixture_src.exists(), "Fixture '{name}' not found at {}", fixture_src.display());

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        fixtures::copy_fixture_files(&fixture_src, temp_dir.path());

        TestHarness { extractor, temp_dir }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn path(&self, rel_path: &str) -> PathBuf {
        self.root().join(rel_path)
    }

    pub fn write(&self, rel_path: &str, contents: &str) {
        fixtures::write_file(self.root(), rel_path, contents);
    }

    pub fn locator(&self, rel_path: &str, line: usize) -> SourceLocator {
        SourceLocator::new(self.path(rel_path), line, format!("{rel_path}:{line}"))
    }

    pub fn source(&self, rel_path: &str, line: usize) -> Result<String> {
        self.extractor.source(&self.locator(rel_path, line))
    }

    pub fn comment(&self, rel_path: &str, line: usize) -> Result<String> {
        self.extractor.comment(&self.locator(rel_path, line))
    }

    /// Lines `first..=last` of a fixture file, verbatim.
    pub fn slice(&self, rel_path: &str, first: usize, last: usize) -> String {
        let text = std::fs::read_to_string(self.path(rel_path)).expect("Failed to read fixture");
        text.split_inclusive('\n').skip(first - 1).take(last - first + 1).collect()
    }
}
