//! Extractor configuration and `.rbsource.toml` loading.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::oracle::ORACLE_NAMES;

pub const CONFIG_FILE_NAME: &str = ".rbsource.toml";

const KNOWN_CONFIG_KEYS: &[&str] = &["oracle", "ruby", "eager_calls"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractConfig {
    /// Name of the syntax oracle, see [`crate::oracle::create_oracle`].
    pub oracle: String,
    /// Interpreter used by the `ruby` oracle.
    pub ruby: PathBuf,
    /// Extra one-line declarative calls (beyond the `attr_*` family) whose
    /// definitions are probed eagerly, e.g. `delegate` or `scope`.
    pub eager_calls: Vec<String>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        ExtractConfig {
            oracle: "balance".to_string(),
            ruby: PathBuf::from("ruby"),
            eager_calls: Vec::new(),
        }
    }
}

/// Levenshtein distance over chars, kept in a single row.
fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == *cb { diagonal } else { 1 + diagonal.min(above).min(row[j]) };
            diagonal = above;
        }
    }
    row[b.len()]
}

/// Closest known key within three edits.
fn suggest_key(key: &str) -> Option<&'static str> {
    KNOWN_CONFIG_KEYS
        .iter()
        .map(|known| (edit_distance(key, known), *known))
        .min()
        .filter(|(distance, _)| *distance <= 3)
        .map(|(_, known)| known)
}

fn warn_unknown_keys(table: &toml::Table) {
    for key in table.keys().filter(|k| !KNOWN_CONFIG_KEYS.contains(&k.as_str())) {
        match suggest_key(key) {
            Some(suggestion) => warn!(
                key = key.as_str(),
                suggestion,
                "Unknown key in {CONFIG_FILE_NAME}, did you mean '{suggestion}'?"
            ),
            None => warn!(
                key = key.as_str(),
                "Unknown key in {CONFIG_FILE_NAME} (known keys: {})",
                KNOWN_CONFIG_KEYS.join(", ")
            ),
        }
    }
}

impl ExtractConfig {
    /// Merge values from a parsed table over `self`. An unknown oracle name is
    /// returned as an error; the caller decides whether that is fatal.
    fn apply(&mut self, table: &toml::Table) -> Result<(), ConfigError> {
        warn_unknown_keys(table);

        if let Some(ruby) = table.get("ruby").and_then(|v| v.as_str()) {
            self.ruby = PathBuf::from(ruby);
        }

        if let Some(calls) = table.get("eager_calls").and_then(|v| v.as_array()) {
            self.eager_calls =
                calls.iter().filter_map(|v| v.as_str().map(|s| s.to_string())).collect();
        }

        if let Some(oracle) = table.get("oracle").and_then(|v| v.as_str()) {
            if !ORACLE_NAMES.contains(&oracle) {
                return Err(ConfigError::UnknownOracle(oracle.to_string(), ORACLE_NAMES.join(", ")));
            }
            self.oracle = oracle.to_string();
        }

        Ok(())
    }
}

/// Load `.rbsource.toml` from `project_root`, falling back to defaults.
///
/// A missing file is silent. An unreadable or malformed file, or an unknown
/// oracle name, is reported with a warning and the affected values keep
/// their defaults.
pub fn load_config(project_root: &Path) -> ExtractConfig {
    let mut config = ExtractConfig::default();
    let path = project_root.join(CONFIG_FILE_NAME);
    if !path.exists() {
        return config;
    }

    debug!(path = %path.display(), "Loading config");
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) => {
            warn!(path = %path.display(), "Failed to read {CONFIG_FILE_NAME}: {e}");
            return config;
        }
    };
    match content.parse::<toml::Table>() {
        Ok(table) => {
            if let Err(e) = config.apply(&table) {
                warn!("{e}");
            }
        }
        Err(e) => warn!(path = %path.display(), "Failed to parse {CONFIG_FILE_NAME}: {e}"),
    }
    config
}

/// Load an explicitly named config file. Every problem is an error.
pub fn load_config_file(path: &Path) -> Result<ExtractConfig, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|source| ConfigError::Unreadable { path: path.to_path_buf(), source })?;
    let table = content
        .parse::<toml::Table>()
        .map_err(|source| ConfigError::Invalid { path: path.to_path_buf(), source })?;
    let mut config = ExtractConfig::default();
    config.apply(&table)?;
    Ok(config)
}
