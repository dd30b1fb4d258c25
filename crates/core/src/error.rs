use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExtractError>;

/// Every way an extraction can fail. Each variant carries the name of the
/// definition being located so callers can report it without extra context.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Could not locate source for {name}!")]
    LocationUnavailable { name: String },

    #[error("Could not read {} while locating {name}: {source}", path.display())]
    FileUnreadable {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse a complete definition of {name} starting at {}:{line}", path.display())]
    ParseNeverSucceeded { name: String, path: PathBuf, line: usize },

    #[error("Line {line} is out of range for {} ({line_count} lines) while locating {name}", path.display())]
    OutOfRangeLocation { name: String, path: PathBuf, line: usize, line_count: usize },

    #[error("Syntax oracle unavailable while locating {name}: {reason}")]
    OracleUnavailable { name: String, reason: String },
}

impl ExtractError {
    /// Name of the definition the failed extraction was looking for.
    pub fn name(&self) -> &str {
        match self {
            ExtractError::LocationUnavailable { name }
            | ExtractError::FileUnreadable { name, .. }
            | ExtractError::ParseNeverSucceeded { name, .. }
            | ExtractError::OutOfRangeLocation { name, .. }
            | ExtractError::OracleUnavailable { name, .. } => name,
        }
    }

    /// True for the failures that mean "the source could not be found", as
    /// opposed to the extractor itself being misconfigured.
    pub fn is_not_found(&self) -> bool {
        !matches!(self, ExtractError::OracleUnavailable { .. })
    }
}

/// Failure reported by a syntax oracle.
#[derive(Error, Debug)]
pub enum OracleError {
    /// The oracle cannot run at all (missing binary, broken grammar).
    #[error("{0}")]
    Unavailable(String),

    /// The oracle ran but could not produce an answer for this text.
    #[error("{0}")]
    Failed(String),
}

/// Problems with an explicitly requested configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config file {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not parse config file {}: {source}", path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Unknown oracle '{0}' (known oracles: {1})")]
    UnknownOracle(String, String),
}
