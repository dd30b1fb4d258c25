//! Out-of-process oracle: pipes the candidate text into `ruby -c`.
//!
//! Running the real parser in a child process keeps its diagnostics isolated
//! by construction; stderr is captured and handed to the caller's sink.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::SyntaxOracle;
use crate::error::OracleError;

pub struct RubyOracle {
    ruby: PathBuf,
}

impl RubyOracle {
    pub fn new(ruby: &Path) -> Self {
        RubyOracle { ruby: ruby.to_path_buf() }
    }
}

impl SyntaxOracle for RubyOracle {
    fn check(&self, text: &str, diagnostics: &mut dyn Write) -> Result<bool, OracleError> {
        let mut child = Command::new(&self.ruby)
            .args(["-c", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                OracleError::Unavailable(format!("could not run {}: {e}", self.ruby.display()))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .map_err(|e| OracleError::Failed(format!("writing to ruby -c: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| OracleError::Failed(format!("waiting for ruby -c: {e}")))?;

        diagnostics
            .write_all(&output.stderr)
            .map_err(|e| OracleError::Failed(e.to_string()))?;

        Ok(output.status.success())
    }

    fn name(&self) -> &str {
        "ruby"
    }
}
