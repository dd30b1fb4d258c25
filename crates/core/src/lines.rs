//! Line-addressable view of a source file.
//!
//! The whole file is held in one buffer with a table of line start offsets, so
//! any line can be sliced out without copying. Lines keep their terminators
//! (`\n` or `\r\n`) because extracted text must match the file byte for byte.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub struct SourceFile {
    path: PathBuf,
    text: String,
    /// Byte offset of the first character of each line.
    line_starts: Vec<usize>,
}

impl SourceFile {
    /// Read a file into memory. Non-UTF-8 content is reported as `InvalidData`.
    pub fn open(path: &Path) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        let text =
            String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(Self::from_text(path, text))
    }

    pub fn from_text(path: impl Into<PathBuf>, text: String) -> Self {
        let mut line_starts = Vec::new();
        if !text.is_empty() {
            line_starts.push(0);
            for (i, b) in text.bytes().enumerate() {
                if b == b'\n' && i + 1 < text.len() {
                    line_starts.push(i + 1);
                }
            }
        }
        SourceFile { path: path.into(), text, line_starts }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// 1-based line lookup, terminator included.
    pub fn line(&self, number: usize) -> Option<&str> {
        if number == 0 || number > self.line_starts.len() {
            return None;
        }
        let start = self.line_starts[number - 1];
        let end = self.line_starts.get(number).copied().unwrap_or(self.text.len());
        Some(&self.text[start..end])
    }

    /// Lines `start..=line_count`, in file order.
    pub fn forward_from(&self, start: usize) -> impl Iterator<Item = (usize, &str)> + '_ {
        (start.max(1)..=self.line_count()).filter_map(move |n| self.line(n).map(|l| (n, l)))
    }

    /// Lines `start - 1` down to 1.
    pub fn backward_from(&self, start: usize) -> impl Iterator<Item = (usize, &str)> + '_ {
        (1..start.min(self.line_count() + 1))
            .rev()
            .filter_map(move |n| self.line(n).map(|l| (n, l)))
    }
}

/// Split a raw line into its content and its terminator.
pub fn split_terminator(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

pub fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Width of the leading run of spaces and tabs. Tabs count as one column.
pub fn indent_width(line: &str) -> usize {
    line.chars().take_while(|c| *c == ' ' || *c == '\t').count()
}
