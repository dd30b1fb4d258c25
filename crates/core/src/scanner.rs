//! Incremental boundary scanner.
//!
//! Grows two buffers line by line from a definition's first line: the display
//! buffer holds the verbatim text, the probe buffer holds a masked copy that is
//! safe to hand to the syntax oracle. Cheap line heuristics decide *when* to
//! ask the oracle; the oracle alone decides whether the window is complete.

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::comment::is_whole_line_comment;
use crate::error::OracleError;
use crate::lexical::{
    contains_end_keyword, heredoc_openers, is_ident_char, is_one_line_def, unclosed_percent_literal,
    HeredocTag,
};
use crate::lines::{indent_width, is_blank, SourceFile};
use crate::mask::{mask, placeholder_line};
use crate::oracle::Probe;

/// Declarative calls whose whole definition fits on the call line.
pub const ACCESSOR_CALLS: &[&str] = &["attr_reader", "attr_writer", "attr_accessor"];

#[derive(Debug, PartialEq)]
pub enum ScanOutcome {
    /// A probe accepted the window; `source` is the verbatim text.
    Found { source: String, lines: usize, probes: usize },
    /// The file ran out before any probe succeeded.
    Exhausted { probes: usize },
}

#[derive(Debug, Default)]
struct ScanState {
    seen_definition_header: bool,
    parse_eagerly: bool,
    dangling: Option<DanglingLiteral>,
    definition_indent: usize,
}

// ---------------------------------------------------------------------------
// Dangling literals
// ---------------------------------------------------------------------------

/// A multi-line literal opened on an earlier line and not closed yet.
#[derive(Debug, Clone, PartialEq)]
enum DanglingLiteral {
    Percent { open: char, close: char, depth: usize },
    /// Pending heredocs, closed front to back.
    Heredoc(VecDeque<HeredocTag>),
}

/// What a line inside a dangling literal means for the probe buffer.
#[derive(Debug, PartialEq)]
enum Feed {
    /// Literal content: replaced by a placeholder line.
    Hidden,
    /// Terminator of one heredoc while others are still pending.
    Visible,
    /// The literal ends on this line; code resumes at this byte offset.
    Closed(usize),
}

impl DanglingLiteral {
    /// Literal left open at the end of a masked line, if any.
    fn opened_by(masked: &str) -> Option<Self> {
        let heredocs = heredoc_openers(masked);
        if !heredocs.is_empty() {
            return Some(DanglingLiteral::Heredoc(heredocs.into()));
        }
        unclosed_percent_literal(masked)
            .map(|(open, close, depth)| DanglingLiteral::Percent { open, close, depth })
    }

    fn feed(&mut self, masked: &str) -> Feed {
        match self {
            DanglingLiteral::Percent { open, close, depth } => {
                let mut escaped = false;
                for (at, c) in masked.char_indices() {
                    if escaped {
                        escaped = false;
                        continue;
                    }
                    if c == '\\' {
                        escaped = true;
                    } else if c == *open {
                        *depth += 1;
                    } else if c == *close {
                        *depth -= 1;
                        if *depth == 0 {
                            return Feed::Closed(at + c.len_utf8());
                        }
                    }
                }
                Feed::Hidden
            }
            DanglingLiteral::Heredoc(pending) => {
                if !pending.front().is_some_and(|tag| tag.closes(masked)) {
                    return Feed::Hidden;
                }
                pending.pop_front();
                if pending.is_empty() {
                    Feed::Closed(masked.len())
                } else {
                    Feed::Visible
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Header classification
// ---------------------------------------------------------------------------

fn calls_any(line: &str, names: impl IntoIterator<Item = impl AsRef<str>>) -> bool {
    names.into_iter().any(|name| {
        let name = name.as_ref();
        !name.is_empty()
            && line.match_indices(name).any(|(at, _)| {
                let before = line[..at].chars().next_back();
                let after = line[at + name.len()..].chars().next();
                !before.is_some_and(|c| is_ident_char(c) || c == '.' || c == ':')
                    && !after.is_some_and(is_ident_char)
            })
    })
}

/// `{` ... `}` opened and closed on the same masked line.
fn closes_brace_block(masked: &str) -> bool {
    let mut depth = 0i32;
    let mut opened = false;
    for c in masked.chars() {
        match c {
            '{' => {
                depth += 1;
                opened = true;
            }
            '}' => depth -= 1,
            _ => {}
        }
    }
    opened && depth == 0
}

/// The header already looks like a complete one-line construct.
fn is_eager_header(line: &str, eager_calls: &[String]) -> bool {
    let masked = mask(line);
    calls_any(&masked, ACCESSOR_CALLS)
        || calls_any(&masked, eager_calls)
        || is_one_line_def(line)
        || closes_brace_block(&masked)
}

// ---------------------------------------------------------------------------
// Scan
// ---------------------------------------------------------------------------

/// Scan forward from `start_line` until the oracle accepts the accumulated
/// window. Leading blank lines are skipped and never returned.
pub fn scan(
    file: &SourceFile,
    start_line: usize,
    probe: &Probe,
    eager_calls: &[String],
) -> Result<ScanOutcome, OracleError> {
    let mut state = ScanState::default();
    let mut display = String::new();
    let mut candidate = String::new();
    let mut lines = 0;
    let mut probes = 0;

    for (number, line) in file.forward_from(start_line) {
        let is_header = !state.seen_definition_header;
        if is_header {
            if is_blank(line) {
                continue;
            }
            state.seen_definition_header = true;
            state.definition_indent = indent_width(line);
            state.parse_eagerly = is_eager_header(line, eager_calls);
            trace!(line = number, eager = state.parse_eagerly, "Definition header");
        }

        display.push_str(line);
        lines += 1;

        // Inside an open literal a `#` line is literal content and may hold the closer.
        if state.dangling.is_none() && is_whole_line_comment(line) {
            candidate.push_str(line);
            continue;
        }

        let masked = mask(line);
        match state.dangling.as_mut().map(|literal| literal.feed(&masked)) {
            Some(Feed::Hidden) => {
                candidate.push_str(&placeholder_line(line));
                continue;
            }
            Some(Feed::Visible) => {
                candidate.push_str(&masked);
                continue;
            }
            Some(Feed::Closed(offset)) => {
                state.dangling = DanglingLiteral::opened_by(&masked[offset..]);
            }
            None => state.dangling = DanglingLiteral::opened_by(&masked),
        }
        candidate.push_str(&masked);

        let dedented = !is_header && !is_blank(line) && indent_width(line) <= state.definition_indent;
        if !(state.parse_eagerly || contains_end_keyword(&masked) || dedented) {
            continue;
        }

        probes += 1;
        if probe.is_valid(&candidate)? {
            debug_assert_eq!(display.lines().count(), candidate.lines().count());
            return Ok(ScanOutcome::Found { source: display, lines, probes });
        }
    }

    debug!(path = %file.path().display(), start_line, probes, "No complete definition before EOF");
    Ok(ScanOutcome::Exhausted { probes })
}
