// ---------------------------------------------------------------------------
// Leading comment assembly
// ---------------------------------------------------------------------------

use crate::lines::SourceFile;

/// A line consisting only of a `#` comment (optionally indented).
/// `#{` at the start is an interpolation fragment, not a comment.
pub fn is_whole_line_comment(line: &str) -> bool {
    let rest = line.trim_start_matches([' ', '\t']);
    rest.starts_with('#') && !rest.starts_with("#{")
}

/// Collect the run of whole-line comments directly above `start_line`.
///
/// Returns an empty string when the line right above is not a comment. The
/// walk stops at the first blank or code line; that line is not included.
pub fn leading_comment(file: &SourceFile, start_line: usize) -> String {
    let mut run: Vec<&str> = Vec::new();
    for (_, line) in file.backward_from(start_line) {
        if !is_whole_line_comment(line) {
            break;
        }
        run.push(line);
    }
    run.iter().rev().copied().collect()
}
