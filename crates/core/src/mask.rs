// ---------------------------------------------------------------------------
// Probe masking — hide interpolated code from the syntax oracle
// ---------------------------------------------------------------------------

use crate::lines::split_terminator;

/// Neutral character substituted for masked code. An identifier character, so
/// a run of it reads as a plain word wherever it lands.
pub const PLACEHOLDER: char = 'z';

/// Replace every `#{ ... }` interpolation in a line with placeholders.
///
/// The `#`, the braces, everything between them and an escaping backslash in
/// front of the `#` are all substituted, one placeholder per character, so the
/// masked line has the same character count as the original. Terminators are
/// left alone.
pub fn mask(line: &str) -> String {
    let (body, terminator) = split_terminator(line);
    let chars: Vec<char> = body.chars().collect();
    let mut out: Vec<char> = chars.clone();
    let mut depth: usize = 0;

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if depth == 0 {
            if c == '#' && chars.get(i + 1) == Some(&'{') {
                depth = 1;
                out[i] = PLACEHOLDER;
                out[i + 1] = PLACEHOLDER;
                if i > 0 && chars[i - 1] == '\\' {
                    out[i - 1] = PLACEHOLDER;
                }
                i += 2;
                continue;
            }
        } else {
            match c {
                '{' => depth += 1,
                '}' => depth -= 1,
                _ => {}
            }
            out[i] = PLACEHOLDER;
        }
        i += 1;
    }

    let mut masked: String = out.into_iter().collect();
    masked.push_str(terminator);
    masked
}

/// A line of placeholders with the same character length and terminator.
pub fn placeholder_line(line: &str) -> String {
    let (body, terminator) = split_terminator(line);
    let mut out: String = body.chars().map(|_| PLACEHOLDER).collect();
    out.push_str(terminator);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_pass_through() {
        assert_eq!(mask("  x = {a: 1}\n"), "  x = {a: 1}\n");
    }

    #[test]
    fn interpolation_is_replaced() {
        assert_eq!(mask("\"a#{b}c\"\n"), "\"azzzzc\"\n");
    }

    #[test]
    fn nested_braces_stay_inside_the_mask() {
        let expected = format!("\"{}\"\n", "z".repeat(15));
        assert_eq!(mask("\"#{ {a: 1}[:a] }\"\n"), expected);
    }

    #[test]
    fn escaped_interpolation_masks_the_backslash() {
        assert_eq!(mask("\"\\#{x}\""), "\"zzzzz\"");
    }

    #[test]
    fn stray_close_brace_is_kept() {
        assert_eq!(mask("} #{x}\n"), "} zzzz\n");
    }

    #[test]
    fn block_keyword_inside_interpolation_disappears() {
        let masked = mask("    puts \"#{items.map { |i| i }.join; end}\"\n");
        assert!(!masked.contains("end"), "{masked}");
        assert!(!masked.contains('{'), "{masked}");
    }

    #[test]
    fn character_count_and_terminator_preserved() {
        let line = "  \"héllo #{wörld}\"\r\n";
        let masked = mask(line);
        assert_eq!(masked.chars().count(), line.chars().count());
        assert!(masked.ends_with("\r\n"));
    }

    #[test]
    fn unclosed_interpolation_keeps_the_newline() {
        assert_eq!(mask("\"#{foo(\n"), "\"zzzzzz\n");
    }

    #[test]
    fn placeholder_line_matches_length() {
        assert_eq!(placeholder_line("  end\n"), "zzzzz\n");
        assert_eq!(placeholder_line("x"), "z");
    }
}
