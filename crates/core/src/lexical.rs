//! Ruby lexical helpers shared by the boundary scanner and the balance oracle.
//!
//! Both sides must agree on what opens a heredoc or ends a block, otherwise the
//! scanner would hide lines the oracle expects to see (or the reverse).

use std::sync::LazyLock;

use regex::Regex;

/// `<<ID`, `<<-ID`, `<<~ID` and the quoted forms, anchored at the `<<`.
/// A bare `<<id` must start with an uppercase letter, which keeps
/// `value <<other` shifts from reading as heredocs. `<<-id` and `<<~id` take
/// any identifier; see [`HeredocTag::from_captures`].
static HEREDOC_AT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^<<([~-]?)(?:"([^"\n]+)"|'([^'\n]+)'|`([^`\n]+)`|([A-Za-z_][A-Za-z0-9_]*))"#)
        .unwrap_or_else(|e| panic!("regex: {e}"))
});

/// Same shapes anywhere in a line, preceded by something that can start an
/// argument.
static HEREDOC_IN_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:^|[\s(,=\[{])<<([~-]?)(?:"([^"\n]+)"|'([^'\n]+)'|`([^`\n]+)`|([A-Za-z_][A-Za-z0-9_]*))"#,
    )
    .unwrap_or_else(|e| panic!("regex: {e}"))
});

/// Endless method definition, matched on the text right after `def`:
/// `def name = expr`, `def name(args) = expr`, `def self.name = expr`.
static ENDLESS_AFTER_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s+(?:[A-Za-z_]\w*\.)?(?:[A-Za-z_]\w*[?!]?|\[\]|[+\-*/%<>=!~^&|]+@?)\s*(?:\([^()]*\)\s*=|\s=)(?:[^=~>]|$)",
    )
    .unwrap_or_else(|e| panic!("regex: {e}"))
});

static DEF_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\w.:@$])def\s").unwrap_or_else(|e| panic!("regex: {e}"))
});

/// `def` and its closing `end` on one line: `def x; 1; end`, `def x() 1 end`.
static ONE_LINE_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\w.:@$])def\s.*[\s;)]end(?:[\s;.]|$)").unwrap_or_else(|e| panic!("regex: {e}"))
});

pub fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || !c.is_ascii()
}

/// A heredoc waiting for its terminator line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeredocTag {
    pub tag: String,
    /// `<<-` and `<<~` allow the terminator to be indented.
    pub indented: bool,
}

impl HeredocTag {
    fn from_captures(caps: &regex::Captures<'_>) -> Option<Self> {
        let indented = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        if let Some(bare) = caps.get(5) {
            if !indented && !bare.as_str().starts_with(|c: char| c.is_ascii_uppercase()) {
                return None;
            }
        }
        let tag = (2..=5).find_map(|i| caps.get(i))?.as_str().to_string();
        Some(HeredocTag { tag, indented })
    }

    /// Whether `line` (terminator included or not) ends this heredoc.
    pub fn closes(&self, line: &str) -> bool {
        let body = line.trim_end_matches(['\n', '\r']);
        if self.indented {
            body.trim_start_matches([' ', '\t']) == self.tag
        } else {
            body == self.tag
        }
    }
}

/// Heredoc opener at the very start of `rest`, with its length in chars.
pub fn heredoc_at(rest: &str) -> Option<(HeredocTag, usize)> {
    let caps = HEREDOC_AT.captures(rest)?;
    let whole = caps.get(0)?;
    let tag = HeredocTag::from_captures(&caps)?;
    Some((tag, rest[..whole.end()].chars().count()))
}

/// Count of unescaped `"` and `'` characters; odd means "inside a string".
fn inside_quotes(prefix: &str) -> bool {
    let mut double = false;
    let mut single = false;
    let mut escaped = false;
    for c in prefix.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' if !single => double = !double,
            '\'' if !double => single = !single,
            _ => {}
        }
    }
    double || single
}

/// Byte offset of a trailing `# comment`: the first `#` outside quotes that
/// does not start an interpolation.
pub fn comment_start(line: &str) -> Option<usize> {
    line.match_indices('#').map(|(at, _)| at).find(|&at| {
        !line[at + 1..].starts_with('{') && !inside_quotes(&line[..at])
    })
}

/// All heredocs opened on a line, in order. Openers that sit inside a
/// string literal or a trailing comment are ignored.
pub fn heredoc_openers(line: &str) -> Vec<HeredocTag> {
    let code = &line[..comment_start(line).unwrap_or(line.len())];
    HEREDOC_IN_LINE
        .captures_iter(code)
        .filter(|caps| caps.get(0).is_some_and(|m| !inside_quotes(&code[..m.start()])))
        .filter_map(|caps| HeredocTag::from_captures(&caps))
        .collect()
}

/// A percent literal (`%{`, `%w[`, `%Q(` ...) whose closer is not on its
/// opening line. Returns the delimiter pair and the nesting depth left open.
/// Scanning stops at a trailing comment; a `#` inside a literal is content.
pub fn unclosed_percent_literal(line: &str) -> Option<(char, char, usize)> {
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '#' && chars.get(i + 1) != Some(&'{') {
            let prefix: String = chars[..i].iter().collect();
            if !inside_quotes(&prefix) {
                return None;
            }
        }
        if chars[i] != '%' || !percent_can_start(&chars, i) {
            i += 1;
            continue;
        }
        let mut j = i + 1;
        if chars.get(j).is_some_and(|c| "qQwWiIrsx".contains(*c)) {
            j += 1;
        }
        let Some(close) = chars.get(j).and_then(|c| matching_close(*c)) else {
            i += 1;
            continue;
        };
        let prefix: String = chars[..i].iter().collect();
        if inside_quotes(&prefix) {
            i += 1;
            continue;
        }
        let open = chars[j];
        let mut depth = 1;
        let mut k = j + 1;
        while k < chars.len() && depth > 0 {
            match chars[k] {
                '\\' => k += 1,
                c if c == open => depth += 1,
                c if c == close => depth -= 1,
                _ => {}
            }
            k += 1;
        }
        if depth > 0 {
            return Some((open, close, depth));
        }
        i = k;
    }
    None
}

fn percent_can_start(chars: &[char], i: usize) -> bool {
    match i.checked_sub(1).map(|p| chars[p]) {
        None => true,
        Some(p) => !(is_ident_char(p) || matches!(p, ')' | ']' | '}')),
    }
}

pub fn matching_close(open: char) -> Option<char> {
    match open {
        '(' => Some(')'),
        '[' => Some(']'),
        '{' => Some('}'),
        '<' => Some('>'),
        _ => None,
    }
}

/// Text following a `def` keyword describes an endless method.
pub fn is_endless_def_tail(after_def: &str) -> bool {
    ENDLESS_AFTER_DEF.is_match(after_def)
}

/// The line defines a complete method by itself: endless, or `def ... end`.
pub fn is_one_line_def(line: &str) -> bool {
    if ONE_LINE_DEF.is_match(line) {
        return true;
    }
    DEF_KEYWORD.find_iter(line).any(|m| {
        let after = &line[m.end() - 1..];
        is_endless_def_tail(after)
    })
}

/// `end` preceded by a space, tab, `;` or the start of the line. The trailing
/// side is not checked, so `endpoint` after a space also counts.
pub fn contains_end_keyword(line: &str) -> bool {
    line.match_indices("end").any(|(at, _)| {
        at == 0 || matches!(line[..at].chars().next_back(), Some(' ' | '\t' | ';'))
    })
}
