// ---------------------------------------------------------------------------
// Balance oracle — block/bracket/literal balance of Ruby text
// ---------------------------------------------------------------------------
//
// Not a parser: it lexes just enough Ruby to tell openers from closers. Block
// keywords (`def`, `class`, `do`, statement-position `if` ...) must meet an
// `end`, brackets must pair up, and every string, percent literal, regex and
// heredoc must be closed. Text that ends on a binary operator is incomplete.

use std::io::Write;

use super::SyntaxOracle;
use crate::error::OracleError;
use crate::lexical::{heredoc_at, is_endless_def_tail, is_ident_char, matching_close, HeredocTag};

pub struct BalanceOracle;

impl SyntaxOracle for BalanceOracle {
    fn check(&self, text: &str, diagnostics: &mut dyn Write) -> Result<bool, OracleError> {
        match Lexer::new(text).run() {
            Ok(()) => Ok(true),
            Err(problem) => {
                writeln!(diagnostics, "-:{}: {}", problem.line, problem.message)
                    .map_err(|e| OracleError::Failed(e.to_string()))?;
                Ok(false)
            }
        }
    }

    fn name(&self) -> &str {
        "balance"
    }
}

#[derive(Debug)]
struct Problem {
    line: usize,
    message: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Opener {
    Keyword(&'static str),
    Paren,
    Bracket,
    Brace,
}

impl Opener {
    fn label(&self) -> &'static str {
        match *self {
            Opener::Keyword(kw) => kw,
            Opener::Paren => "(",
            Opener::Bracket => "[",
            Opener::Brace => "{",
        }
    }
}

/// What the previous significant token leaves the lexer expecting.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Prev {
    /// Beginning of a statement.
    Start,
    /// After an operator, opener or expression keyword.
    Operator,
    /// After an identifier, literal or closer.
    Value,
    /// After `.`, `&.`, `::` or `def`: the next word is a name, never a keyword.
    Dot,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    blocks: Vec<(Opener, usize)>,
    prev: Prev,
    space_before: bool,
    /// The last token was a binary operator, so the expression continues.
    continued: bool,
    /// `while`/`until`/`for` opened on this statement; its optional `do` is not a new block.
    loop_header: bool,
    heredocs: Vec<HeredocTag>,
}

impl Lexer {
    fn new(text: &str) -> Self {
        Lexer {
            chars: text.chars().collect(),
            pos: 0,
            line: 1,
            blocks: Vec::new(),
            prev: Prev::Start,
            space_before: false,
            continued: false,
            loop_header: false,
            heredocs: Vec::new(),
        }
    }

    fn run(mut self) -> Result<(), Problem> {
        self.code(None)?;
        if let Some(tag) = self.heredocs.first() {
            return Err(self.problem(format!("can't find string \"{}\" anywhere before EOF", tag.tag)));
        }
        if let Some((opener, line)) = self.blocks.last() {
            return Err(self.problem(format!(
                "unexpected end-of-input, '{}' opened on line {line} is never closed",
                opener.label()
            )));
        }
        if self.continued {
            return Err(self.problem("unexpected end-of-input after an operator".to_string()));
        }
        Ok(())
    }

    fn problem(&self, message: String) -> Problem {
        Problem { line: self.line, message }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn at_line_start(&self) -> bool {
        self.pos == 0 || self.chars[self.pos - 1] == '\n'
    }

    fn rest_of_line(&self) -> String {
        self.chars[self.pos..].iter().take_while(|c| **c != '\n').collect()
    }

    fn value_expected(&self) -> bool {
        matches!(self.prev, Prev::Start | Prev::Operator)
    }

    fn value(&mut self) {
        self.prev = Prev::Value;
        self.continued = false;
    }

    fn operator(&mut self) {
        self.prev = Prev::Operator;
        self.continued = true;
    }

    fn statement(&mut self) {
        self.prev = Prev::Start;
        self.continued = false;
    }

    /// Lex code until end of input, or until the `}` closing an interpolation
    /// that started with `base` blocks open.
    fn code(&mut self, base: Option<usize>) -> Result<(), Problem> {
        let floor = base.unwrap_or(0);
        while let Some(c) = self.peek() {
            let space = std::mem::replace(&mut self.space_before, false);
            match c {
                ' ' | '\t' | '\r' => {
                    self.pos += 1;
                    self.space_before = true;
                }
                '\n' => self.newline()?,
                '\\' if self.peek_at(1) == Some('\n') => {
                    self.pos += 2;
                    self.line += 1;
                    self.space_before = true;
                }
                '#' => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.pos += 1;
                    }
                }
                '=' if self.at_line_start() && self.rest_of_line().starts_with("=begin") => {
                    self.embedded_document()?;
                }
                '_' if self.at_line_start() && self.rest_of_line().trim_end() == "__END__" => {
                    self.pos = self.chars.len();
                }
                '"' | '`' if self.prev != Prev::Dot => {
                    self.pos += 1;
                    self.string(c, None, true)?;
                }
                '\'' => {
                    self.pos += 1;
                    self.string('\'', None, false)?;
                }
                ':' => self.colon(space)?,
                '%' if self.percent_literal_ahead(space) => self.percent_literal()?,
                '/' if self.regex_ahead(space) => {
                    self.pos += 1;
                    self.string('/', None, true)?;
                    while self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
                        self.pos += 1;
                    }
                }
                '?' if self.char_literal_ahead() => {
                    self.pos += 1;
                    if self.peek() == Some('\\') {
                        self.pos += 1;
                    }
                    self.pos += 1;
                    self.value();
                }
                '<' if self.peek_at(1) == Some('<') && self.heredoc_allowed(space) => {
                    match heredoc_at(&self.rest_of_line()) {
                        Some((tag, len)) => {
                            self.pos += len;
                            self.heredocs.push(tag);
                            self.value();
                        }
                        None => {
                            self.pos += 2;
                            self.operator();
                        }
                    }
                }
                '0'..='9' => self.number(),
                c if c.is_alphabetic() || c == '_' || c == '@' || c == '$' || !c.is_ascii() => {
                    self.word(floor)?
                }
                '(' => self.open(Opener::Paren),
                '[' => self.open(Opener::Bracket),
                '{' => self.open(Opener::Brace),
                '}' if base.is_some() && self.blocks.len() == floor => {
                    self.pos += 1;
                    return Ok(());
                }
                ')' | ']' | '}' => self.close(c, floor)?,
                '.' => {
                    if self.peek_at(1) == Some('.') {
                        self.pos += 2;
                        if self.peek() == Some('.') {
                            self.pos += 1;
                        }
                        self.operator();
                    } else {
                        self.pos += 1;
                        self.prev = Prev::Dot;
                        self.continued = true;
                    }
                }
                '&' if self.peek_at(1) == Some('.') => {
                    self.pos += 2;
                    self.prev = Prev::Dot;
                    self.continued = true;
                }
                ';' => {
                    self.pos += 1;
                    self.statement();
                    self.loop_header = false;
                }
                _ => {
                    self.pos += 1;
                    self.operator();
                }
            }
        }

        if base.is_some() {
            return Err(self.problem("unterminated string interpolation".to_string()));
        }
        Ok(())
    }

    fn newline(&mut self) -> Result<(), Problem> {
        self.pos += 1;
        self.line += 1;
        let pending = std::mem::take(&mut self.heredocs);
        for tag in &pending {
            self.heredoc_body(tag)?;
        }
        if !self.continued {
            self.statement();
            self.loop_header = false;
        }
        Ok(())
    }

    fn heredoc_body(&mut self, tag: &HeredocTag) -> Result<(), Problem> {
        loop {
            if self.pos >= self.chars.len() {
                return Err(self.problem(format!(
                    "can't find string \"{}\" anywhere before EOF",
                    tag.tag
                )));
            }
            let line = self.rest_of_line();
            self.pos += line.chars().count();
            if self.peek() == Some('\n') {
                self.pos += 1;
                self.line += 1;
            }
            if tag.closes(&line) {
                return Ok(());
            }
        }
    }

    fn embedded_document(&mut self) -> Result<(), Problem> {
        let start = self.line;
        loop {
            let line = self.rest_of_line();
            self.pos += line.chars().count();
            if line.starts_with("=end") && self.line != start {
                return Ok(());
            }
            if self.peek() != Some('\n') {
                return Err(Problem {
                    line: start,
                    message: "embedded document meets end of file".to_string(),
                });
            }
            self.pos += 1;
            self.line += 1;
        }
    }

    /// Body of a string-like literal; the opening delimiter is already consumed.
    /// `open` is set for bracket-delimited percent literals, which nest.
    fn string(&mut self, close: char, open: Option<char>, interpolate: bool) -> Result<(), Problem> {
        let start = self.line;
        let mut nesting = 0usize;
        loop {
            let Some(c) = self.peek() else {
                return Err(Problem {
                    line: start,
                    message: format!("unterminated literal, expecting '{close}'"),
                });
            };
            self.pos += 1;
            match c {
                '\\' => {
                    if self.peek() == Some('\n') {
                        self.line += 1;
                    }
                    if self.peek().is_some() {
                        self.pos += 1;
                    }
                }
                '\n' => self.line += 1,
                '#' if interpolate && self.peek() == Some('{') => {
                    self.pos += 1;
                    let saved = (self.prev, self.continued, self.loop_header);
                    self.statement();
                    let base = self.blocks.len();
                    self.code(Some(base))?;
                    (self.prev, self.continued, self.loop_header) = saved;
                }
                c if Some(c) == open => nesting += 1,
                c if c == close => {
                    if nesting == 0 {
                        break;
                    }
                    nesting -= 1;
                }
                _ => {}
            }
        }
        self.value();
        Ok(())
    }

    fn colon(&mut self, space: bool) -> Result<(), Problem> {
        self.pos += 1;
        match self.peek() {
            Some(':') => {
                self.pos += 1;
                self.prev = Prev::Dot;
                self.continued = true;
            }
            Some(q @ ('"' | '\'')) => {
                self.pos += 1;
                self.string(q, None, q == '"')?;
            }
            Some(c) if c.is_alphabetic() || c == '_' || c == '@' || c == '$' || !c.is_ascii() => {
                while self.peek().is_some_and(|c| is_ident_char(c) || c == '@' || c == '$') {
                    self.pos += 1;
                }
                if self.peek().is_some_and(|c| matches!(c, '?' | '!' | '='))
                    && !matches!(self.peek_at(1), Some('=' | '>' | '~'))
                {
                    self.pos += 1;
                }
                self.value();
            }
            Some(c) if "+-*/<>=!~^&|%[".contains(c) && (self.value_expected() || space) => {
                while self.peek().is_some_and(|c| "+-*/<>=!~^&|%[]@".contains(c)) {
                    self.pos += 1;
                }
                self.value();
            }
            _ => self.operator(),
        }
        Ok(())
    }

    fn percent_literal_ahead(&self, space: bool) -> bool {
        let (kind, delim) = match self.peek_at(1) {
            Some(k) if "qQwWiIrsx".contains(k) => (Some(k), self.peek_at(2)),
            other => (None, other),
        };
        let Some(d) = delim else { return false };
        let is_delim = match kind {
            Some(_) => !d.is_alphanumeric() && !d.is_whitespace(),
            None => matches!(d, '{' | '(' | '[' | '<' | '|' | '!' | '/' | '^'),
        };
        is_delim && (self.value_expected() || (self.prev == Prev::Value && space))
    }

    fn percent_literal(&mut self) -> Result<(), Problem> {
        self.pos += 1;
        let kind = match self.peek() {
            Some(k) if "qQwWiIrsx".contains(k) => {
                self.pos += 1;
                Some(k)
            }
            _ => None,
        };
        let Some(delim) = self.peek() else {
            return Err(self.problem("unterminated percent literal".to_string()));
        };
        self.pos += 1;
        let (open, close) = match matching_close(delim) {
            Some(close) => (Some(delim), close),
            None => (None, delim),
        };
        let interpolate = !matches!(kind, Some('q' | 'w' | 'i' | 's'));
        self.string(close, open, interpolate)?;
        if kind == Some('r') {
            while self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
                self.pos += 1;
            }
        }
        Ok(())
    }

    fn regex_ahead(&self, space: bool) -> bool {
        if self.value_expected() {
            return true;
        }
        self.prev == Prev::Value
            && space
            && !matches!(self.peek_at(1), Some(' ' | '\t' | '\n' | '='))
    }

    fn char_literal_ahead(&self) -> bool {
        if !self.value_expected() {
            return false;
        }
        match self.peek_at(1) {
            Some('\\') => true,
            Some(c) if !c.is_whitespace() => !self.peek_at(2).is_some_and(is_ident_char),
            _ => false,
        }
    }

    fn heredoc_allowed(&self, space: bool) -> bool {
        self.value_expected() || (self.prev == Prev::Value && space)
    }

    fn number(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
            while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
                self.pos += 1;
            }
        }
        self.value();
    }

    fn open(&mut self, opener: Opener) {
        self.pos += 1;
        self.blocks.push((opener, self.line));
        self.prev = Prev::Operator;
        self.continued = false;
    }

    fn close(&mut self, c: char, floor: usize) -> Result<(), Problem> {
        let expected = match c {
            ')' => Opener::Paren,
            ']' => Opener::Bracket,
            _ => Opener::Brace,
        };
        match self.blocks.last().copied() {
            Some((opener, _)) if opener == expected && self.blocks.len() > floor => {
                self.blocks.pop();
                self.pos += 1;
                self.value();
                Ok(())
            }
            Some((opener, line)) if self.blocks.len() > floor => Err(self.problem(format!(
                "unexpected '{c}', '{}' opened on line {line} is still open",
                opener.label()
            ))),
            _ => Err(self.problem(format!("unexpected '{c}'"))),
        }
    }

    fn word(&mut self, floor: usize) -> Result<(), Problem> {
        let start = self.pos;
        if self.peek() == Some('$') {
            self.pos += 1;
            match self.peek() {
                Some(c) if is_ident_char(c) => {
                    while self.peek().is_some_and(is_ident_char) {
                        self.pos += 1;
                    }
                }
                Some(c) if c != '\n' => self.pos += 1,
                _ => {}
            }
            self.value();
            return Ok(());
        }
        while self.peek() == Some('@') {
            self.pos += 1;
        }
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        if self.peek().is_some_and(|c| c == '?' || c == '!') && self.peek_at(1) != Some('=') {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();

        // `key: value` labels are never keywords.
        if self.peek() == Some(':')
            && self.peek_at(1) != Some(':')
            && !word.starts_with(['@', '$'])
            && self.prev != Prev::Dot
        {
            self.pos += 1;
            self.operator();
            return Ok(());
        }

        if self.prev == Prev::Dot {
            self.value();
            return Ok(());
        }

        self.keyword(&word, floor)
    }

    fn keyword(&mut self, word: &str, floor: usize) -> Result<(), Problem> {
        match word {
            "def" => {
                if !is_endless_def_tail(&self.rest_of_line()) {
                    self.blocks.push((Opener::Keyword("def"), self.line));
                }
                self.prev = Prev::Dot;
                self.continued = false;
            }
            "class" | "module" => {
                let kw = if word == "class" { "class" } else { "module" };
                self.blocks.push((Opener::Keyword(kw), self.line));
                self.prev = Prev::Operator;
                self.continued = false;
            }
            "begin" | "case" => {
                let kw = if word == "begin" { "begin" } else { "case" };
                self.blocks.push((Opener::Keyword(kw), self.line));
                self.statement();
            }
            "do" => {
                if self.loop_header {
                    self.loop_header = false;
                } else {
                    self.blocks.push((Opener::Keyword("do"), self.line));
                }
                self.statement();
            }
            "if" | "unless" | "while" | "until" => {
                if self.value_expected() {
                    let kw = match word {
                        "if" => "if",
                        "unless" => "unless",
                        "while" => "while",
                        _ => "until",
                    };
                    self.blocks.push((Opener::Keyword(kw), self.line));
                    self.loop_header = matches!(kw, "while" | "until");
                }
                self.prev = Prev::Operator;
                self.continued = false;
            }
            "for" => {
                self.blocks.push((Opener::Keyword("for"), self.line));
                self.loop_header = true;
                self.prev = Prev::Operator;
                self.continued = false;
            }
            "end" => {
                match self.blocks.last().copied() {
                    Some((Opener::Keyword(_), _)) if self.blocks.len() > floor => {
                        self.blocks.pop();
                    }
                    Some((opener, line)) if self.blocks.len() > floor => {
                        return Err(self.problem(format!(
                            "unexpected 'end', '{}' opened on line {line} is still open",
                            opener.label()
                        )));
                    }
                    _ => return Err(self.problem("unexpected 'end'".to_string())),
                }
                self.loop_header = false;
                self.value();
            }
            "then" | "else" | "ensure" => self.statement(),
            "elsif" | "when" | "in" | "rescue" => {
                self.prev = Prev::Operator;
                self.continued = false;
            }
            "and" | "or" | "not" => self.operator(),
            _ => self.value(),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid(text: &str) -> bool {
        BalanceOracle.check(text, &mut std::io::sink()).unwrap()
    }

    fn diagnostic(text: &str) -> String {
        let mut out = Vec::new();
        assert!(!BalanceOracle.check(text, &mut out).unwrap(), "expected invalid: {text:?}");
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn method_definitions() {
        assert!(valid("  def bar\n    1 + 1\n  end\n"));
        assert!(!valid("  def bar\n    1 + 1\n"));
        assert!(valid("def foo; 42; end"));
        assert!(valid("def self.build(*args, &blk)\n  new(*args, &blk)\nend\n"));
        assert!(valid("def full_name = \"#{first} #{last}\"\n"));
        assert!(valid("def area(r) = 3.14 * r * r\n"));
    }

    #[test]
    fn keyword_named_methods() {
        assert!(valid("def end\n  1\nend\n"));
        assert!(valid("def class_name\n  self.class.name\nend\n"));
        assert!(valid("x = range.end\n"));
        assert!(valid("opts = { if: 1, end: 2 }\n"));
        assert!(valid("sym = :end\n"));
    }

    #[test]
    fn modifiers_do_not_open_blocks() {
        assert!(valid("def x\n  return if y\n  z unless w\n  a += 1 while a < 3\nend\n"));
        assert!(valid("value = if cond\n  1\nelse\n  2\nend\n"));
        assert!(!valid("value = if cond\n  1\n"));
    }

    #[test]
    fn loops_absorb_their_do() {
        assert!(valid("while x do\n  y\nend\n"));
        assert!(valid("for a in list do\n  puts a\nend\n"));
        assert!(valid("until done?\n  step\nend\n"));
        assert!(valid("items.each do |i|\n  puts i\nend\n"));
    }

    #[test]
    fn brace_blocks_and_lambdas() {
        assert!(valid("method = proc { |*args|\n  args.first + args.last\n}\n"));
        assert!(!valid("method = proc { |*args|\n  args.first + args.last\n"));
        assert!(valid("method = -> *args {\n  args.first\n}\n"));
        assert!(valid("f = ->(x) do\n  x\nend\n"));
    }

    #[test]
    fn strings_hide_keywords_and_brackets() {
        assert!(valid("def x\n  puts \"end } ) ]\"\nend\n"));
        assert!(valid("def x\n  puts 'def class do'\nend\n"));
        assert!(valid("def x\n  \"#{items.map { |i| i }.join}\"\nend\n"));
        assert!(!valid("def x\n  puts \"unterminated\nend\n"));
    }

    #[test]
    fn percent_literals_and_regexes() {
        assert!(valid("x = %w[a b c]\n"));
        assert!(valid("x = %{\n  a {nested} end\n}\n"));
        assert!(valid("x = %Q(#{a} (b))\n"));
        assert!(valid("ok = line =~ /end\\s*$/\n"));
        assert!(valid("half = total / 2\n"));
        assert!(valid("rem = total % 3\n"));
    }

    #[test]
    fn heredocs() {
        assert!(valid("module_eval(<<-EOC, __FILE__, __LINE__ + 1)\n  def #{name}\n  end\nEOC\n"));
        assert!(valid("sql = <<~SQL.strip\n  select 1\n  SQL\nrun(sql)\n"));
        assert!(valid("foo(<<A, <<B)\na\nA\nb\nB\n"));
        assert!(!valid("x = <<~EOS\n  body\n"));
        assert!(valid("list << item\n"));
        assert!(valid("class << self\n  def x; end\nend\n"));
        assert!(valid("x = <<~eos\n  end\n  eos\n"));
        assert!(valid("run(<<-sql)\n  select\n  sql\n"));
        assert!(!valid("total = a <<b\n  end\n  b\n"));
    }

    #[test]
    fn comments_and_documents() {
        assert!(valid("def x # opens nothing: do\n  1\nend\n"));
        assert!(valid("=begin\ndef\n=end\nx = 1\n"));
        assert!(valid("def x\n  1\nend\n__END__\ndef broken\n"));
    }

    #[test]
    fn char_literals_and_ternaries() {
        assert!(valid("c = ?a\n"));
        assert!(valid("x = a ? b : c\n"));
        assert!(valid("x = empty? ? 0 : 1\n"));
    }

    #[test]
    fn trailing_operator_is_incomplete() {
        assert!(!valid("x = 1 +\n"));
        assert!(!valid("foo(a,\n"));
        assert!(valid("x = 1 +\n  2\n"));
        assert!(valid("x = a.\n  b\n"));
    }

    #[test]
    fn mismatches_are_reported() {
        assert!(diagnostic("def x\n  foo)\nend\n").contains("unexpected ')'"));
        assert!(diagnostic("end\n").contains("unexpected 'end'"));
        assert!(diagnostic("class Foo\n  def x\n  end\n").contains("'class' opened on line 1"));
        assert!(diagnostic("x = [1,\n  2\n").starts_with("-:"));
    }

    #[test]
    fn masked_probe_text_is_valid() {
        assert!(valid("  def x\n    puts \"zzzzzzzz\"\n  end\n"));
        assert!(valid("x = %{\nzzzzzz\n}\n"));
        assert!(valid("module_eval(<<-EOC)\nzzzzzzz\n      EOC\n"));
    }
}
