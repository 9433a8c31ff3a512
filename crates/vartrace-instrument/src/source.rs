//! A character-level view of C# source with literals and comments blanked.
//!
//! Placement decisions only care about code structure: braces, parentheses,
//! semicolons and keywords. [`CodeView`] replaces the contents of string
//! literals, char literals and comments with spaces (keeping every column
//! where it was) so that structure scans never see a brace inside `"{"`.
//! This is still a heuristic: preprocessor directives and raw string
//! literals (`"""`) are not understood.

/// Position of a character in the source: 0-based line and column (in chars).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Pos {
    pub line: usize,
    pub col: usize,
}

/// Control-structure keywords that introduce a statement body.
pub const CONTROL_KEYWORDS: [&str; 10] = [
    "for", "while", "if", "else", "switch", "do", "foreach", "try", "catch", "finally",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexState {
    Code,
    BlockComment,
    VerbatimString,
}

/// Source lines with non-code characters blanked out.
#[derive(Debug, Clone)]
pub struct CodeView {
    lines: Vec<Vec<char>>,
}

impl CodeView {
    pub fn new<S: AsRef<str>>(lines: &[S]) -> Self {
        let mut state = LexState::Code;
        let lines = lines
            .iter()
            .map(|line| blank_line(line.as_ref(), &mut state))
            .collect();
        CodeView { lines }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// The code part of a line, columns preserved.
    pub fn line_text(&self, line: usize) -> String {
        self.lines
            .get(line)
            .map(|chars| chars.iter().collect())
            .unwrap_or_default()
    }

    /// The code part of a line, trimmed.
    pub fn trimmed(&self, line: usize) -> String {
        self.lines
            .get(line)
            .map(|chars| chars.iter().collect::<String>().trim().to_string())
            .unwrap_or_default()
    }

    pub fn is_blank(&self, line: usize) -> bool {
        self.lines
            .get(line)
            .map_or(true, |chars| chars.iter().all(|c| c.is_whitespace()))
    }

    pub fn char_at(&self, pos: Pos) -> Option<char> {
        self.lines.get(pos.line)?.get(pos.col).copied()
    }

    /// The position right after `pos`, crossing line ends.
    pub fn advance(&self, pos: Pos) -> Option<Pos> {
        let len = self.lines.get(pos.line)?.len();
        if pos.col + 1 < len {
            return Some(Pos {
                line: pos.line,
                col: pos.col + 1,
            });
        }
        let mut line = pos.line + 1;
        while line < self.lines.len() {
            if !self.lines[line].is_empty() {
                return Some(Pos { line, col: 0 });
            }
            line += 1;
        }
        None
    }

    /// First non-whitespace code character at or after `pos`.
    pub fn next_significant(&self, pos: Pos) -> Option<Pos> {
        let mut cur = if self.char_at(pos).is_some() {
            pos
        } else {
            self.advance(Pos {
                line: pos.line,
                col: self.lines.get(pos.line)?.len().saturating_sub(1),
            })
            .filter(|p| *p > pos)
            .or_else(|| self.line_start_after(pos.line))?
        };
        loop {
            match self.char_at(cur) {
                Some(c) if !c.is_whitespace() => return Some(cur),
                _ => cur = self.advance(cur)?,
            }
        }
    }

    /// First significant position strictly after `pos`.
    pub fn next_significant_after(&self, pos: Pos) -> Option<Pos> {
        self.next_significant(self.advance(pos)?)
    }

    /// First significant position on or after the start of `line`.
    pub fn first_significant_from(&self, line: usize) -> Option<Pos> {
        if line >= self.lines.len() {
            return None;
        }
        self.next_significant(Pos { line, col: 0 })
    }

    /// The identifier starting at `pos`, if any, and the position after it.
    pub fn word_at(&self, pos: Pos) -> Option<(String, Pos)> {
        let chars = self.lines.get(pos.line)?;
        let first = *chars.get(pos.col)?;
        if !(first.is_alphabetic() || first == '_') {
            return None;
        }
        let end = chars[pos.col..]
            .iter()
            .position(|c| !(c.is_alphanumeric() || *c == '_'))
            .map_or(chars.len(), |n| pos.col + n);
        let word = chars[pos.col..end].iter().collect();
        Some((
            word,
            Pos {
                line: pos.line,
                col: end,
            },
        ))
    }

    /// Control keyword at `pos` (after skipping leading `}` and whitespace).
    pub fn keyword_at(&self, pos: Pos) -> Option<(&'static str, Pos, Pos)> {
        let mut cur = self.next_significant(pos)?;
        while self.char_at(cur) == Some('}') {
            cur = self.next_significant_after(cur)?;
        }
        let (word, after) = self.word_at(cur)?;
        CONTROL_KEYWORDS
            .iter()
            .find(|k| **k == word)
            .map(|k| (*k, cur, after))
    }

    /// Given the position of an opening delimiter, returns the position of
    /// its matching closer. Only the delimiter's own kind is counted.
    pub fn matching_close(&self, open: Pos) -> Option<Pos> {
        let open_char = self.char_at(open)?;
        let close_char = match open_char {
            '{' => '}',
            '(' => ')',
            '[' => ']',
            _ => return None,
        };
        let mut depth = 0usize;
        let mut cur = open;
        loop {
            match self.char_at(cur) {
                Some(c) if c == open_char => depth += 1,
                Some(c) if c == close_char => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(cur);
                    }
                }
                _ => {}
            }
            cur = self.advance(cur)?;
        }
    }

    fn line_start_after(&self, line: usize) -> Option<Pos> {
        ((line + 1)..self.lines.len())
            .find(|l| !self.lines[*l].is_empty())
            .map(|l| Pos { line: l, col: 0 })
    }
}

/// Blanks literal and comment contents on one line, carrying multi-line
/// lexer state (block comments, verbatim strings) to the next line.
fn blank_line(line: &str, state: &mut LexState) -> Vec<char> {
    let chars: Vec<char> = line.chars().collect();
    let mut out = chars.clone();
    let mut i = 0;
    while i < chars.len() {
        match *state {
            LexState::BlockComment => {
                if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
                    out[i] = ' ';
                    out[i + 1] = ' ';
                    i += 2;
                    *state = LexState::Code;
                } else {
                    out[i] = ' ';
                    i += 1;
                }
            }
            LexState::VerbatimString => {
                if chars[i] == '"' {
                    if chars.get(i + 1) == Some(&'"') {
                        out[i] = ' ';
                        out[i + 1] = ' ';
                        i += 2;
                    } else {
                        i += 1;
                        *state = LexState::Code;
                    }
                } else {
                    out[i] = ' ';
                    i += 1;
                }
            }
            LexState::Code => match chars[i] {
                '/' if chars.get(i + 1) == Some(&'/') => {
                    for c in out.iter_mut().skip(i) {
                        *c = ' ';
                    }
                    break;
                }
                '/' if chars.get(i + 1) == Some(&'*') => {
                    out[i] = ' ';
                    out[i + 1] = ' ';
                    i += 2;
                    *state = LexState::BlockComment;
                }
                '@' | '$' if is_verbatim_start(&chars, i) => {
                    // Skip the prefix characters up to and including the quote.
                    while chars[i] != '"' {
                        i += 1;
                    }
                    i += 1;
                    *state = LexState::VerbatimString;
                }
                '"' => {
                    i = blank_quoted(&chars, &mut out, i, '"');
                }
                '\'' => {
                    i = blank_quoted(&chars, &mut out, i, '\'');
                }
                _ => i += 1,
            },
        }
    }
    out
}

/// `@"`, `$@"` or `@$"` at `i`.
fn is_verbatim_start(chars: &[char], i: usize) -> bool {
    let rest: String = chars[i..chars.len().min(i + 3)].iter().collect();
    rest.starts_with("@\"") || rest.starts_with("$@\"") || rest.starts_with("@$\"")
}

/// Blanks a regular (escaped) literal starting at the quote at `start`;
/// returns the index after the closing quote or the line end.
fn blank_quoted(chars: &[char], out: &mut [char], start: usize, quote: char) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                out[i] = ' ';
                if i + 1 < chars.len() {
                    out[i + 1] = ' ';
                }
                i += 2;
            }
            c if c == quote => return i + 1,
            _ => {
                out[i] = ' ';
                i += 1;
            }
        }
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(src: &str) -> CodeView {
        let lines: Vec<&str> = src.lines().collect();
        CodeView::new(&lines)
    }

    #[test]
    fn braces_inside_literals_and_comments_are_blanked() {
        let v = view("Console.WriteLine(\"{\"); // }\nchar c = '{';");
        assert_eq!(v.trimmed(0), "Console.WriteLine(\" \");");
        assert_eq!(v.trimmed(1), "char c = ' ';");
    }

    #[test]
    fn escaped_quotes_do_not_end_the_literal() {
        let v = view(r#"var s = "a\"{"; int x;"#);
        assert!(v.trimmed(0).ends_with("; int x;"));
        assert!(!v.trimmed(0).contains('{'));
    }

    #[test]
    fn block_comments_and_verbatim_strings_span_lines() {
        let v = view("/* {\n } */ int a;\nvar p = @\"{\n}\";");
        assert!(v.is_blank(0));
        assert_eq!(v.trimmed(1), "int a;");
        assert!(!v.trimmed(2).contains('{'));
        assert_eq!(v.trimmed(3), "\";");
    }

    #[test]
    fn keyword_detection_skips_leading_close_brace() {
        let v = view("} else {\nformat(x);\nif(x)");
        assert_eq!(v.keyword_at(Pos { line: 0, col: 0 }).map(|k| k.0), Some("else"));
        assert!(v.keyword_at(Pos { line: 1, col: 0 }).is_none());
        assert_eq!(v.keyword_at(Pos { line: 2, col: 0 }).map(|k| k.0), Some("if"));
    }

    #[test]
    fn matching_close_crosses_lines() {
        let v = view("{\n  { }\n}");
        let close = v.matching_close(Pos { line: 0, col: 0 }).unwrap();
        assert_eq!(close, Pos { line: 2, col: 0 });
    }
}
