//! Probe placement: where in the source each tracking point's probe goes.
//!
//! A probe must observe the state *after* its target line has executed, and
//! inserting it must never change the program's structure. The rules:
//!
//! - a control-structure header (`for`, `while`, `if`, `else`, `switch`,
//!   `do`, `foreach`, `try`, `catch`, `finally`) places the probe after the
//!   whole structure, including chained `else` / `catch` / `finally`
//!   clauses and a `do` block's `while (...);` tail
//! - a lone `{` or the single-statement body right after a header resolves
//!   as the header itself
//! - any other line places the probe after the end of the statement it
//!   starts, scanning forward across lines until a terminator
//!
//! Scans run on a [`CodeView`], so braces and semicolons inside literals
//! and comments are ignored.

use serde::{Deserialize, Serialize};
use vartrace_core::{ProbeId, TrackingPoint};

use crate::error::PlacementError;
use crate::source::{CodeView, Pos};

/// What the probe is placed after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlacementKind {
    /// After the statement starting at the target line.
    AfterStatement,
    /// After a whole control structure whose header is on `header_line`.
    AfterStructure { header_line: usize },
}

/// A resolved tracking point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub probe_id: ProbeId,
    /// 1-based line the point was anchored to.
    pub line_number: usize,
    /// The probe goes after this 1-based line; as a 0-based insertion index
    /// into the original lines this is the same number.
    pub insert_after: usize,
    pub kind: PlacementKind,
}

impl Placement {
    /// 1-based line whose indentation the probe copies.
    pub fn anchor_line(&self) -> usize {
        match self.kind {
            PlacementKind::AfterStatement => self.line_number,
            PlacementKind::AfterStructure { header_line } => header_line,
        }
    }

    /// Lines skipped over by an after-structure placement, inclusive.
    pub fn structure_span(&self) -> Option<(usize, usize)> {
        match self.kind {
            PlacementKind::AfterStatement => None,
            PlacementKind::AfterStructure { header_line } => {
                Some((header_line, self.insert_after))
            }
        }
    }
}

/// Resolves tracking points against one source file.
#[derive(Debug, Clone)]
pub struct Resolver {
    view: CodeView,
}

impl Resolver {
    pub fn new<S: AsRef<str>>(lines: &[S]) -> Self {
        Resolver {
            view: CodeView::new(lines),
        }
    }

    pub fn view(&self) -> &CodeView {
        &self.view
    }

    /// Resolves a single point.
    pub fn resolve(&self, point: &TrackingPoint) -> Result<Placement, PlacementError> {
        let line_count = self.view.line_count();
        if point.line_number == 0 || point.line_number > line_count {
            return Err(PlacementError::OutOfRange {
                probe_id: point.probe_id,
                line: point.line_number,
                line_count,
            });
        }
        let idx = point.line_number - 1;
        let unterminated = || PlacementError::Unterminated {
            probe_id: point.probe_id,
            line: point.line_number,
        };

        if let Some(header) = self.structure_header(idx) {
            let end = self.structure_end(header).ok_or_else(unterminated)?;
            return Ok(Placement {
                probe_id: point.probe_id,
                line_number: point.line_number,
                insert_after: end.line + 1,
                kind: PlacementKind::AfterStructure {
                    header_line: header.line + 1,
                },
            });
        }

        let end = if self.view.is_blank(idx) {
            Pos { line: idx, col: 0 }
        } else {
            let start = self
                .view
                .first_significant_from(idx)
                .ok_or_else(unterminated)?;
            let end = self.statement_end(start).ok_or_else(unterminated)?;
            self.extend_over_continuations(end).ok_or_else(unterminated)?
        };
        Ok(Placement {
            probe_id: point.probe_id,
            line_number: point.line_number,
            insert_after: end.line + 1,
            kind: PlacementKind::AfterStatement,
        })
    }

    /// Position of the header keyword whose structure the line at `idx`
    /// belongs to: the line itself, or its predecessor when `idx` is a lone
    /// `{` or the start of a braceless body.
    fn structure_header(&self, idx: usize) -> Option<Pos> {
        if let Some(kpos) = self.header_on_line(idx) {
            return Some(kpos);
        }
        let prev = (0..idx).rev().find(|l| !self.view.is_blank(*l))?;
        let kpos = self.header_on_line(prev)?;
        let body = self.body_start(kpos)?;
        (body.line == idx).then_some(kpos)
    }

    /// A control keyword starting the code on `line`, excluding do-while
    /// tails.
    fn header_on_line(&self, line: usize) -> Option<Pos> {
        let (keyword, kpos, after) = self.view.keyword_at(Pos { line, col: 0 })?;
        if kpos.line != line || self.view.first_significant_from(line)?.line != line {
            return None;
        }
        if keyword == "while" && self.is_do_while_tail(after) {
            return None;
        }
        Some(kpos)
    }

    /// `while (...)` immediately followed by `;`.
    fn is_do_while_tail(&self, after_keyword: Pos) -> bool {
        let Some(open) = self.view.next_significant(after_keyword) else {
            return false;
        };
        if self.view.char_at(open) != Some('(') {
            return false;
        }
        self.view
            .matching_close(open)
            .and_then(|close| self.view.next_significant_after(close))
            .and_then(|p| self.view.char_at(p))
            == Some(';')
    }

    /// First significant position of the body of the structure whose
    /// keyword is at `kpos`.
    fn body_start(&self, kpos: Pos) -> Option<Pos> {
        let (keyword, after) = self.view.word_at(kpos)?;
        let next = self.view.next_significant(after)?;
        match keyword.as_str() {
            "for" | "while" | "if" | "switch" | "foreach" => self.after_parens(next),
            "catch" => {
                let next = if self.view.char_at(next) == Some('(') {
                    self.after_parens(next)?
                } else {
                    next
                };
                match self.view.word_at(next) {
                    Some((word, after_when)) if word == "when" => {
                        self.after_parens(self.view.next_significant(after_when)?)
                    }
                    _ => Some(next),
                }
            }
            _ => Some(next),
        }
    }

    fn after_parens(&self, open: Pos) -> Option<Pos> {
        if self.view.char_at(open) != Some('(') {
            return None;
        }
        let close = self.view.matching_close(open)?;
        self.view.next_significant_after(close)
    }

    /// Last position of the structure whose keyword is at `kpos`,
    /// including chained clauses.
    fn structure_end(&self, kpos: Pos) -> Option<Pos> {
        let (keyword, _) = self.view.word_at(kpos)?;
        let body = self.body_start(kpos)?;
        let body_end = self.body_end(body)?;
        self.chain(&keyword, body_end)
    }

    fn body_end(&self, body: Pos) -> Option<Pos> {
        match self.view.char_at(body)? {
            '{' => self.view.matching_close(body),
            ';' => Some(body),
            _ => match self.view.keyword_at(body) {
                Some((_, kpos, _)) if kpos == body => self.structure_end(body),
                _ => self.statement_end(body),
            },
        }
    }

    /// Extends `end` over the clauses that continue the structure `keyword`.
    fn chain(&self, keyword: &str, end: Pos) -> Option<Pos> {
        let Some(next) = self.view.next_significant_after(end) else {
            return Some(end);
        };
        let next_word = self.view.word_at(next).map(|(w, _)| w);
        match (keyword, next_word.as_deref()) {
            ("if" | "else", Some("else")) => self.structure_end(next),
            ("try" | "catch", Some("catch" | "finally")) => self.structure_end(next),
            ("do", Some("while")) => self.statement_end(next),
            _ => Some(end),
        }
    }

    /// A statement ending in `}` may be the end of a structure that goes on
    /// (`}` line followed by `else`, `catch`, `finally` or a do-while tail).
    fn extend_over_continuations(&self, end: Pos) -> Option<Pos> {
        if self.view.char_at(end) != Some('}') {
            return Some(end);
        }
        let Some(next) = self.view.next_significant_after(end) else {
            return Some(end);
        };
        match self.view.word_at(next).map(|(w, _)| w).as_deref() {
            Some("else" | "catch" | "finally") => self.structure_end(next),
            Some("while") => {
                let (_, after) = self.view.word_at(next)?;
                if self.is_do_while_tail(after) {
                    self.statement_end(next)
                } else {
                    Some(end)
                }
            }
            _ => Some(end),
        }
    }

    /// Terminator of the statement starting at `start`: the first `;` or
    /// closing `}` at nesting depth zero, or a `{` at depth zero that opens
    /// a block rather than an initializer.
    fn statement_end(&self, start: Pos) -> Option<Pos> {
        let mut depth = 0usize;
        let mut initializer = false;
        let mut cur = start;
        loop {
            let c = self.view.char_at(cur)?;
            match c {
                '(' | '[' => depth += 1,
                ')' | ']' => depth = depth.saturating_sub(1),
                '{' if depth == 0 && !initializer => return Some(cur),
                '{' => depth += 1,
                '}' if depth == 0 => return Some(cur),
                '}' => depth -= 1,
                ';' if depth == 0 => return Some(cur),
                '=' if depth == 0 => initializer = true,
                c if depth == 0 && (c.is_alphabetic() || c == '_') => {
                    let starts_word = cur.col == 0
                        || self
                            .view
                            .char_at(Pos {
                                line: cur.line,
                                col: cur.col - 1,
                            })
                            .map_or(true, |p| !(p.is_alphanumeric() || p == '_'));
                    if starts_word {
                        if let Some((word, after)) = self.view.word_at(cur) {
                            if word == "new" || word == "return" {
                                initializer = true;
                            }
                            // Jump to the last char of the word.
                            cur = Pos {
                                line: after.line,
                                col: after.col - 1,
                            };
                        }
                    }
                }
                _ => {}
            }
            cur = self.view.advance(cur)?;
        }
    }
}

/// Outcome of resolving every point of one artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Placements in output order: ascending insertion index, ties by line
    /// then probe id.
    pub placements: Vec<Placement>,
    pub failures: Vec<PlacementError>,
}

/// Resolves all points; a failing point never affects the others.
pub fn resolve_all<S: AsRef<str>>(lines: &[S], points: &[TrackingPoint]) -> Resolution {
    let resolver = Resolver::new(lines);
    let mut resolution = Resolution::default();
    for point in points {
        match resolver.resolve(point) {
            Ok(placement) => {
                tracing::debug!(
                    probe = %placement.probe_id,
                    line = placement.line_number,
                    insert_after = placement.insert_after,
                    kind = ?placement.kind,
                    "placed probe"
                );
                resolution.placements.push(placement);
            }
            Err(err) => resolution.failures.push(err),
        }
    }
    resolution
        .placements
        .sort_by_key(|p| (p.insert_after, p.line_number, p.probe_id));
    resolution
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lines(src: &str) -> Vec<&str> {
        src.lines().collect()
    }

    fn place(src: &str, line: usize) -> Result<Placement, PlacementError> {
        Resolver::new(&lines(src)).resolve(&TrackingPoint::new(line, ProbeId(1), ["x"]))
    }

    fn after(src: &str, line: usize) -> usize {
        place(src, line).unwrap().insert_after
    }

    // ------------------------------------------------------------------
    // Plain statements
    // ------------------------------------------------------------------

    #[test]
    fn terminated_statement_places_on_next_line() {
        let src = "int x = 1;\nint y = 2;\n";
        assert_eq!(after(src, 1), 1);
        assert_eq!(place(src, 1).unwrap().kind, PlacementKind::AfterStatement);
    }

    #[test]
    fn multi_line_statement_extends_to_terminator() {
        let src = "int total = Add(1,\n    2,\n    3);\nint y = 0;";
        assert_eq!(after(src, 1), 3);
    }

    #[test]
    fn array_initializer_is_not_a_block() {
        let src = "int[,] m = {\n  {1, 2},\n  {3, 4}\n};\nx++;";
        assert_eq!(after(src, 1), 4);
        let src = "return new int[] {\n 1 };";
        assert_eq!(after(src, 1), 2);
    }

    #[test]
    fn semicolons_in_literals_do_not_terminate() {
        let src = "Console.WriteLine(\"a;\" +\n  \"b\");";
        assert_eq!(after(src, 1), 2);
    }

    #[test]
    fn unterminated_statement_fails() {
        let src = "int x = 1;\nint y = Compute(1,\n  2";
        let err = place(src, 2).unwrap_err();
        assert_eq!(
            err,
            PlacementError::Unterminated {
                probe_id: ProbeId(1),
                line: 2
            }
        );
    }

    #[test]
    fn out_of_range_lines_fail() {
        let src = "int x = 1;";
        assert!(matches!(place(src, 0), Err(PlacementError::OutOfRange { .. })));
        assert!(matches!(
            place(src, 2),
            Err(PlacementError::OutOfRange { line: 2, line_count: 1, .. })
        ));
    }

    #[test]
    fn method_signature_places_inside_body() {
        let src = "static void Main()\n{\n  int x = 1;\n}";
        assert_eq!(after(src, 1), 2);
    }

    // ------------------------------------------------------------------
    // Control structures
    // ------------------------------------------------------------------

    #[test]
    fn for_block_places_after_closing_brace() {
        let src = "int sum = 0;\nfor (int i = 0; i < 3; i++)\n{\n    sum += i;\n}\nConsole.WriteLine(sum);";
        let p = place(src, 2).unwrap();
        assert_eq!(p.insert_after, 5);
        assert_eq!(p.kind, PlacementKind::AfterStructure { header_line: 2 });
        // The lone brace resolves as its header.
        assert_eq!(after(src, 3), 5);
    }

    #[test]
    fn statement_inside_block_stays_inside() {
        let src = "for (int i = 0; i < 3; i++) {\n    sum += i;\n}";
        assert_eq!(after(src, 2), 2);
    }

    #[test]
    fn braceless_body_places_after_body() {
        let src = "for (int i = 0; i < 3; i++)\n    sum += i;\nint z;";
        assert_eq!(after(src, 1), 2);
        // Tracking the body itself still places after the loop.
        assert_eq!(after(src, 2), 2);
        assert_eq!(
            place(src, 2).unwrap().kind,
            PlacementKind::AfterStructure { header_line: 1 }
        );
    }

    #[test]
    fn nested_braceless_headers_resolve_recursively() {
        let src = "for (int i = 0; i < 3; i++)\n  if (i > 1)\n    sum += i;\nint z;";
        assert_eq!(after(src, 1), 3);
    }

    #[test]
    fn if_else_chain_is_one_structure() {
        let src = "if (a) {\n  x = 1;\n} else if (b) {\n  x = 2;\n}\nelse\n{\n  x = 3;\n}\nint z;";
        assert_eq!(after(src, 1), 9);
        // `} else if` line places after the rest of the chain.
        assert_eq!(after(src, 3), 9);
    }

    #[test]
    fn closing_brace_before_else_moves_past_the_chain() {
        let src = "if (a) {\n  x = 1;\n}\nelse {\n  x = 2;\n}\nint z;";
        assert_eq!(after(src, 3), 6);
    }

    #[test]
    fn braceless_if_else_is_chained() {
        let src = "if (a)\n  x = 1;\nelse\n  x = 2;\nint z;";
        assert_eq!(after(src, 1), 4);
    }

    #[test]
    fn try_catch_finally_is_one_structure() {
        let src = "try {\n  x = Parse(s);\n}\ncatch (FormatException e) when (e != null) {\n  x = 0;\n}\nfinally {\n  done = true;\n}\nint z;";
        assert_eq!(after(src, 1), 9);
    }

    #[test]
    fn do_while_includes_its_tail() {
        let src = "do {\n  x++;\n} while (x < 3);\nint z;";
        assert_eq!(after(src, 1), 3);
        // A do-while tail is a plain statement.
        assert_eq!(place(src, 3).unwrap().kind, PlacementKind::AfterStatement);
    }

    #[test]
    fn braces_in_literals_do_not_affect_block_matching() {
        let src = "while (x < 3) {\n  Console.Write(\"}\"); // }\n  x++;\n}\nint z;";
        assert_eq!(after(src, 1), 4);
    }

    #[test]
    fn unclosed_block_is_unterminated() {
        let src = "for (;;) {\n  x++;\n";
        assert!(matches!(
            place(src, 1),
            Err(PlacementError::Unterminated { line: 1, .. })
        ));
    }

    // ------------------------------------------------------------------
    // Batch resolution
    // ------------------------------------------------------------------

    #[test]
    fn failing_point_does_not_affect_others() {
        let src = "int x = 1;\nx++;\n";
        let points = vec![
            TrackingPoint::new(2, ProbeId(2), ["x"]),
            TrackingPoint::new(40, ProbeId(1), ["x"]),
            TrackingPoint::new(1, ProbeId(3), ["x"]),
        ];
        let resolution = resolve_all(&lines(src), &points);
        assert_eq!(resolution.failures.len(), 1);
        assert_eq!(resolution.failures[0].probe_id(), ProbeId(1));
        let order: Vec<ProbeId> = resolution.placements.iter().map(|p| p.probe_id).collect();
        assert_eq!(order, vec![ProbeId(3), ProbeId(2)]);
    }

    #[test]
    fn ties_order_by_line_then_probe() {
        let src = "for (int i = 0; i < 3; i++)\n{\n  x++;\n}\n";
        let points = vec![
            TrackingPoint::new(2, ProbeId(5), ["x"]),
            TrackingPoint::new(1, ProbeId(9), ["x"]),
            TrackingPoint::new(1, ProbeId(4), ["x"]),
        ];
        let resolution = resolve_all(&lines(src), &points);
        let order: Vec<(usize, ProbeId)> = resolution
            .placements
            .iter()
            .map(|p| (p.line_number, p.probe_id))
            .collect();
        assert_eq!(
            order,
            vec![(1, ProbeId(4)), (1, ProbeId(9)), (2, ProbeId(5))]
        );
        assert!(resolution.placements.iter().all(|p| p.insert_after == 4));
    }

    proptest! {
        /// Every line of a run of simple statements places right after itself.
        #[test]
        fn simple_statements_place_after_themselves(
            count in 1usize..30,
            target in 0usize..30,
        ) {
            let src: String = (0..count).map(|i| format!("int v{i} = {i};\n")).collect();
            let target = target % count + 1;
            prop_assert_eq!(after(&src, target), target);
        }

        /// A probe on a loop header never lands inside the loop body.
        #[test]
        fn loop_probe_lands_after_body(body_len in 0usize..10, lead in 0usize..5) {
            let mut src = String::new();
            for i in 0..lead {
                src.push_str(&format!("int a{i} = 0;\n"));
            }
            src.push_str("for (int i = 0; i < 3; i++)\n{\n");
            for i in 0..body_len {
                src.push_str(&format!("    b{i} += i;\n"));
            }
            src.push_str("}\nint tail = 0;\n");
            let header = lead + 1;
            let closing = header + body_len + 2;
            prop_assert_eq!(after(&src, header), closing);
        }
    }
}
