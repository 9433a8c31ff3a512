//! C# text emitted into the learner's program: probe calls, read-back
//! statements and the entry-point initialization call.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use vartrace_core::{ProbeId, TrackingPoint};

use crate::placement::Placement;
use crate::source::{CodeView, Pos};
use crate::tracker::TRACKER_CLASS;
use crate::type_index::TypeIndex;

static ENTRY_POINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bstatic\b[^;=(]*\bMain\s*\(").expect("entry point pattern is valid")
});

/// Statement that resets the tracker at program start.
pub fn init_statement() -> String {
    format!("{TRACKER_CLASS}.Initialize();")
}

/// Name of the local holding one probe's corrections.
pub fn corrections_local(probe_id: ProbeId, ordinal: usize) -> String {
    format!("__vt_{}_{}", probe_id, ordinal)
}

/// The generated statements for one placed probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeBlock {
    pub probe_id: ProbeId,
    /// Statements without indentation, in emission order.
    pub statements: Vec<String>,
    /// Variables passed to the tracker.
    pub captured: Vec<String>,
    /// Variables declared inside the skipped structure, out of scope at the
    /// placement.
    pub dropped: Vec<String>,
    /// Captured variables without a read-back (unknown type or not assignable).
    pub read_only: Vec<String>,
}

/// Emits probe statements using declared types from a [`TypeIndex`].
#[derive(Debug)]
pub struct ProbeGenerator<'a> {
    index: &'a TypeIndex,
    emitted: usize,
}

impl<'a> ProbeGenerator<'a> {
    pub fn new(index: &'a TypeIndex) -> Self {
        ProbeGenerator { index, emitted: 0 }
    }

    /// Generates the probe for `point` at `placement`.
    pub fn generate(&mut self, point: &TrackingPoint, placement: &Placement) -> ProbeBlock {
        let (captured, dropped): (Vec<String>, Vec<String>) =
            point.variable_names.iter().cloned().partition(|name| {
                placement.structure_span().map_or(true, |(first, last)| {
                    !self.index.is_scoped_within(name, first, last)
                })
            });
        if !dropped.is_empty() {
            tracing::warn!(
                probe = %point.probe_id,
                line = point.line_number,
                dropped = ?dropped,
                "variables declared inside the structure are out of scope after it; not captured"
            );
        }

        let mut block = ProbeBlock {
            probe_id: point.probe_id,
            statements: Vec::new(),
            captured: Vec::new(),
            dropped,
            read_only: Vec::new(),
        };

        if captured.is_empty() {
            // Still fire so the step sequence matches the expected trace.
            block.statements.push(format!(
                "{TRACKER_CLASS}.Track({}, {});",
                point.probe_id, point.line_number
            ));
            return block;
        }

        let local = corrections_local(point.probe_id, self.emitted);
        self.emitted += 1;
        let args: Vec<String> = captured
            .iter()
            .map(|name| format!("(\"{name}\", (object){name})"))
            .collect();
        block.statements.push(format!(
            "var {local} = {TRACKER_CLASS}.Track({}, {}, {});",
            point.probe_id,
            point.line_number,
            args.join(", ")
        ));

        for name in &captured {
            let cast = self
                .index
                .cast_type(name)
                .filter(|_| self.index.is_assignable(name));
            match cast {
                Some(ty) => block.statements.push(format!(
                    "if ({local}.ContainsKey(\"{name}\")) {name} = ({}){local}[\"{name}\"];",
                    ty.csharp_name()
                )),
                None => block.read_only.push(name.clone()),
            }
        }
        block.captured = captured;
        block
    }
}

/// Position of the opening `{` of the program's `static ... Main(...)`.
pub fn find_entry_point(view: &CodeView) -> Option<Pos> {
    (0..view.line_count()).find_map(|line| {
        let text = view.line_text(line);
        let m = ENTRY_POINT.find(&text)?;
        let paren = Pos {
            line,
            col: text[..m.end()].chars().count() - 1,
        };
        let close = view.matching_close(paren)?;
        let brace = view.next_significant_after(close)?;
        (view.char_at(brace) == Some('{')).then_some(brace)
    })
}
