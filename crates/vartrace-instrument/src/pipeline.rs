//! The instrumentation pipeline: resolve placements, generate probes, and
//! splice them into the source together with the tracker runtime.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use vartrace_core::{ProbeId, TrackingPoint};

use crate::codegen::{find_entry_point, init_statement, ProbeGenerator};
use crate::error::{InstrumentError, PlacementError};
use crate::placement::{resolve_all, Placement};
use crate::source::CodeView;
use crate::tracker::{missing_usings, tracker_source};
use crate::type_index::TypeIndex;

static USING_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*using\s+([A-Za-z_][\w.]*)\s*;").expect("using pattern is valid")
});

const INDENT_STEP: &str = "    ";

/// A probe as it was placed in the artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedProbe {
    #[serde(flatten)]
    pub placement: Placement,
    pub captured: Vec<String>,
    pub dropped: Vec<String>,
    pub read_only: Vec<String>,
}

/// An instrumented program plus what happened to each tracking point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentedArtifact {
    pub source: String,
    /// Probes in source order.
    pub probes: Vec<PlacedProbe>,
    pub failures: Vec<PlacementError>,
    /// 1-based line of the entry point's opening brace in the original.
    pub entry_line: usize,
    /// blake3 hex digest of `source`.
    pub digest: String,
}

/// One block of lines spliced into the original at `at` (a 0-based index
/// into the original lines).
struct Edit {
    at: usize,
    /// Tie order among edits at the same index; lower comes first in the
    /// output.
    order: (u8, usize, ProbeId),
    lines: Vec<String>,
}

/// Instruments `source` with a probe per tracking point.
///
/// Points that cannot be placed are reported in
/// [`InstrumentedArtifact::failures`] and the rest are still instrumented.
pub fn instrument(
    source: &str,
    points: &[TrackingPoint],
) -> Result<InstrumentedArtifact, InstrumentError> {
    let mut seen = HashSet::new();
    if let Some(dup) = points.iter().find(|p| !seen.insert(p.probe_id)) {
        return Err(InstrumentError::DuplicateProbe(dup.probe_id));
    }

    let mut lines: Vec<String> = source.lines().map(str::to_string).collect();
    let view = CodeView::new(&lines);
    let entry = find_entry_point(&view).ok_or(InstrumentError::EntryPointNotFound)?;

    let resolution = resolve_all(&lines, points);
    for failure in &resolution.failures {
        tracing::warn!(probe = %failure.probe_id(), "skipping tracking point: {}", failure);
    }
    if !points.is_empty() && resolution.placements.is_empty() {
        return Err(InstrumentError::NothingPlaced(resolution.failures));
    }

    let index = TypeIndex::scan_lines(&lines.iter().map(String::as_str).collect::<Vec<_>>());
    let mut generator = ProbeGenerator::new(&index);
    let mut edits = Vec::new();
    let mut probes = Vec::new();

    for placement in &resolution.placements {
        let Some(point) = points.iter().find(|p| p.probe_id == placement.probe_id) else {
            continue;
        };
        let block = generator.generate(point, placement);
        let indent = indentation(&lines[placement.anchor_line() - 1]);
        edits.push(Edit {
            at: placement.insert_after,
            order: (1, placement.line_number, placement.probe_id),
            lines: block
                .statements
                .iter()
                .map(|s| format!("{indent}{s}"))
                .collect(),
        });
        probes.push(PlacedProbe {
            placement: placement.clone(),
            captured: block.captured,
            dropped: block.dropped,
            read_only: block.read_only,
        });
    }

    // Initialization goes first inside Main. Code after the brace on the
    // same line is kept after the call on that line.
    let brace_line = &lines[entry.line];
    let after_brace: String = brace_line.chars().skip(entry.col + 1).collect();
    if after_brace.trim().is_empty() {
        let indent = format!("{}{}", indentation(brace_line), INDENT_STEP);
        edits.push(Edit {
            at: entry.line + 1,
            order: (0, 0, ProbeId(0)),
            lines: vec![format!("{indent}{}", init_statement())],
        });
    } else {
        let head: String = brace_line.chars().take(entry.col + 1).collect();
        lines[entry.line] = format!("{head} {}{after_brace}", init_statement());
    }

    let existing: Vec<String> = lines
        .iter()
        .filter_map(|l| USING_DIRECTIVE.captures(l).map(|c| c[1].to_string()))
        .collect();
    let existing: Vec<&str> = existing.iter().map(String::as_str).collect();
    let usings = missing_usings(&existing);
    if !usings.is_empty() {
        edits.push(Edit {
            at: 0,
            order: (0, 0, ProbeId(0)),
            lines: usings.iter().map(|ns| format!("using {ns};")).collect(),
        });
    }

    // Apply from the highest index down so pending indices stay valid; at
    // equal indices the later splice lands first, so apply in reverse tie
    // order.
    edits.sort_by(|a, b| b.at.cmp(&a.at).then(b.order.cmp(&a.order)));
    for edit in edits {
        lines.splice(edit.at..edit.at, edit.lines);
    }

    let mut output = lines.join("\n");
    output.push('\n');
    output.push_str(&tracker_source());

    let digest = blake3::hash(output.as_bytes()).to_hex().to_string();
    tracing::info!(
        probes = probes.len(),
        failures = resolution.failures.len(),
        declarations = index.len(),
        digest = %digest,
        "instrumented source"
    );

    Ok(InstrumentedArtifact {
        source: output,
        probes,
        failures: resolution.failures,
        entry_line: entry.line + 1,
        digest,
    })
}

fn indentation(line: &str) -> String {
    line.chars().take_while(|c| c.is_whitespace()).collect()
}
