//! Instrumentation error types.

use serde::{Deserialize, Serialize};
use vartrace_core::ProbeId;

/// A tracking point that could not be placed.
///
/// Placement errors are per point: the pipeline records them in the report
/// and keeps instrumenting the remaining points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum PlacementError {
    /// The target line is 0 or past the end of the source.
    #[error("probe {probe_id}: line {line} is outside the source (1..={line_count})")]
    OutOfRange {
        probe_id: ProbeId,
        line: usize,
        line_count: usize,
    },

    /// No statement terminator was found between the target line and the
    /// end of the file.
    #[error("probe {probe_id}: statement starting at line {line} is never terminated")]
    Unterminated { probe_id: ProbeId, line: usize },
}

impl PlacementError {
    pub fn probe_id(&self) -> ProbeId {
        match self {
            PlacementError::OutOfRange { probe_id, .. }
            | PlacementError::Unterminated { probe_id, .. } => *probe_id,
        }
    }
}

/// Errors that abort instrumentation of a whole artifact.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstrumentError {
    /// No `static ... Main(` signature with a body was found.
    #[error("no entry point found: expected a `static ... Main(...)` method")]
    EntryPointNotFound,

    /// Two tracking points share a probe id.
    #[error("probe id {0} is used by more than one tracking point")]
    DuplicateProbe(ProbeId),

    /// Every tracking point failed to place; the artifact would record nothing.
    #[error("none of the {} tracking point(s) could be placed", .0.len())]
    NothingPlaced(Vec<PlacementError>),
}
