//! Error types for trace collection, comparison and in-process tracking.

use vartrace_core::{CoreError, ProbeId, RunId, Step};

/// Errors raised while checking a run's trace.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    /// A step number did not increase from one probe firing to the next.
    #[error("run {run_id}: step {found} at probe {probe_id} follows step {previous}")]
    StepOrder {
        run_id: RunId,
        probe_id: ProbeId,
        previous: Step,
        found: Step,
    },

    /// A captured or expected value could not be decoded.
    #[error(transparent)]
    Value(#[from] CoreError),

    /// Writing trace output failed.
    #[error("run {run_id}: trace write failed: {source}")]
    TraceWrite {
        run_id: RunId,
        #[source]
        source: std::io::Error,
    },
}
