//! Per-run state: the step counter and the mismatch dedup set.
//!
//! A [`RunContext`] is created fresh for every run and shared (behind an
//! `Arc`) by everything that fires probes or emits mismatches for that run.
//! Nothing here is global, so concurrent runs never see each other's steps.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashSet;
use vartrace_core::{MismatchRecord, ProbeId, RunId, Step};

/// Dedup key of a mismatch: `(step, probe, line, variable, expected)`, where
/// an absent expected value stands for "diverged to another probe".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MismatchKey {
    pub step: Step,
    pub probe_id: ProbeId,
    pub line_number: usize,
    pub variable_name: String,
    pub expected_value: Option<String>,
}

impl From<&MismatchRecord> for MismatchKey {
    fn from(record: &MismatchRecord) -> Self {
        MismatchKey {
            step: record.step,
            probe_id: record.probe_id,
            line_number: record.line_number,
            variable_name: record.variable_name.clone(),
            expected_value: record.expected_value.clone(),
        }
    }
}

/// State owned by one run.
#[derive(Debug)]
pub struct RunContext {
    run_id: RunId,
    step: AtomicU64,
    seen: DashSet<MismatchKey>,
}

impl RunContext {
    /// A fresh context with a new random run id.
    pub fn new() -> Self {
        Self::with_id(RunId::new())
    }

    pub fn with_id(run_id: RunId) -> Self {
        RunContext {
            run_id,
            step: AtomicU64::new(0),
            seen: DashSet::new(),
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Allocates the next step; the first call returns step 1.
    pub fn next_step(&self) -> Step {
        Step(self.step.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// The last step handed out (0 before any probe fired).
    pub fn current_step(&self) -> Step {
        Step(self.step.load(Ordering::SeqCst))
    }

    /// Records `record` as emitted. Returns `false` if an equivalent
    /// mismatch was already emitted in this run.
    pub fn first_emission(&self, record: &MismatchRecord) -> bool {
        self.seen.insert(MismatchKey::from(record))
    }

    /// Number of distinct mismatches emitted so far.
    pub fn emitted(&self) -> usize {
        self.seen.len()
    }
}

impl Default for RunContext {
    fn default() -> Self {
        RunContext::new()
    }
}
