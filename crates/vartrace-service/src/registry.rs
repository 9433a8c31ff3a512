//! Registry of runs in progress.
//!
//! A program is executed by at most one run at a time: its run artifacts
//! are superseded, never merged, so two overlapping runs would race on
//! them. [`ActiveRuns::begin`] claims the program and the returned
//! [`RunGuard`] releases it when dropped.

use std::sync::Arc;
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use vartrace_core::{CodeId, RunId};

use crate::error::ServiceError;

/// A run in progress.
#[derive(Debug, Clone)]
pub struct ActiveRun {
    pub run_id: RunId,
    pub started_at: Instant,
}

/// Programs currently being run, keyed by code id.
///
/// Backed by `DashMap` so concurrent tasks can claim and release programs
/// without a global lock.
#[derive(Debug, Clone, Default)]
pub struct ActiveRuns {
    runs: Arc<DashMap<CodeId, ActiveRun>>,
}

impl ActiveRuns {
    pub fn new() -> Self {
        ActiveRuns::default()
    }

    /// Claims `code_id` for `run_id`. Fails with `Conflict` while another
    /// run holds it.
    pub fn begin(&self, code_id: &CodeId, run_id: RunId) -> Result<RunGuard, ServiceError> {
        match self.runs.entry(code_id.clone()) {
            Entry::Occupied(existing) => Err(ServiceError::Conflict(format!(
                "program {} is already running as run {}",
                code_id.as_str(),
                existing.get().run_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(ActiveRun {
                    run_id,
                    started_at: Instant::now(),
                });
                Ok(RunGuard {
                    runs: Arc::clone(&self.runs),
                    code_id: code_id.clone(),
                })
            }
        }
    }

    pub fn get(&self, code_id: &CodeId) -> Option<ActiveRun> {
        self.runs.get(code_id).map(|entry| entry.clone())
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

/// Releases a claimed program on drop.
#[derive(Debug)]
pub struct RunGuard {
    runs: Arc<DashMap<CodeId, ActiveRun>>,
    code_id: CodeId,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.runs.remove(&self.code_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_conflicts_until_released() {
        let runs = ActiveRuns::new();
        let code = CodeId::parse("42").unwrap();
        let guard = runs.begin(&code, RunId::new()).unwrap();
        assert!(matches!(
            runs.begin(&code, RunId::new()),
            Err(ServiceError::Conflict(_))
        ));
        assert_eq!(runs.len(), 1);
        drop(guard);
        assert!(runs.is_empty());
        assert!(runs.begin(&code, RunId::new()).is_ok());
    }

    #[test]
    fn different_programs_run_side_by_side() {
        let runs = ActiveRuns::new();
        let _a = runs.begin(&CodeId::parse("a").unwrap(), RunId::new()).unwrap();
        let _b = runs.begin(&CodeId::parse("b").unwrap(), RunId::new()).unwrap();
        assert_eq!(runs.len(), 2);
    }
}
