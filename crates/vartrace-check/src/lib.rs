//! Trace checking: run-scoped state, trace collection, and comparison
//! against the learner's expected values.
//!
//! # Modules
//!
//! - [`context`] -- per-run step counter and mismatch dedup set
//! - [`collect`] -- trace text into records and captured values
//! - [`compare`] -- alignment with expected values, mismatches, corrections
//! - [`tracker`] -- in-process probe firing with the same wire format

pub mod collect;
pub mod compare;
pub mod context;
pub mod error;
pub mod tracker;

pub use collect::{collect, CapturedValue, CollectedTrace};
pub use compare::{Comparator, ComparisonReport, Correction, ExpectedIndex, StepDiagnostic};
pub use context::{MismatchKey, RunContext};
pub use error::CheckError;
pub use tracker::{Firing, Tracker};
