//! Compiles and runs instrumented programs under a wall-clock bound.
//!
//! Each execution gets a fresh temporary workspace. The toolchain decides
//! how a source file becomes a process; the [`Runner`] owns the deadline,
//! output capture and classification into a [`RunOutcome`].
//!
//! # Modules
//!
//! - [`error`]: RunnerError for infrastructure failures
//! - [`diagnostics`]: compiler diagnostic parsing (csc/mcs format)
//! - [`toolchain`]: Toolchain trait and the argv-template CommandToolchain
//! - [`runner`]: Runner, requests and results

pub mod diagnostics;
pub mod error;
pub mod runner;
pub mod toolchain;

pub use diagnostics::{parse_diagnostics, Diagnostic, Severity};
pub use error::RunnerError;
pub use runner::{ExecutionRequest, ExecutionResult, RunOutcome, Runner, RunnerConfig};
pub use toolchain::{CommandToolchain, RunWorkspace, Toolchain};
