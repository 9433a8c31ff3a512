//! Request and response types for service operations.
//!
//! All responses derive `Serialize` so front ends can print them as JSON.

use serde::{Deserialize, Serialize};

use vartrace_check::{CapturedValue, Correction, StepDiagnostic};
use vartrace_core::{CodeId, MismatchRecord, RunId, SkippedLine};
use vartrace_instrument::{PlacedProbe, PlacementError};
use vartrace_runner::ExecutionResult;

/// Upload of a new program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRequest {
    pub code_id: String,
    /// Original file name; must end in `.cs`.
    pub file_name: String,
    pub source: String,
    /// Tracking points, one `line [probe] var...` per line.
    pub tracking_spec: String,
    /// Run the uninstrumented program once and reject it if it fails.
    #[serde(default)]
    pub verify: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub code_id: CodeId,
    pub tracking_points: usize,
    pub skipped_lines: Vec<SkippedLine>,
}

/// Result of instrumenting a stored program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentReport {
    pub code_id: CodeId,
    pub probes: Vec<PlacedProbe>,
    pub failures: Vec<PlacementError>,
    pub entry_line: usize,
    pub digest: String,
}

/// Result of an expected-values submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedSummary {
    pub code_id: CodeId,
    pub entries: usize,
    pub skipped_lines: Vec<SkippedLine>,
}

/// Everything one run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub code_id: CodeId,
    pub execution: ExecutionResult,
    pub values: Vec<CapturedValue>,
    pub mismatches: Vec<MismatchRecord>,
    pub corrections: Vec<Correction>,
    pub step_diagnostics: Vec<StepDiagnostic>,
    /// Trace lines that did not decode.
    pub skipped_lines: Vec<SkippedLine>,
    pub steps_increasing: bool,
}

/// Declared variables of a stored program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableListing {
    pub code_id: CodeId,
    /// `name - type` per variable.
    pub variables: Vec<String>,
}
