//! Trace collection: raw trace text into records and captured values.
//!
//! The trace is append-only and may be cut short (a timed-out run is killed
//! mid-write), so decoding is line by line and a bad line never stops the
//! rest from being read.

use serde::{Deserialize, Serialize};
use vartrace_core::{
    CoreError, ProbeId, Rank, RunId, SkippedLine, Step, TypedValue, ValueRecord, ValueType,
};

use crate::error::CheckError;

/// Type name written for a null value.
pub const NULL_TYPE_NAME: &str = "unknown";

/// One variable as captured by one probe firing. Matrices are reassembled
/// from their per-row records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedValue {
    pub step: Step,
    pub probe_id: ProbeId,
    pub variable_name: String,
    pub type_name: String,
    pub rank: Rank,
    /// Row payloads in emission order; one entry unless `rank` is matrix.
    pub rows: Vec<String>,
}

impl CapturedValue {
    fn start(record: ValueRecord) -> Self {
        CapturedValue {
            step: record.step,
            probe_id: record.probe_id,
            variable_name: record.variable_name,
            type_name: record.type_name,
            rank: record.rank,
            rows: vec![record.serialized_value],
        }
    }

    /// Whether `record` is the next row of this (matrix) value.
    fn continues_with(&self, record: &ValueRecord) -> bool {
        self.rank == Rank::Matrix
            && record.rank == Rank::Matrix
            && self.step == record.step
            && self.probe_id == record.probe_id
            && self.variable_name == record.variable_name
            && self.type_name == record.type_name
    }

    pub fn is_null(&self) -> bool {
        self.type_name == NULL_TYPE_NAME
    }

    /// Single-payload text: matrix rows joined by `;`.
    pub fn text(&self) -> String {
        self.rows.join(";")
    }

    /// The captured type, when the runtime type name is one we decode.
    pub fn value_type(&self) -> Option<ValueType> {
        if self.is_null() {
            return None;
        }
        ValueType::from_type_name(&self.type_name)
            .ok()
            .filter(|ty| ty.rank == self.rank)
    }

    /// Decodes the payload using the captured type.
    pub fn typed(&self) -> Result<TypedValue, CoreError> {
        let ty = ValueType::from_type_name(&self.type_name)?;
        ty.parse_rows(&self.rows)
    }
}

/// Everything decoded from one trace artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedTrace {
    pub records: Vec<ValueRecord>,
    pub values: Vec<CapturedValue>,
    pub skipped: Vec<SkippedLine>,
}

impl CollectedTrace {
    /// Distinct steps in trace order.
    pub fn steps(&self) -> Vec<Step> {
        let mut steps: Vec<Step> = self.values.iter().map(|v| v.step).collect();
        steps.dedup();
        steps
    }

    /// Checks that steps strictly increase from one probe firing to the
    /// next (records of one firing share a step).
    pub fn check_step_order(&self, run_id: RunId) -> Result<(), CheckError> {
        let mut previous: Option<(Step, ProbeId)> = None;
        for value in &self.values {
            if let Some((prev_step, prev_probe)) = previous {
                let same_firing = value.step == prev_step && value.probe_id == prev_probe;
                if !same_firing && value.step <= prev_step {
                    return Err(CheckError::StepOrder {
                        run_id,
                        probe_id: value.probe_id,
                        previous: prev_step,
                        found: value.step,
                    });
                }
            }
            previous = Some((value.step, value.probe_id));
        }
        Ok(())
    }

    pub fn steps_increasing(&self) -> bool {
        self.check_step_order(RunId::default()).is_ok()
    }
}

/// Decodes a trace. Blank lines are ignored; malformed lines are logged
/// and kept in [`CollectedTrace::skipped`].
pub fn collect(text: &str) -> CollectedTrace {
    let mut trace = CollectedTrace::default();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match ValueRecord::parse_line(line, idx + 1) {
            Ok(record) => trace.records.push(record),
            Err(err) => {
                tracing::warn!(line_no = idx + 1, "skipping malformed trace line: {}", err);
                trace.skipped.push(SkippedLine {
                    line_no: idx + 1,
                    content: line.to_string(),
                    reason: err.to_string(),
                });
            }
        }
    }
    trace.values = group_values(&trace.records);
    tracing::debug!(
        records = trace.records.len(),
        values = trace.values.len(),
        skipped = trace.skipped.len(),
        "collected trace"
    );
    trace
}

fn group_values(records: &[ValueRecord]) -> Vec<CapturedValue> {
    let mut values: Vec<CapturedValue> = Vec::new();
    for record in records {
        match values.last_mut() {
            Some(current) if current.continues_with(record) => {
                current.rows.push(record.serialized_value.clone())
            }
            _ => values.push(CapturedValue::start(record.clone())),
        }
    }
    values
}
