//! Step-aligned comparison of a captured trace against expected values.
//!
//! Captured values and expected entries are aligned on `(step, probe,
//! variable)`. For every captured value:
//!
//! - an expected entry with the same key and a different value is a
//!   mismatch with `expected_value: Some(..)` and yields a correction
//! - no entry with that key, but entries at the same step under another
//!   probe, means the program went somewhere the expected trace did not:
//!   a mismatch with `expected_value: None` and no correction
//! - otherwise nothing is reported
//!
//! Steps found on only one side become [`StepDiagnostic`]s. Every mismatch
//! goes through the run's dedup set, so comparing the same inputs twice
//! reports nothing new the second time.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use vartrace_core::{
    ExpectedValueEntry, MismatchRecord, ProbeId, Step, TrackingPoint, TypedValue,
};

use crate::collect::CapturedValue;
use crate::context::RunContext;

/// Expected entries indexed for lookup by step, probe and variable.
#[derive(Debug, Clone, Default)]
pub struct ExpectedIndex {
    values: HashMap<(Step, ProbeId, String), String>,
    probes_by_step: BTreeMap<Step, BTreeSet<ProbeId>>,
}

impl ExpectedIndex {
    /// Builds the index; for repeated keys the first entry wins.
    pub fn new(entries: &[ExpectedValueEntry]) -> Self {
        let mut index = ExpectedIndex::default();
        for entry in entries {
            index
                .values
                .entry((entry.step, entry.probe_id, entry.variable_name.clone()))
                .or_insert_with(|| entry.value.trim().to_string());
            index
                .probes_by_step
                .entry(entry.step)
                .or_default()
                .insert(entry.probe_id);
        }
        index
    }

    pub fn value(&self, step: Step, probe_id: ProbeId, variable: &str) -> Option<&str> {
        self.values
            .get(&(step, probe_id, variable.to_string()))
            .map(String::as_str)
    }

    /// Probes the expected trace visits at `step`.
    pub fn probes_at(&self, step: Step) -> Option<&BTreeSet<ProbeId>> {
        self.probes_by_step.get(&step)
    }

    /// Whether the expected trace is at some other probe at `step`.
    pub fn diverges_at(&self, step: Step, probe_id: ProbeId) -> bool {
        self.probes_at(step)
            .is_some_and(|probes| !probes.is_empty() && !probes.contains(&probe_id))
    }

    pub fn steps(&self) -> impl Iterator<Item = Step> + '_ {
        self.probes_by_step.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A value the learner's trace says a variable should have held.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub step: Step,
    pub probe_id: ProbeId,
    pub variable_name: String,
    pub value: TypedValue,
}

/// A step present on only one side of the comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepDiagnostic {
    /// Captured, but not in the expected trace.
    Extra { step: Step },
    /// Expected, but never captured.
    Missing { step: Step },
}

/// Result of one comparison pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// Newly emitted mismatches, in trace order.
    pub mismatches: Vec<MismatchRecord>,
    pub corrections: Vec<Correction>,
    pub step_diagnostics: Vec<StepDiagnostic>,
}

impl ComparisonReport {
    pub fn correction(&self, step: Step, probe_id: ProbeId, variable: &str) -> Option<&TypedValue> {
        self.corrections
            .iter()
            .find(|c| c.step == step && c.probe_id == probe_id && c.variable_name == variable)
            .map(|c| &c.value)
    }

    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty() && self.step_diagnostics.is_empty()
    }
}

/// Compares captured values against one expected submission.
#[derive(Debug, Clone)]
pub struct Comparator {
    expected: ExpectedIndex,
    lines: HashMap<ProbeId, usize>,
}

/// How a captured value relates to its expected entry.
enum Verdict {
    Equal,
    Differs(Option<TypedValue>),
}

impl Comparator {
    /// `points` supply the source line reported for each probe.
    pub fn new(points: &[TrackingPoint], expected: &[ExpectedValueEntry]) -> Self {
        Comparator {
            expected: ExpectedIndex::new(expected),
            lines: points.iter().map(|p| (p.probe_id, p.line_number)).collect(),
        }
    }

    pub fn expected(&self) -> &ExpectedIndex {
        &self.expected
    }

    pub fn compare(&self, ctx: &RunContext, captured: &[CapturedValue]) -> ComparisonReport {
        let mut report = ComparisonReport::default();

        for value in captured {
            let line_number = self.lines.get(&value.probe_id).copied().unwrap_or(0);
            let actual = value.text();

            if let Some(expected) =
                self.expected
                    .value(value.step, value.probe_id, &value.variable_name)
            {
                let Verdict::Differs(correction) = judge(value, expected) else {
                    continue;
                };
                let record = MismatchRecord {
                    step: value.step,
                    probe_id: value.probe_id,
                    line_number,
                    variable_name: value.variable_name.clone(),
                    actual_value: actual,
                    expected_value: Some(expected.to_string()),
                };
                if ctx.first_emission(&record) {
                    tracing::debug!(run = %ctx.run_id(), mismatch = %record.to_line(), "value mismatch");
                    if let Some(typed) = correction {
                        report.corrections.push(Correction {
                            step: value.step,
                            probe_id: value.probe_id,
                            variable_name: value.variable_name.clone(),
                            value: typed,
                        });
                    }
                    report.mismatches.push(record);
                }
            } else if self.expected.diverges_at(value.step, value.probe_id) {
                let record = MismatchRecord {
                    step: value.step,
                    probe_id: value.probe_id,
                    line_number,
                    variable_name: value.variable_name.clone(),
                    actual_value: actual,
                    expected_value: None,
                };
                if ctx.first_emission(&record) {
                    tracing::debug!(run = %ctx.run_id(), mismatch = %record.to_line(), "trace diverged");
                    report.mismatches.push(record);
                }
            }
        }

        report.step_diagnostics = self.step_diagnostics(captured);
        report
    }

    fn step_diagnostics(&self, captured: &[CapturedValue]) -> Vec<StepDiagnostic> {
        let captured_steps: BTreeSet<Step> = captured.iter().map(|v| v.step).collect();
        let expected_steps: BTreeSet<Step> = self.expected.steps().collect();
        let extra = captured_steps
            .difference(&expected_steps)
            .map(|&step| StepDiagnostic::Extra { step });
        let missing = expected_steps
            .difference(&captured_steps)
            .map(|&step| StepDiagnostic::Missing { step });
        extra.chain(missing).collect()
    }
}

/// Typed comparison when the captured type is known and both sides decode,
/// textual otherwise. A correction is produced only from a typed decode.
fn judge(value: &CapturedValue, expected: &str) -> Verdict {
    if let Some(ty) = value.value_type() {
        match (value.typed(), ty.parse(expected)) {
            (Ok(actual), Ok(wanted)) => {
                return if actual == wanted {
                    Verdict::Equal
                } else {
                    Verdict::Differs(Some(wanted))
                };
            }
            (Ok(_), Err(err)) => {
                tracing::warn!(
                    variable = %value.variable_name,
                    step = %value.step,
                    "expected value does not decode as {}: {}",
                    ty,
                    err
                );
                return Verdict::Differs(None);
            }
            (Err(_), _) => {}
        }
    }
    if value.text() == expected {
        Verdict::Equal
    } else {
        Verdict::Differs(None)
    }
}
