//! Records flowing through the pipeline: tracking points in, value and
//! mismatch records out, expected entries alongside.
//!
//! All records are immutable once built. Trace and mismatch records are
//! append-only artifacts of a single run.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::id::{ProbeId, Step};
use crate::value::{Rank, SerializedValue};

/// Where to place a probe and which variables it captures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingPoint {
    /// 1-based source line the probe is anchored to.
    pub line_number: usize,
    pub probe_id: ProbeId,
    /// Ordered and unique.
    pub variable_names: Vec<String>,
}

impl TrackingPoint {
    /// Builds a point, collapsing repeated variable names (first one wins).
    pub fn new<I, S>(line_number: usize, probe_id: ProbeId, variable_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let unique: IndexSet<String> = variable_names.into_iter().map(Into::into).collect();
        TrackingPoint {
            line_number,
            probe_id,
            variable_names: unique.into_iter().collect(),
        }
    }
}

/// One captured variable at one probe firing (one row, for matrices).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRecord {
    pub step: Step,
    pub probe_id: ProbeId,
    pub variable_name: String,
    /// Runtime type name (`Int32[]`), or `unknown` for a null value.
    pub type_name: String,
    pub rank: Rank,
    pub serialized_value: String,
}

impl ValueRecord {
    /// Expands a serialized value into its records, one per row.
    pub fn from_serialized(
        step: Step,
        probe_id: ProbeId,
        variable_name: &str,
        value: &SerializedValue,
    ) -> Vec<ValueRecord> {
        value
            .rows
            .iter()
            .map(|row| ValueRecord {
                step,
                probe_id,
                variable_name: variable_name.to_string(),
                type_name: value.type_name.clone(),
                rank: value.rank,
                serialized_value: row.clone(),
            })
            .collect()
    }
}

/// A value the learner expects a variable to hold at a given step and probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedValueEntry {
    pub step: Step,
    pub probe_id: ProbeId,
    pub variable_name: String,
    pub value: String,
}

/// A divergence between a captured value and the expected trace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MismatchRecord {
    pub step: Step,
    pub probe_id: ProbeId,
    pub line_number: usize,
    pub variable_name: String,
    pub actual_value: String,
    /// `None` when the expected trace is at a different probe for this step,
    /// so there is no value to compare against.
    pub expected_value: Option<String>,
}

impl MismatchRecord {
    pub fn is_divergent_probe(&self) -> bool {
        self.expected_value.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{ElementType, Scalar, TypedValue};

    #[test]
    fn tracking_point_dedups_names_keeping_order() {
        let p = TrackingPoint::new(12, ProbeId(1), ["sum", "i", "sum", "arr"]);
        assert_eq!(p.variable_names, vec!["sum", "i", "arr"]);
    }

    #[test]
    fn matrix_expands_to_consecutive_records() {
        let m = TypedValue::matrix(
            ElementType::Int,
            vec![
                vec![Scalar::Int(1), Scalar::Int(2)],
                vec![Scalar::Int(3), Scalar::Int(4)],
            ],
        )
        .unwrap();
        let records = ValueRecord::from_serialized(Step(4), ProbeId(2), "m", &m.serialize());
        assert_eq!(records.len(), 2);
        assert!(records
            .iter()
            .all(|r| r.step == Step(4) && r.probe_id == ProbeId(2) && r.variable_name == "m"));
        assert_eq!(records[0].serialized_value, "1,2");
        assert_eq!(records[1].serialized_value, "3,4");
    }
}
