//! Core error types for vartrace-core.
//!
//! Uses `thiserror` for structured, matchable variants covering value
//! parsing and wire-format decoding.

use thiserror::Error;

use crate::value::ValueType;

/// Errors produced by the vartrace-core crate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Text could not be parsed as a value of the requested type.
    #[error("cannot parse '{text}' as {expected}: {reason}")]
    ValueParse {
        text: String,
        expected: ValueType,
        reason: String,
    },

    /// A matrix whose rows have different lengths.
    #[error("ragged matrix: row {row} has {actual} columns, expected {expected}")]
    RaggedMatrix {
        row: usize,
        expected: usize,
        actual: usize,
    },

    /// A matrix with rows but no columns; its row count cannot be written
    /// to the trace.
    #[error("matrix has {rows} rows but no columns")]
    EmptyMatrixRows { rows: usize },

    /// A type name that does not map onto a supported element type.
    #[error("unsupported type name: '{name}'")]
    UnsupportedType { name: String },

    /// A delimited line did not decode into the expected record.
    #[error("malformed {kind} line {line_no}: {reason}")]
    MalformedLine {
        kind: &'static str,
        line_no: usize,
        reason: String,
    },

    #[error("invalid code id: '{raw}'")]
    InvalidCodeId { raw: String },

    #[error("invalid run id: '{raw}'")]
    InvalidRunId { raw: String },
}
