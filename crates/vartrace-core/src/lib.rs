//! Shared data model for vartrace: identifiers, typed values and their text
//! serialization, pipeline records, and the line formats of every artifact.

pub mod error;
pub mod id;
pub mod record;
pub mod value;
pub mod wire;

// Re-export commonly used types
pub use error::CoreError;
pub use id::{CodeId, ProbeId, RunId, Step};
pub use record::{ExpectedValueEntry, MismatchRecord, TrackingPoint, ValueRecord};
pub use value::{ElementType, Rank, Scalar, SerializedValue, TypedValue, ValueType};
pub use wire::{parse_expected_values, parse_tracking_spec, Decoded, SkippedLine};
