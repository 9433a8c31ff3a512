//! Source instrumentation for learner C# programs.
//!
//! Turns a program plus a list of [`TrackingPoint`](vartrace_core::TrackingPoint)s
//! into an instrumented program that reports variable state at each point.
//!
//! # Modules
//!
//! - [`source`] -- literal- and comment-aware view of the source text
//! - [`type_index`] -- declared-type index used for read-back casts
//! - [`placement`] -- where each probe goes
//! - [`codegen`] -- probe statements and the entry-point init call
//! - [`tracker`] -- the C# runtime appended to the program
//! - [`pipeline`] -- all of the above, end to end

pub mod codegen;
pub mod error;
pub mod pipeline;
pub mod placement;
pub mod source;
pub mod tracker;
pub mod type_index;

pub use error::{InstrumentError, PlacementError};
pub use pipeline::{instrument, InstrumentedArtifact, PlacedProbe};
pub use placement::{resolve_all, Placement, PlacementKind, Resolution, Resolver};
pub use type_index::{Declaration, TypeIndex};
