//! Artifact storage for submitted programs and their runs.
//!
//! Provides the [`ArtifactStore`] trait that all backends implement, plus
//! [`InMemoryStore`] and [`FsStore`] as first-class backends with the same
//! semantics.
//!
//! Every artifact is a text blob addressed by an [`ArtifactKey`]: the owner
//! (a code id or a run id) and the [`ArtifactKind`].
//!
//! # Modules
//!
//! - [`error`]: StorageError enum
//! - [`types`]: ArtifactKey and ArtifactKind
//! - [`traits`]: ArtifactStore trait definition
//! - [`memory`]: InMemoryStore implementation
//! - [`fs`]: FsStore implementation, one file per artifact

pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;
pub mod types;

// Re-export key types for ergonomic use.
pub use error::StorageError;
pub use fs::FsStore;
pub use memory::InMemoryStore;
pub use traits::ArtifactStore;
pub use types::{ArtifactKey, ArtifactKind};
