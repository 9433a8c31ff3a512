//! Orchestration of the trace workflow for front ends.
//!
//! # Modules
//!
//! - [`error`]: ServiceError and its mapping from lower-level errors
//! - [`config`]: ServiceConfig read from the environment
//! - [`registry`]: ActiveRuns, one run per program at a time
//! - [`schema`]: request and response types
//! - [`service`]: TraceService, the single coordinator

pub mod config;
pub mod error;
pub mod registry;
pub mod schema;
pub mod service;

pub use config::ServiceConfig;
pub use error::{ErrorDetail, ServiceError};
pub use registry::{ActiveRun, ActiveRuns, RunGuard};
pub use schema::{
    ExpectedSummary, InstrumentReport, RunReport, UploadRequest, UploadResponse, VariableListing,
};
pub use service::TraceService;
