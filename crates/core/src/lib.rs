//! Hive worker-side core.
//!
//! Pure building blocks shared by the scheduler, workers and reporting
//! tools: the job parameter codec, the `-name=value` argument tokenizer,
//! fan-out path placement, and the worker/resource-usage models.

#![warn(missing_docs)]

// Core identities
mod id;

// Parameters
mod param;
pub mod codec;
pub mod cmdline;

// Placement
pub mod paths;

// Worker accounting
mod worker;

// Re-exports
pub use id::*;
pub use param::ParamValue;
pub use codec::DecodeError;
pub use worker::{
    AggregatedStats, BackendKey, ExceptionStatus, NewWorker, ResourceUsage, Worker, WorkerStatus,
};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
