//! Job runnables for hive workers.
//!
//! A runnable is one job type. The worker picks it from the registry by
//! name and drives it through `fetch_input`, `run` and `write_output`.

#![warn(missing_docs)]

pub mod r#trait;
pub mod params;
pub mod connection;
pub mod system_cmd;
pub mod registry;

pub use r#trait::{CommandLine, JobContext, JobError, Result, Runnable};
pub use params::ParamStore;
pub use connection::{PooledConnection, ReleasedConnection};
pub use system_cmd::{decode_exit_status, SystemCmd};
pub use registry::{RunnableFactory, RunnableRegistry};
