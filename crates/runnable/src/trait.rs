//! Runnable abstraction: the three-phase job lifecycle.

use async_trait::async_trait;
use hive_core::{DecodeError, ParamValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::connection::PooledConnection;
use crate::params::ParamStore;

/// Error type for job operations.
pub type Result<T> = std::result::Result<T, JobError>;

/// Errors that end the current job. None of them is retried here.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The job was not given what it needs to run
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A `#name#` marker referred to a parameter that is not set
    #[error("Unresolved parameter #{name}# in {text:?}")]
    Substitution {
        /// Parameter name inside the marker
        name: String,
        /// Text being substituted
        text: String,
    },

    /// The job payload looked encoded but did not parse
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The external command exited with a nonzero status
    #[error("Command `{command}` failed with exit code {code}")]
    ExecutionFailure {
        /// Command as executed
        command: String,
        /// Decoded exit code (`128 + n` when killed by signal `n`)
        code: i32,
    },

    /// I/O error (e.g. the command could not be spawned)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No runnable is registered under this name
    #[error("Unknown runnable: {0}")]
    UnknownRunnable(String),
}

impl JobError {
    /// Exit code carried by an [`JobError::ExecutionFailure`].
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            JobError::ExecutionFailure { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// A fully resolved command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandLine {
    /// Handed to a shell as one string
    Shell(String),
    /// Executed directly; the first element is the program
    Argv(Vec<String>),
}

impl CommandLine {
    /// Parameter form, as stored back into the job's parameters.
    pub fn to_param(&self) -> ParamValue {
        match self {
            CommandLine::Shell(s) => ParamValue::from(s.as_str()),
            CommandLine::Argv(argv) => ParamValue::from(argv.clone()),
        }
    }
}

impl std::fmt::Display for CommandLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandLine::Shell(s) => f.write_str(s),
            CommandLine::Argv(argv) => f.write_str(&argv.join(" ")),
        }
    }
}

/// Everything a runnable sees of the job it is working on.
///
/// The serializable part is what the framework persists between attempts;
/// the connection handle is process-local.
#[derive(Default, Serialize, Deserialize)]
pub struct JobContext {
    /// Job identifier, if the job came from a job table
    pub job_id: Option<i64>,

    /// Raw job payload as stored by the scheduler
    pub input_id: String,

    /// Job parameters
    pub params: ParamStore,

    /// Command line after substitution; reused by later attempts
    pub resolved_command: Option<CommandLine>,

    /// Shared database connection held by the worker
    #[serde(skip)]
    connection: Option<Arc<dyn PooledConnection>>,
}

impl JobContext {
    /// Create a context for a raw payload.
    pub fn new(input_id: impl Into<String>) -> Self {
        Self {
            input_id: input_id.into(),
            ..Default::default()
        }
    }

    /// Attach job parameters.
    pub fn with_params(mut self, params: BTreeMap<String, ParamValue>) -> Self {
        self.params.merge(params);
        self
    }

    /// Attach the worker's shared connection.
    pub fn with_connection(mut self, connection: Arc<dyn PooledConnection>) -> Self {
        self.connection = Some(connection);
        self
    }

    /// The worker's shared connection, if any.
    pub fn connection(&self) -> Option<Arc<dyn PooledConnection>> {
        self.connection.clone()
    }
}

/// A job type the worker can run.
#[async_trait]
pub trait Runnable: Send + Sync {
    /// Get runnable name.
    fn name(&self) -> &str;

    /// Parameter defaults, overridden by job values.
    fn param_defaults(&self) -> BTreeMap<String, ParamValue> {
        BTreeMap::new()
    }

    /// Read and check input; prepare everything `run` needs.
    async fn fetch_input(&self, ctx: &mut JobContext) -> Result<()>;

    /// Do the work.
    async fn run(&self, ctx: &mut JobContext) -> Result<()>;

    /// Turn results into pipeline data.
    async fn write_output(&self, ctx: &mut JobContext) -> Result<()>;

    /// Run all three phases in order, stopping at the first error.
    async fn life_cycle(&self, ctx: &mut JobContext) -> Result<()> {
        ctx.params.set_defaults(self.param_defaults());
        self.fetch_input(ctx).await?;
        self.run(ctx).await?;
        self.write_output(ctx).await
    }
}
