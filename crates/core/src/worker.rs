//! Worker identity and resource accounting models.

use serde::{Deserialize, Serialize};
use crate::id::{AnalysisId, ResourceClassId, WorkerId};
use crate::Time;

/// How a backend names one worker process.
///
/// Backends report accounting asynchronously and only know their own
/// names, so this triple is what resolves a report back to a [`Worker`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackendKey {
    /// Execution backend type (e.g. `LOCAL`, `LSF`, `SLURM`)
    pub backend_type: String,

    /// Backend-local name (cluster or host)
    pub backend_name: String,

    /// Backend process id; text because array jobs use ids like `1234[7]`
    pub process_id: String,
}

impl BackendKey {
    /// Create a backend key.
    pub fn new(
        backend_type: impl Into<String>,
        backend_name: impl Into<String>,
        process_id: impl Into<String>,
    ) -> Self {
        Self {
            backend_type: backend_type.into(),
            backend_name: backend_name.into(),
            process_id: process_id.into(),
        }
    }
}

impl std::fmt::Display for BackendKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.backend_type, self.backend_name, self.process_id)
    }
}

/// Lifecycle state of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerStatus {
    /// Handed to the backend, not yet running
    Submitted,
    /// Running and waiting for a job
    Ready,
    /// Running a job
    Busy,
    /// Exited
    Dead,
}

impl WorkerStatus {
    /// Database spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            WorkerStatus::Submitted => "SUBMITTED",
            WorkerStatus::Ready => "READY",
            WorkerStatus::Busy => "BUSY",
            WorkerStatus::Dead => "DEAD",
        }
    }
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUBMITTED" => Ok(WorkerStatus::Submitted),
            "READY" => Ok(WorkerStatus::Ready),
            "BUSY" => Ok(WorkerStatus::Busy),
            "DEAD" => Ok(WorkerStatus::Dead),
            other => Err(format!("unknown worker status: {}", other)),
        }
    }
}

/// Fields needed to register a freshly dispatched worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWorker {
    /// Analysis the worker was dispatched for, if already specialized
    pub analysis_id: Option<AnalysisId>,

    /// Backend identity
    pub backend: BackendKey,
}

/// A registered worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    /// Unique identifier
    pub id: WorkerId,

    /// Owning analysis
    pub analysis_id: Option<AnalysisId>,

    /// Backend identity
    pub backend: BackendKey,

    /// Current lifecycle state
    pub status: WorkerStatus,

    /// When registered
    pub born: Time,

    /// When it exited
    pub died: Option<Time>,

    /// Directory holding this worker's logs
    pub log_dir: Option<String>,
}

/// Why a backend ended a worker, as far as the backend can tell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ExceptionStatus {
    /// Exceeded its memory limit
    MemLimit,
    /// Exceeded its run-time limit
    RunLimit,
    /// Killed by an operator
    KilledByUser,
    /// Died for a reason the backend could not classify
    Unknown,
    /// Backend-specific classification
    Other(String),
}

impl ExceptionStatus {
    /// Database spelling.
    pub fn as_str(&self) -> &str {
        match self {
            ExceptionStatus::MemLimit => "MEMLIMIT",
            ExceptionStatus::RunLimit => "RUNLIMIT",
            ExceptionStatus::KilledByUser => "KILLED_BY_USER",
            ExceptionStatus::Unknown => "UNKNOWN",
            ExceptionStatus::Other(s) => s,
        }
    }
}

impl From<String> for ExceptionStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "MEMLIMIT" => ExceptionStatus::MemLimit,
            "RUNLIMIT" => ExceptionStatus::RunLimit,
            "KILLED_BY_USER" => ExceptionStatus::KilledByUser,
            "UNKNOWN" => ExceptionStatus::Unknown,
            _ => ExceptionStatus::Other(s),
        }
    }
}

impl From<ExceptionStatus> for String {
    fn from(status: ExceptionStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for ExceptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource consumption reported for one worker after it exited.
///
/// Every field is optional: backends differ in what they can measure, and
/// a missing figure is stored as `NULL` rather than guessed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// Exit status as reported by the backend (e.g. `done`, `exit/137`)
    pub exit_status: Option<String>,

    /// Backend classification of an abnormal end
    pub exception_status: Option<ExceptionStatus>,

    /// Peak resident memory, MiB
    pub mem_megs: Option<f64>,

    /// Peak swap, MiB
    pub swap_megs: Option<f64>,

    /// Time spent queued before starting, seconds
    pub pending_sec: Option<f64>,

    /// CPU time, seconds
    pub cpu_sec: Option<f64>,

    /// Wall-clock lifespan, seconds
    pub lifespan_sec: Option<f64>,
}

impl ResourceUsage {
    /// True when the backend reported nothing at all.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// One row of the per-analysis resource report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedStats {
    /// `logic_name(analysis_id)`
    pub analysis: String,

    /// Analysis id, for sorting and joins
    pub analysis_id: AnalysisId,

    /// Execution backend; `None` when the analysis never had a worker
    pub backend_type: Option<String>,

    /// `name(resource_class_id)`
    pub resource_class: String,

    /// Resource class id
    pub resource_class_id: ResourceClassId,

    /// Workers in this group, with or without a usage record
    pub workers: i64,

    /// Smallest peak memory, MiB
    pub min_mem_megs: Option<f64>,
    /// Mean peak memory, MiB
    pub avg_mem_megs: Option<f64>,
    /// Largest peak memory, MiB
    pub max_mem_megs: Option<f64>,

    /// Smallest peak swap, MiB
    pub min_swap_megs: Option<f64>,
    /// Mean peak swap, MiB
    pub avg_swap_megs: Option<f64>,
    /// Largest peak swap, MiB
    pub max_swap_megs: Option<f64>,
}
