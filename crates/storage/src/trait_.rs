//! Resource ledger trait abstraction.

use async_trait::async_trait;
use hive_core::{
    AggregatedStats, AnalysisId, BackendKey, NewWorker, ResourceClassId, ResourceUsage, Worker,
    WorkerId, WorkerStatus,
};
use tracing::{debug, warn};

/// Error type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur during ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The schema-version marker did not hold the version a migration expects.
    ///
    /// Nothing was applied; an operator has to look at the database.
    #[error("Schema version conflict: migration expects {expected}, database is at {found}")]
    MigrationConflict {
        /// Version the migration starts from
        expected: i64,
        /// Marker value found in the database
        found: String,
    },

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A stored value could not be interpreted
    #[error("Invalid data: {0}")]
    Invalid(String),
}

/// Persistence for workers and their resource usage.
///
/// Rows are partitioned by worker id, so independent workers never contend
/// on the same record.
#[async_trait]
pub trait Ledger: Send + Sync {
    // === Reference data ===

    /// Current value of the schema-version marker.
    async fn schema_version(&self) -> Result<i64>;

    /// Register a resource class.
    async fn add_resource_class(&self, name: &str) -> Result<ResourceClassId>;

    /// Register an analysis that requests capacity through `resource_class`.
    async fn add_analysis(
        &self,
        logic_name: &str,
        resource_class: ResourceClassId,
    ) -> Result<AnalysisId>;

    // === Worker operations ===

    /// Register a dispatched worker.
    async fn create_worker(&self, worker: &NewWorker) -> Result<Worker>;

    /// Load a worker by ID.
    async fn load_worker(&self, id: WorkerId) -> Result<Option<Worker>>;

    /// Resolve a backend's name for a process back to the worker.
    async fn find_worker_by_backend(&self, key: &BackendKey) -> Result<Option<Worker>>;

    /// Move a worker to a new lifecycle state.
    ///
    /// Moving to [`WorkerStatus::Dead`] also stamps the time of death.
    async fn set_worker_status(&self, id: WorkerId, status: WorkerStatus) -> Result<()>;

    /// Record where the worker keeps its logs.
    async fn set_worker_log_dir(&self, id: WorkerId, log_dir: &str) -> Result<()>;

    /// Delete a worker together with its usage record.
    ///
    /// Returns whether a worker was removed.
    async fn delete_worker(&self, id: WorkerId) -> Result<bool>;

    // === Resource usage ===

    /// Store the usage reported for a worker, replacing any earlier report.
    async fn record_usage(&self, id: WorkerId, usage: &ResourceUsage) -> Result<()>;

    /// Load the usage record of a worker.
    ///
    /// `None` means nothing was ever reported; a record whose fields are all
    /// `None` means a report arrived without figures.
    async fn load_usage(&self, id: WorkerId) -> Result<Option<ResourceUsage>>;

    /// Per-analysis usage report, computed from the live rows.
    async fn aggregated_stats(&self) -> Result<Vec<AggregatedStats>>;

    /// Store usage reported by a backend that only knows its own names.
    ///
    /// Returns the worker the report was attached to, or `None` when no
    /// worker matches the key.
    async fn record_usage_for_backend(
        &self,
        key: &BackendKey,
        usage: &ResourceUsage,
    ) -> Result<Option<WorkerId>> {
        let Some(worker) = self.find_worker_by_backend(key).await? else {
            debug!("No worker registered for {}", key);
            return Ok(None);
        };

        self.record_usage(worker.id, usage).await?;
        Ok(Some(worker.id))
    }
}

/// Record usage without letting a ledger failure escape.
///
/// Worker teardown must go on even when the database is unreachable, so
/// the error is logged and reported as `false`.
pub async fn record_usage_best_effort(
    ledger: &dyn Ledger,
    id: WorkerId,
    usage: &ResourceUsage,
) -> bool {
    match ledger.record_usage(id, usage).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Could not record resource usage for worker {}: {}", id, e);
            false
        }
    }
}
