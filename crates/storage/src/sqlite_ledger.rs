//! SQLite ledger backend.
//!
//! Workers, their resource usage and the reporting view live in one
//! SQLite database reached through an `sqlx` connection pool.

use async_trait::async_trait;
use hive_core::{
    AggregatedStats, AnalysisId, BackendKey, ExceptionStatus, NewWorker, ResourceClassId,
    ResourceUsage, Time, Worker, WorkerId, WorkerStatus,
};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};

use super::schema::{self, MigrationOutcome, MIGRATIONS};
use super::trait_::{Ledger, LedgerError, Result};

/// Connection settings for the SQLite ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// sqlx database URL (`sqlite://path/to/hive.db` or `sqlite::memory:`)
    pub database_url: String,

    /// Upper bound on pooled connections
    pub max_connections: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://hive.db".to_string(),
            max_connections: 4,
        }
    }
}

impl LedgerConfig {
    fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:") || self.database_url.contains("mode=memory")
    }
}

/// SQLite ledger implementation.
#[derive(Clone)]
pub struct SqliteLedger {
    /// Database connection pool
    pool: sqlx::SqlitePool,
}

const WORKER_COLUMNS: &str =
    "worker_id, analysis_id, backend_type, backend_name, process_id, status, born, died, log_dir";

impl SqliteLedger {
    /// Open (creating if needed) the database described by `config` and
    /// install the baseline tables. Migrations are not run; see [`migrate`].
    ///
    /// [`migrate`]: SqliteLedger::migrate
    pub async fn open(config: &LedgerConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to an in-memory database is a separate database,
        // so those get exactly one connection that is never recycled.
        let pool_options = if config.is_in_memory() {
            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(config.max_connections.max(1))
        };

        let pool = pool_options.connect_with(options).await?;
        let ledger = Self { pool };
        ledger.init_schema().await?;

        debug!("Opened ledger at {}", config.database_url);
        Ok(ledger)
    }

    /// Create an in-memory ledger with every migration applied, for testing.
    pub async fn in_memory() -> Result<Self> {
        let ledger = Self::open(&LedgerConfig {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
        })
        .await?;
        ledger.migrate().await?;
        Ok(ledger)
    }

    /// Initialize the baseline schema.
    async fn init_schema(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        schema::install_baseline(&mut conn).await
    }

    /// Run every pending migration in order.
    ///
    /// Returns [`MigrationOutcome::AlreadyApplied`] when the database was
    /// already current. A marker that matches no migration surfaces as
    /// [`LedgerError::MigrationConflict`].
    pub async fn migrate(&self) -> Result<MigrationOutcome> {
        let mut outcome = MigrationOutcome::AlreadyApplied;
        let current = self.schema_version().await?;

        for migration in MIGRATIONS.iter().filter(|m| m.to > current) {
            if migration.apply(&self.pool).await? == MigrationOutcome::Applied {
                outcome = MigrationOutcome::Applied;
            }
        }

        if outcome == MigrationOutcome::AlreadyApplied {
            info!("Ledger schema already at version {}", current);
        }
        Ok(outcome)
    }

    /// Access the underlying pool.
    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }

    /// Check if the database is reachable.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }

    fn worker_from_row(row: &SqliteRow) -> Result<Worker> {
        let status: String = row.try_get("status")?;
        Ok(Worker {
            id: WorkerId(row.try_get("worker_id")?),
            analysis_id: row.try_get::<Option<i64>, _>("analysis_id")?.map(AnalysisId),
            backend: BackendKey {
                backend_type: row.try_get("backend_type")?,
                backend_name: row.try_get("backend_name")?,
                process_id: row.try_get("process_id")?,
            },
            status: status.parse().map_err(LedgerError::Invalid)?,
            born: row.try_get::<Time, _>("born")?,
            died: row.try_get::<Option<Time>, _>("died")?,
            log_dir: row.try_get("log_dir")?,
        })
    }

    fn usage_from_row(row: &SqliteRow) -> Result<ResourceUsage> {
        Ok(ResourceUsage {
            exit_status: row.try_get("exit_status")?,
            exception_status: row
                .try_get::<Option<String>, _>("exception_status")?
                .map(ExceptionStatus::from),
            mem_megs: row.try_get("mem_megs")?,
            swap_megs: row.try_get("swap_megs")?,
            pending_sec: row.try_get("pending_sec")?,
            cpu_sec: row.try_get("cpu_sec")?,
            lifespan_sec: row.try_get("lifespan_sec")?,
        })
    }

    fn stats_from_row(row: &SqliteRow) -> Result<AggregatedStats> {
        Ok(AggregatedStats {
            analysis: row.try_get("analysis")?,
            analysis_id: AnalysisId(row.try_get("analysis_id")?),
            backend_type: row.try_get("backend_type")?,
            resource_class: row.try_get("resource_class")?,
            resource_class_id: ResourceClassId(row.try_get("resource_class_id")?),
            workers: row.try_get("workers")?,
            min_mem_megs: row.try_get("min_mem_megs")?,
            avg_mem_megs: row.try_get("avg_mem_megs")?,
            max_mem_megs: row.try_get("max_mem_megs")?,
            min_swap_megs: row.try_get("min_swap_megs")?,
            avg_swap_megs: row.try_get("avg_swap_megs")?,
            max_swap_megs: row.try_get("max_swap_megs")?,
        })
    }
}

#[async_trait]
impl Ledger for SqliteLedger {
    // === Reference data ===

    async fn schema_version(&self) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        schema::read_version(&mut conn).await
    }

    async fn add_resource_class(&self, name: &str) -> Result<ResourceClassId> {
        let result = sqlx::query("INSERT INTO ResourceClass (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(ResourceClassId(result.last_insert_rowid()))
    }

    async fn add_analysis(
        &self,
        logic_name: &str,
        resource_class: ResourceClassId,
    ) -> Result<AnalysisId> {
        let result = sqlx::query("INSERT INTO AnalysisBase (logic_name, resource_class_id) VALUES (?, ?)")
            .bind(logic_name)
            .bind(resource_class.get())
            .execute(&self.pool)
            .await?;

        Ok(AnalysisId(result.last_insert_rowid()))
    }

    // === Worker operations ===

    async fn create_worker(&self, worker: &NewWorker) -> Result<Worker> {
        let born = chrono::Utc::now();
        let status = WorkerStatus::Submitted;

        let result = sqlx::query(
            "INSERT INTO Worker (analysis_id, backend_type, backend_name, process_id, status, born)
            VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(worker.analysis_id.map(AnalysisId::get))
        .bind(worker.backend.backend_type.as_str())
        .bind(worker.backend.backend_name.as_str())
        .bind(worker.backend.process_id.as_str())
        .bind(status.as_str())
        .bind(born)
        .execute(&self.pool)
        .await?;

        let id = WorkerId(result.last_insert_rowid());
        debug!("Registered worker {} as {}", id, worker.backend);

        Ok(Worker {
            id,
            analysis_id: worker.analysis_id,
            backend: worker.backend.clone(),
            status,
            born,
            died: None,
            log_dir: None,
        })
    }

    async fn load_worker(&self, id: WorkerId) -> Result<Option<Worker>> {
        let sql = format!("SELECT {} FROM Worker WHERE worker_id = ?", WORKER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::worker_from_row).transpose()
    }

    async fn find_worker_by_backend(&self, key: &BackendKey) -> Result<Option<Worker>> {
        let sql = format!(
            "SELECT {} FROM Worker
            WHERE backend_type = ? AND backend_name = ? AND process_id = ?
            ORDER BY worker_id DESC LIMIT 1",
            WORKER_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(key.backend_type.as_str())
            .bind(key.backend_name.as_str())
            .bind(key.process_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::worker_from_row).transpose()
    }

    async fn set_worker_status(&self, id: WorkerId, status: WorkerStatus) -> Result<()> {
        let died = (status == WorkerStatus::Dead).then(chrono::Utc::now);

        let result = sqlx::query("UPDATE Worker SET status = ?, died = COALESCE(?, died) WHERE worker_id = ?")
            .bind(status.as_str())
            .bind(died)
            .bind(id.get())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::NotFound(format!("worker {}", id)));
        }
        Ok(())
    }

    async fn set_worker_log_dir(&self, id: WorkerId, log_dir: &str) -> Result<()> {
        let result = sqlx::query("UPDATE Worker SET log_dir = ? WHERE worker_id = ?")
            .bind(log_dir)
            .bind(id.get())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::NotFound(format!("worker {}", id)));
        }
        Ok(())
    }

    async fn delete_worker(&self, id: WorkerId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM Worker WHERE worker_id = ?")
            .bind(id.get())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // === Resource usage ===

    async fn record_usage(&self, id: WorkerId, usage: &ResourceUsage) -> Result<()> {
        sqlx::query(
            "INSERT INTO ResourceUsageRecord
                (worker_id, exit_status, mem_megs, swap_megs, pending_sec, cpu_sec, lifespan_sec, exception_status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(worker_id) DO UPDATE SET
                exit_status = excluded.exit_status,
                mem_megs = excluded.mem_megs,
                swap_megs = excluded.swap_megs,
                pending_sec = excluded.pending_sec,
                cpu_sec = excluded.cpu_sec,
                lifespan_sec = excluded.lifespan_sec,
                exception_status = excluded.exception_status",
        )
        .bind(id.get())
        .bind(usage.exit_status.as_deref())
        .bind(usage.mem_megs)
        .bind(usage.swap_megs)
        .bind(usage.pending_sec)
        .bind(usage.cpu_sec)
        .bind(usage.lifespan_sec)
        .bind(usage.exception_status.as_ref().map(ExceptionStatus::as_str))
        .execute(&self.pool)
        .await?;

        debug!("Recorded resource usage for worker {}", id);
        Ok(())
    }

    async fn load_usage(&self, id: WorkerId) -> Result<Option<ResourceUsage>> {
        let row = sqlx::query(
            "SELECT exit_status, mem_megs, swap_megs, pending_sec, cpu_sec, lifespan_sec, exception_status
            FROM ResourceUsageRecord WHERE worker_id = ?",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::usage_from_row).transpose()
    }

    async fn aggregated_stats(&self) -> Result<Vec<AggregatedStats>> {
        let rows = sqlx::query("SELECT * FROM AggregatedStats")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::stats_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{advance_schema_version, CURRENT_VERSION, RESOURCE_USAGE};
    use crate::record_usage_best_effort;

    async fn ledger_with_analysis() -> (SqliteLedger, AnalysisId) {
        let ledger = SqliteLedger::in_memory().await.unwrap();
        let rc = ledger.add_resource_class("default").await.unwrap();
        let analysis = ledger.add_analysis("align_reads", rc).await.unwrap();
        (ledger, analysis)
    }

    fn new_worker(analysis: AnalysisId, backend_type: &str, pid: &str) -> NewWorker {
        NewWorker {
            analysis_id: Some(analysis),
            backend: BackendKey::new(backend_type, "farm", pid),
        }
    }

    fn usage(mem: f64, swap: f64) -> ResourceUsage {
        ResourceUsage {
            exit_status: Some("done".to_string()),
            mem_megs: Some(mem),
            swap_megs: Some(swap),
            cpu_sec: Some(12.0),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_in_memory_ledger_is_current() {
        let ledger = SqliteLedger::in_memory().await.unwrap();
        assert_eq!(ledger.schema_version().await.unwrap(), CURRENT_VERSION);
        assert!(ledger.health_check().await);
    }

    #[tokio::test]
    async fn test_worker_lifecycle() {
        let (ledger, analysis) = ledger_with_analysis().await;

        let worker = ledger.create_worker(&new_worker(analysis, "LSF", "4242[3]")).await.unwrap();
        assert_eq!(worker.status, WorkerStatus::Submitted);

        ledger.set_worker_status(worker.id, WorkerStatus::Busy).await.unwrap();
        ledger.set_worker_log_dir(worker.id, "/logs/1/worker_id_1").await.unwrap();
        let loaded = ledger.load_worker(worker.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, WorkerStatus::Busy);
        assert_eq!(loaded.died, None);
        assert_eq!(loaded.log_dir.as_deref(), Some("/logs/1/worker_id_1"));
        assert_eq!(loaded.backend, worker.backend);

        ledger.set_worker_status(worker.id, WorkerStatus::Dead).await.unwrap();
        let dead = ledger.load_worker(worker.id).await.unwrap().unwrap();
        assert!(dead.died.is_some());

        assert!(matches!(
            ledger.set_worker_status(WorkerId(999), WorkerStatus::Dead).await,
            Err(LedgerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_find_worker_by_backend() {
        let (ledger, analysis) = ledger_with_analysis().await;
        let a = ledger.create_worker(&new_worker(analysis, "LSF", "100")).await.unwrap();
        let _b = ledger.create_worker(&new_worker(analysis, "LOCAL", "100")).await.unwrap();

        let found = ledger
            .find_worker_by_backend(&BackendKey::new("LSF", "farm", "100"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, a.id);

        let missing = ledger
            .find_worker_by_backend(&BackendKey::new("LSF", "other", "100"))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_usage_absent_vs_empty() {
        let (ledger, analysis) = ledger_with_analysis().await;
        let worker = ledger.create_worker(&new_worker(analysis, "LOCAL", "1")).await.unwrap();

        assert_eq!(ledger.load_usage(worker.id).await.unwrap(), None);

        ledger.record_usage(worker.id, &ResourceUsage::default()).await.unwrap();
        let stored = ledger.load_usage(worker.id).await.unwrap().unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn test_record_usage_upserts() {
        let (ledger, analysis) = ledger_with_analysis().await;
        let worker = ledger.create_worker(&new_worker(analysis, "LOCAL", "1")).await.unwrap();

        ledger.record_usage(worker.id, &usage(100.0, 0.0)).await.unwrap();
        let mut second = usage(250.0, 10.0);
        second.exception_status = Some(ExceptionStatus::MemLimit);
        ledger.record_usage(worker.id, &second).await.unwrap();

        let stored = ledger.load_usage(worker.id).await.unwrap().unwrap();
        assert_eq!(stored, second);
    }

    #[tokio::test]
    async fn test_usage_requires_worker() {
        let ledger = SqliteLedger::in_memory().await.unwrap();
        let result = ledger.record_usage(WorkerId(77), &usage(1.0, 1.0)).await;
        assert!(matches!(result, Err(LedgerError::Database(_))));
        assert!(!record_usage_best_effort(&ledger, WorkerId(77), &usage(1.0, 1.0)).await);
    }

    #[tokio::test]
    async fn test_delete_worker_cascades_to_usage() {
        let (ledger, analysis) = ledger_with_analysis().await;
        let worker = ledger.create_worker(&new_worker(analysis, "LOCAL", "1")).await.unwrap();
        ledger.record_usage(worker.id, &usage(64.0, 0.0)).await.unwrap();

        assert!(ledger.delete_worker(worker.id).await.unwrap());
        assert_eq!(ledger.load_usage(worker.id).await.unwrap(), None);
        assert!(!ledger.delete_worker(worker.id).await.unwrap());

        let orphans: i64 = sqlx::query("SELECT COUNT(*) AS n FROM ResourceUsageRecord")
            .fetch_one(ledger.pool())
            .await
            .unwrap()
            .try_get("n")
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[tokio::test]
    async fn test_record_usage_for_backend() {
        let (ledger, analysis) = ledger_with_analysis().await;
        let worker = ledger.create_worker(&new_worker(analysis, "SLURM", "555")).await.unwrap();

        let attached = ledger
            .record_usage_for_backend(&BackendKey::new("SLURM", "farm", "555"), &usage(10.0, 0.0))
            .await
            .unwrap();
        assert_eq!(attached, Some(worker.id));

        let unknown = ledger
            .record_usage_for_backend(&BackendKey::new("SLURM", "farm", "556"), &usage(10.0, 0.0))
            .await
            .unwrap();
        assert_eq!(unknown, None);
    }

    #[tokio::test]
    async fn test_aggregated_stats() {
        let (ledger, analysis) = ledger_with_analysis().await;
        let rc = ledger.add_resource_class("himem").await.unwrap();
        let idle = ledger.add_analysis("never_ran", rc).await.unwrap();

        let w1 = ledger.create_worker(&new_worker(analysis, "LSF", "1")).await.unwrap();
        let w2 = ledger.create_worker(&new_worker(analysis, "LSF", "2")).await.unwrap();
        let _w3 = ledger.create_worker(&new_worker(analysis, "LSF", "3")).await.unwrap();
        let w4 = ledger.create_worker(&new_worker(analysis, "LOCAL", "4")).await.unwrap();

        ledger.record_usage(w1.id, &usage(100.0, 10.0)).await.unwrap();
        ledger.record_usage(w2.id, &usage(300.0, 30.0)).await.unwrap();
        ledger.record_usage(w4.id, &usage(50.0, 0.0)).await.unwrap();

        let stats = ledger.aggregated_stats().await.unwrap();
        assert_eq!(stats.len(), 3);

        let lsf = stats
            .iter()
            .find(|s| s.analysis_id == analysis && s.backend_type.as_deref() == Some("LSF"))
            .unwrap();
        assert_eq!(lsf.analysis, format!("align_reads({})", analysis));
        assert_eq!(lsf.resource_class, "default(1)");
        // The worker without a usage record is counted but not averaged.
        assert_eq!(lsf.workers, 3);
        assert_eq!(lsf.min_mem_megs, Some(100.0));
        assert_eq!(lsf.avg_mem_megs, Some(200.0));
        assert_eq!(lsf.max_mem_megs, Some(300.0));
        assert_eq!(lsf.avg_swap_megs, Some(20.0));

        let local = stats
            .iter()
            .find(|s| s.backend_type.as_deref() == Some("LOCAL"))
            .unwrap();
        assert_eq!(local.workers, 1);
        assert_eq!(local.max_mem_megs, Some(50.0));

        let never = stats.iter().find(|s| s.analysis_id == idle).unwrap();
        assert_eq!(never.backend_type, None);
        assert_eq!(never.workers, 0);
        assert_eq!(never.avg_mem_megs, None);
    }

    #[tokio::test]
    async fn test_aggregated_stats_follow_live_rows() {
        let (ledger, analysis) = ledger_with_analysis().await;
        let w1 = ledger.create_worker(&new_worker(analysis, "LSF", "1")).await.unwrap();
        let w2 = ledger.create_worker(&new_worker(analysis, "LSF", "2")).await.unwrap();
        ledger.record_usage(w1.id, &usage(100.0, 0.0)).await.unwrap();
        ledger.record_usage(w2.id, &usage(500.0, 0.0)).await.unwrap();

        ledger.delete_worker(w2.id).await.unwrap();

        let stats = ledger.aggregated_stats().await.unwrap();
        assert_eq!(stats[0].workers, 1);
        assert_eq!(stats[0].max_mem_megs, Some(100.0));
    }

    #[tokio::test]
    async fn test_migration_is_idempotent() {
        let ledger = SqliteLedger::open(&LedgerConfig {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
        })
        .await
        .unwrap();
        assert_eq!(ledger.schema_version().await.unwrap(), 1);

        assert_eq!(ledger.migrate().await.unwrap(), MigrationOutcome::Applied);
        assert_eq!(ledger.schema_version().await.unwrap(), 2);
        assert_eq!(ledger.migrate().await.unwrap(), MigrationOutcome::AlreadyApplied);
        assert_eq!(
            RESOURCE_USAGE.apply(ledger.pool()).await.unwrap(),
            MigrationOutcome::AlreadyApplied
        );
        assert_eq!(ledger.schema_version().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_guarded_version_update() {
        let ledger = SqliteLedger::open(&LedgerConfig {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
        })
        .await
        .unwrap();
        let mut conn = ledger.pool().acquire().await.unwrap();

        assert_eq!(advance_schema_version(&mut conn, 1, 2).await.unwrap(), 1);
        assert_eq!(advance_schema_version(&mut conn, 1, 2).await.unwrap(), 0);
        assert_eq!(schema::read_version(&mut conn).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_migration_conflict_leaves_schema_untouched() {
        let ledger = SqliteLedger::open(&LedgerConfig {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
        })
        .await
        .unwrap();
        sqlx::query("UPDATE Meta SET meta_value = '7' WHERE meta_key = 'schema_version'")
            .execute(ledger.pool())
            .await
            .unwrap();

        let err = RESOURCE_USAGE.apply(ledger.pool()).await.unwrap_err();
        assert!(matches!(err, LedgerError::MigrationConflict { expected: 1, ref found } if found == "7"));

        let tables: i64 = sqlx::query(
            "SELECT COUNT(*) AS n FROM sqlite_master WHERE name = 'ResourceUsageRecord'",
        )
        .fetch_one(ledger.pool())
        .await
        .unwrap()
        .try_get("n")
        .unwrap();
        assert_eq!(tables, 0);
    }

    #[tokio::test]
    async fn test_file_backed_ledger_persists() {
        let dir = tempfile::tempdir().unwrap();
        let config = LedgerConfig {
            database_url: format!("sqlite://{}", dir.path().join("hive.db").display()),
            max_connections: 2,
        };

        let worker_id = {
            let ledger = SqliteLedger::open(&config).await.unwrap();
            ledger.migrate().await.unwrap();
            let rc = ledger.add_resource_class("default").await.unwrap();
            let analysis = ledger.add_analysis("a", rc).await.unwrap();
            let worker = ledger.create_worker(&new_worker(analysis, "LOCAL", "9")).await.unwrap();
            ledger.record_usage(worker.id, &usage(1.0, 2.0)).await.unwrap();
            ledger.pool().close().await;
            worker.id
        };

        let reopened = SqliteLedger::open(&config).await.unwrap();
        assert_eq!(reopened.migrate().await.unwrap(), MigrationOutcome::AlreadyApplied);
        assert_eq!(reopened.load_usage(worker_id).await.unwrap(), Some(usage(1.0, 2.0)));
    }
}
