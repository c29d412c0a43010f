//! Ledger schema and its guarded evolution steps.
//!
//! The `Meta` table holds a single `schema_version` marker. Each
//! [`Migration`] moves the marker from one exact value to the next inside a
//! transaction, so a step applies at most once and a database that is
//! somewhere unexpected is left untouched.

use sqlx::{Row, SqliteConnection};
use tracing::{info, warn};

use super::trait_::{LedgerError, Result};

/// Key of the schema-version marker in `Meta`.
pub const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Version of the tables installed by [`BASELINE`].
pub const BASELINE_VERSION: i64 = 1;

/// Version after every migration in [`MIGRATIONS`] has run.
pub const CURRENT_VERSION: i64 = 2;

/// Tables every ledger database starts with.
pub const BASELINE: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS Meta (
        meta_key TEXT PRIMARY KEY,
        meta_value TEXT NOT NULL
    )",
    "INSERT OR IGNORE INTO Meta (meta_key, meta_value) VALUES ('schema_version', '1')",
    "CREATE TABLE IF NOT EXISTS ResourceClass (
        resource_class_id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS AnalysisBase (
        analysis_id INTEGER PRIMARY KEY AUTOINCREMENT,
        logic_name TEXT NOT NULL UNIQUE,
        resource_class_id INTEGER NOT NULL REFERENCES ResourceClass(resource_class_id)
    )",
    "CREATE TABLE IF NOT EXISTS Worker (
        worker_id INTEGER PRIMARY KEY AUTOINCREMENT,
        analysis_id INTEGER REFERENCES AnalysisBase(analysis_id),
        backend_type TEXT NOT NULL,
        backend_name TEXT NOT NULL,
        process_id TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'SUBMITTED',
        born TEXT NOT NULL,
        died TEXT,
        log_dir TEXT
    )",
];

/// One guarded schema-evolution step.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Marker value the step starts from
    pub from: i64,
    /// Marker value the step leaves behind
    pub to: i64,
    /// What the step is for
    pub description: &'static str,
    /// DDL, run in order inside the step's transaction
    pub statements: &'static [&'static str],
}

/// Result of running a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The step ran and advanced the marker
    Applied,
    /// The marker was already at the target version; nothing ran
    AlreadyApplied,
}

/// Adds resource accounting: backend lookup index, usage table, report view.
pub const RESOURCE_USAGE: Migration = Migration {
    from: 1,
    to: 2,
    description: "worker resource usage ledger",
    statements: &[
        "CREATE INDEX IF NOT EXISTS Worker_backend_process_idx
            ON Worker (backend_type, backend_name, process_id)",
        "CREATE TABLE IF NOT EXISTS ResourceUsageRecord (
            worker_id INTEGER NOT NULL PRIMARY KEY
                REFERENCES Worker(worker_id) ON DELETE CASCADE,
            exit_status TEXT,
            mem_megs REAL,
            swap_megs REAL,
            pending_sec REAL,
            cpu_sec REAL,
            lifespan_sec REAL,
            exception_status TEXT
        )",
        "CREATE VIEW IF NOT EXISTS AggregatedStats AS
            SELECT a.logic_name || '(' || a.analysis_id || ')' AS analysis,
                   a.analysis_id AS analysis_id,
                   w.backend_type AS backend_type,
                   rc.name || '(' || rc.resource_class_id || ')' AS resource_class,
                   rc.resource_class_id AS resource_class_id,
                   COUNT(w.worker_id) AS workers,
                   MIN(u.mem_megs) AS min_mem_megs,
                   AVG(u.mem_megs) AS avg_mem_megs,
                   MAX(u.mem_megs) AS max_mem_megs,
                   MIN(u.swap_megs) AS min_swap_megs,
                   AVG(u.swap_megs) AS avg_swap_megs,
                   MAX(u.swap_megs) AS max_swap_megs
            FROM AnalysisBase a
            JOIN ResourceClass rc ON rc.resource_class_id = a.resource_class_id
            LEFT JOIN Worker w ON w.analysis_id = a.analysis_id
            LEFT JOIN ResourceUsageRecord u ON u.worker_id = w.worker_id
            GROUP BY a.analysis_id, w.backend_type, rc.resource_class_id
            ORDER BY a.analysis_id, w.backend_type",
    ],
};

/// Every migration, oldest first.
pub const MIGRATIONS: &[Migration] = &[RESOURCE_USAGE];

/// Install the baseline tables (no-op on an existing database).
pub async fn install_baseline(conn: &mut SqliteConnection) -> Result<()> {
    for statement in BASELINE {
        sqlx::query(statement).execute(&mut *conn).await?;
    }
    Ok(())
}

/// Read the schema-version marker as stored.
pub async fn read_marker(conn: &mut SqliteConnection) -> Result<String> {
    let row = sqlx::query("SELECT meta_value FROM Meta WHERE meta_key = ?")
        .bind(SCHEMA_VERSION_KEY)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(row.try_get("meta_value")?),
        None => Err(LedgerError::NotFound(SCHEMA_VERSION_KEY.to_string())),
    }
}

/// Read the schema-version marker as a number.
pub async fn read_version(conn: &mut SqliteConnection) -> Result<i64> {
    let marker = read_marker(conn).await?;
    marker
        .trim()
        .parse()
        .map_err(|_| LedgerError::Invalid(format!("schema version marker {:?}", marker)))
}

/// Move the marker from exactly `from` to `to`.
///
/// Returns the number of rows changed: 1 when the marker held `from`,
/// 0 otherwise (including when it already holds `to`).
pub async fn advance_schema_version(conn: &mut SqliteConnection, from: i64, to: i64) -> Result<u64> {
    let result = sqlx::query("UPDATE Meta SET meta_value = ? WHERE meta_key = ? AND meta_value = ?")
        .bind(to.to_string())
        .bind(SCHEMA_VERSION_KEY)
        .bind(from.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

impl Migration {
    /// Run this step in its own transaction.
    ///
    /// Already at `to`: nothing happens. At `from`: the DDL runs and the
    /// marker advances. Anywhere else, or if the marker moved underneath
    /// us, the transaction is rolled back with
    /// [`LedgerError::MigrationConflict`].
    pub async fn apply(&self, pool: &sqlx::SqlitePool) -> Result<MigrationOutcome> {
        let mut tx = pool.begin().await?;

        let found = read_marker(&mut tx).await?;
        if found.trim() == self.to.to_string() {
            return Ok(MigrationOutcome::AlreadyApplied);
        }
        if found.trim() != self.from.to_string() {
            warn!(
                "Refusing migration {} -> {} ({}): marker is {:?}",
                self.from, self.to, self.description, found
            );
            return Err(LedgerError::MigrationConflict {
                expected: self.from,
                found,
            });
        }

        for statement in self.statements {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        let advanced = advance_schema_version(&mut tx, self.from, self.to).await?;
        if advanced != 1 {
            let found = read_marker(&mut tx).await.unwrap_or_default();
            return Err(LedgerError::MigrationConflict {
                expected: self.from,
                found,
            });
        }

        tx.commit().await?;
        info!("Applied schema migration {} -> {}: {}", self.from, self.to, self.description);
        Ok(MigrationOutcome::Applied)
    }
}
