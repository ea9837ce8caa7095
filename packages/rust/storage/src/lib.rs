//! libSQL run-history storage.
//!
//! The [`Storage`] struct wraps a local libSQL database recording pipeline
//! runs, per-source fetch statuses, and per-chunk publish outcomes. The CLI
//! is the sole writer; the database exists for `history` queries and for
//! auditing which chunks a past run pushed.

mod migrations;

use std::path::Path;

use chrono::Utc;
use libsql::{Connection, Database, params};

use reportcast_shared::{PublishOutcome, ReportcastError, Result, RunId, SourceStatus};

/// A row from the run history, newest first.
#[derive(Debug, Clone)]
pub struct RunRow {
    pub id: String,
    pub run_stamp: String,
    pub window_start: String,
    pub window_end: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: String,
    pub detail: Option<String>,
}

/// A stored publish outcome row.
#[derive(Debug, Clone)]
pub struct PublishOutcomeRow {
    pub label: String,
    pub success: bool,
    pub error_detail: Option<String>,
    pub published_at: String,
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Storage {
    /// Open or create a database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ReportcastError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| ReportcastError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| ReportcastError::Storage(e.to_string()))?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    ReportcastError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 if no migrations have been applied.
    async fn schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Run operations
    // -----------------------------------------------------------------------

    /// Record the start of a pipeline run.
    pub async fn insert_run(
        &self,
        run_id: &RunId,
        run_stamp: &str,
        window_start: &str,
        window_end: &str,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO runs (id, run_stamp, window_start, window_end, started_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    run_id.to_string(),
                    run_stamp,
                    window_start,
                    window_end,
                    now.as_str()
                ],
            )
            .await
            .map_err(|e| ReportcastError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Mark a run finished with a terminal status (`completed`, `skipped`,
    /// `interrupted`) and optional detail.
    pub async fn finish_run(
        &self,
        run_id: &RunId,
        status: &str,
        detail: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE runs SET finished_at = ?2, status = ?3, detail = ?4 WHERE id = ?1",
                params![run_id.to_string(), now.as_str(), status, detail],
            )
            .await
            .map_err(|e| ReportcastError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Record one source's fetch status for a run.
    pub async fn insert_source_result(
        &self,
        run_id: &RunId,
        source: &str,
        status: SourceStatus,
        detail: Option<&str>,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO source_results (run_id, source, status, detail)
                 VALUES (?1, ?2, ?3, ?4)",
                params![run_id.to_string(), source, status.as_str(), detail],
            )
            .await
            .map_err(|e| ReportcastError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Record one chunk's publish outcome for a run.
    pub async fn insert_publish_outcome(
        &self,
        run_id: &RunId,
        outcome: &PublishOutcome,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO publish_outcomes (run_id, label, success, error_detail, published_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    run_id.to_string(),
                    outcome.chunk.label.as_str(),
                    outcome.success as i64,
                    outcome.error_detail.as_deref(),
                    now.as_str()
                ],
            )
            .await
            .map_err(|e| ReportcastError::Storage(e.to_string()))?;
        Ok(())
    }

    /// List runs, newest first.
    pub async fn list_runs(&self, limit: u32) -> Result<Vec<RunRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, run_stamp, window_start, window_end, started_at, finished_at,
                        status, detail
                 FROM runs ORDER BY started_at DESC LIMIT ?1",
                params![limit],
            )
            .await
            .map_err(|e| ReportcastError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(RunRow {
                id: get_col(&row, 0)?,
                run_stamp: get_col(&row, 1)?,
                window_start: get_col(&row, 2)?,
                window_end: get_col(&row, 3)?,
                started_at: get_col(&row, 4)?,
                finished_at: get_opt_col(&row, 5)?,
                status: get_col(&row, 6)?,
                detail: get_opt_col(&row, 7)?,
            });
        }
        Ok(results)
    }

    /// Publish outcomes recorded for one run, in push order.
    pub async fn outcomes_for_run(&self, run_id: &RunId) -> Result<Vec<PublishOutcomeRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT label, success, error_detail, published_at
                 FROM publish_outcomes WHERE run_id = ?1 ORDER BY id",
                params![run_id.to_string()],
            )
            .await
            .map_err(|e| ReportcastError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(PublishOutcomeRow {
                label: get_col(&row, 0)?,
                success: row
                    .get::<i64>(1)
                    .map_err(|e| ReportcastError::Storage(e.to_string()))?
                    != 0,
                error_detail: get_opt_col(&row, 2)?,
                published_at: get_col(&row, 3)?,
            });
        }
        Ok(results)
    }

    /// Per-source statuses recorded for one run, in fetch order.
    pub async fn source_results_for_run(
        &self,
        run_id: &RunId,
    ) -> Result<Vec<(String, String, Option<String>)>> {
        let mut rows = self
            .conn
            .query(
                "SELECT source, status, detail
                 FROM source_results WHERE run_id = ?1 ORDER BY id",
                params![run_id.to_string()],
            )
            .await
            .map_err(|e| ReportcastError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push((get_col(&row, 0)?, get_col(&row, 1)?, get_opt_col(&row, 2)?));
        }
        Ok(results)
    }
}

fn get_col(row: &libsql::Row, idx: i32) -> Result<String> {
    row.get::<String>(idx)
        .map_err(|e| ReportcastError::Storage(e.to_string()))
}

fn get_opt_col(row: &libsql::Row, idx: i32) -> Result<Option<String>> {
    row.get::<Option<String>>(idx)
        .map_err(|e| ReportcastError::Storage(e.to_string()))
}
