//! SQL migration definitions for the reportcast database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed within a transaction.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: runs, source_results, publish_outcomes",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Pipeline run history
CREATE TABLE IF NOT EXISTS runs (
    id           TEXT PRIMARY KEY,
    run_stamp    TEXT NOT NULL,
    window_start TEXT NOT NULL,
    window_end   TEXT NOT NULL,
    started_at   TEXT NOT NULL,
    finished_at  TEXT,
    status       TEXT NOT NULL DEFAULT 'running',
    detail       TEXT
);

-- Per-source fetch statuses within a run
CREATE TABLE IF NOT EXISTS source_results (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id   TEXT NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
    source   TEXT NOT NULL,
    status   TEXT NOT NULL,
    detail   TEXT
);

CREATE INDEX IF NOT EXISTS idx_source_results_run ON source_results(run_id);

-- Per-chunk publish outcomes within a run
CREATE TABLE IF NOT EXISTS publish_outcomes (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id       TEXT NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
    label        TEXT NOT NULL,
    success      INTEGER NOT NULL,
    error_detail TEXT,
    published_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_publish_outcomes_run ON publish_outcomes(run_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
