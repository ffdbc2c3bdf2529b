//! Database schema definitions

use rusqlite::Connection;
use tracing::info;

use crate::error::TrackerError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<(), TrackerError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version > SCHEMA_VERSION {
        return Err(TrackerError::Internal(format!(
            "Database schema v{} is newer than supported v{}",
            current_version, SCHEMA_VERSION
        )));
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &Connection) -> Result<i32, TrackerError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    ).map_err(|e| TrackerError::Internal(format!("Failed to create schema_version table: {}", e)))?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    Ok(version.unwrap_or(0))
}

/// Set schema version
fn set_schema_version(conn: &Connection, version: i32) -> Result<(), TrackerError> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| TrackerError::Internal(format!("Failed to clear schema_version: {}", e)))?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])
        .map_err(|e| TrackerError::Internal(format!("Failed to set schema_version: {}", e)))?;
    Ok(())
}

/// Create all tables
fn create_tables(conn: &Connection) -> Result<(), TrackerError> {
    conn.execute_batch(HIERARCHY_SCHEMA)
        .map_err(|e| TrackerError::Internal(format!("Failed to create hierarchy tables: {}", e)))?;

    conn.execute_batch(LEDGER_SCHEMA)
        .map_err(|e| TrackerError::Internal(format!("Failed to create ledger table: {}", e)))?;

    conn.execute_batch(INDEXES_SCHEMA)
        .map_err(|e| TrackerError::Internal(format!("Failed to create indexes: {}", e)))?;

    Ok(())
}

/// Indicators, milestones and activities
const HIERARCHY_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS indicators (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    strategic_id TEXT,
    year INTEGER NOT NULL,
    name TEXT NOT NULL,
    org_unit TEXT,
    collaborating_unit TEXT,
    area TEXT,
    strategic_line TEXT,
    indicator_type TEXT,

    -- Quantitative source fields; target is free text
    target TEXT,
    measure TEXT,
    actual REAL,

    has_milestones INTEGER NOT NULL DEFAULT 0,

    -- Rollup cache, written only by the aggregation path
    percentage INTEGER NOT NULL DEFAULT 0 CHECK(percentage >= 0 AND percentage <= 100),
    status TEXT NOT NULL DEFAULT 'not_started',

    owner TEXT,
    start_date TEXT,
    original_end_date TEXT,
    current_end_date TEXT,
    load_date TEXT NOT NULL DEFAULT (date('now')),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS milestones (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    indicator_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    owner TEXT,
    start_date TEXT,
    planned_end_date TEXT,
    actual_end_date TEXT,
    ordinal INTEGER,

    -- Fallback when the ledger has no entry yet
    seed_percentage INTEGER NOT NULL DEFAULT 0 CHECK(seed_percentage >= 0 AND seed_percentage <= 100),
    -- Latest ledger value (or seed), refreshed on every report
    current_percentage INTEGER NOT NULL DEFAULT 0 CHECK(current_percentage >= 0 AND current_percentage <= 100),
    status TEXT NOT NULL DEFAULT 'not_started',

    load_date TEXT NOT NULL DEFAULT (date('now')),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),

    FOREIGN KEY (indicator_id) REFERENCES indicators(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS activities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    milestone_id INTEGER NOT NULL,
    description TEXT NOT NULL,
    owner TEXT,
    planned_start_date TEXT,
    planned_end_date TEXT,
    actual_date TEXT,
    status TEXT NOT NULL DEFAULT 'not_started',
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),

    FOREIGN KEY (milestone_id) REFERENCES milestones(id) ON DELETE CASCADE
);
"#;

/// Append-only monthly ledger
const LEDGER_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS monthly_reports (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_kind TEXT NOT NULL CHECK(entity_kind IN ('milestone', 'activity')),
    entity_id INTEGER NOT NULL,
    month TEXT NOT NULL,
    percentage INTEGER NOT NULL CHECK(percentage >= 0 AND percentage <= 100),
    reported_by TEXT,
    report_date TEXT NOT NULL DEFAULT (date('now')),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(entity_kind, entity_id, month)
);
"#;

/// Index definitions for fast queries
const INDEXES_SCHEMA: &str = r#"
CREATE INDEX IF NOT EXISTS idx_indicators_year ON indicators(year);
CREATE INDEX IF NOT EXISTS idx_indicators_area ON indicators(area);
CREATE INDEX IF NOT EXISTS idx_indicators_owner ON indicators(owner);

CREATE INDEX IF NOT EXISTS idx_milestones_indicator ON milestones(indicator_id);
CREATE INDEX IF NOT EXISTS idx_milestones_order ON milestones(indicator_id, ordinal);
CREATE INDEX IF NOT EXISTS idx_milestones_owner ON milestones(owner);

CREATE INDEX IF NOT EXISTS idx_activities_milestone ON activities(milestone_id);
CREATE INDEX IF NOT EXISTS idx_activities_owner ON activities(owner);

CREATE INDEX IF NOT EXISTS idx_monthly_reports_entity ON monthly_reports(entity_kind, entity_id);
CREATE INDEX IF NOT EXISTS idx_monthly_reports_month ON monthly_reports(month);
"#;
