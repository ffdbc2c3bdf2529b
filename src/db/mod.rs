//! SQLite storage for the indicator hierarchy and the monthly ledger
//!
//! ## Tables
//!
//! - `indicators` - top-level objectives with cached rollup percentage/status
//! - `milestones` - children of an indicator, cached current percentage
//! - `activities` - children of a milestone, status only
//! - `monthly_reports` - append-only ledger, unique per (kind, id, month)
//!
//! Cascades run indicator -> milestone -> activity through foreign keys.
//! Ledger rows reference milestones and activities polymorphically, so they
//! are removed explicitly by the delete functions in the same transaction.
//!
//! Reads are public. Writers are crate-private: every mutation goes through
//! [`crate::services`] so cached rollups always match the ledger.

pub mod schema;
pub mod indicators;
pub mod milestones;
pub mod activities;
pub mod reports;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::TrackerError;

/// Store handle passed explicitly to every service operation
pub struct TrackerDb {
    conn: Mutex<Connection>,
}

impl TrackerDb {
    /// Open or create the tracker database at `db_path`
    pub fn open(db_path: &Path) -> Result<Self, TrackerError> {
        info!("Opening SQLite database at {:?}", db_path);

        let conn = Connection::open(db_path)
            .map_err(|e| TrackerError::Internal(format!("Failed to open SQLite: {}", e)))?;

        // WAL for concurrent readers; the busy timeout lets competing writers serialize
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| TrackerError::Internal(format!("Failed to set PRAGMA: {}", e)))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, TrackerError> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory()
            .map_err(|e| TrackerError::Internal(format!("Failed to open in-memory SQLite: {}", e)))?;

        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, TrackerError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| TrackerError::Internal(format!("Failed to enable foreign keys: {}", e)))?;

        schema::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run a read with shared access to the connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, TrackerError>
    where
        F: FnOnce(&Connection) -> Result<T, TrackerError>,
    {
        let conn = self.conn.lock()
            .map_err(|e| TrackerError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Execute a write operation with exclusive access
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T, TrackerError>
    where
        F: FnOnce(&mut Connection) -> Result<T, TrackerError>,
    {
        let mut conn = self.conn.lock()
            .map_err(|e| TrackerError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&mut conn)
    }

    /// Row counts per table
    pub fn stats(&self) -> Result<DbStats, TrackerError> {
        self.with_conn(|conn| {
            let count = |table: &str| -> Result<u64, TrackerError> {
                let n: i64 = conn
                    .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
                    .map_err(|e| TrackerError::Internal(format!("Query failed: {}", e)))?;
                Ok(n as u64)
            };

            Ok(DbStats {
                indicator_count: count("indicators")?,
                milestone_count: count("milestones")?,
                activity_count: count("activities")?,
                report_count: count("monthly_reports")?,
            })
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DbStats {
    pub indicator_count: u64,
    pub milestone_count: u64,
    pub activity_count: u64,
    pub report_count: u64,
}

// Re-exports
pub use indicators::{CreateIndicatorInput, IndicatorFilter, IndicatorRow};
pub use milestones::{CreateMilestoneInput, MilestoneRow};
pub use activities::{ActivityRow, CreateActivityInput};
pub use reports::{NewReport, ReportEntry};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_starts_empty() {
        let db = TrackerDb::open_in_memory().unwrap();
        let stats = db.stats().unwrap();
        assert_eq!(
            stats,
            DbStats { indicator_count: 0, milestone_count: 0, activity_count: 0, report_count: 0 }
        );
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let db = TrackerDb::open_in_memory().unwrap();
        let enabled: i64 = db
            .with_conn(|conn| Ok(conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?))
            .unwrap();
        assert_eq!(enabled, 1);
    }
}
