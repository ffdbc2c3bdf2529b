//! Monthly ledger storage
//!
//! Rows are only ever inserted. The unique constraint on
//! `(entity_kind, entity_id, month)` is what rejects a second report for the
//! same period, so the duplicate decision and the write are one statement.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TrackerError;
use crate::types::{EntityKind, Month, Percentage};

/// Ledger entry from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub id: i64,
    pub entity_kind: EntityKind,
    pub entity_id: i64,
    pub month: Month,
    pub percentage: Percentage,
    pub reported_by: Option<String>,
    pub report_date: String,
    pub created_at: String,
}

impl ReportEntry {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            entity_kind: row.get("entity_kind")?,
            entity_id: row.get("entity_id")?,
            month: row.get("month")?,
            percentage: row.get("percentage")?,
            reported_by: row.get("reported_by")?,
            report_date: row.get("report_date")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// A validated report about to be appended
#[derive(Debug, Clone)]
pub struct NewReport {
    pub entity_kind: EntityKind,
    pub entity_id: i64,
    pub month: Month,
    pub percentage: Percentage,
    pub reported_by: Option<String>,
}

/// Append a report. Returns `false` if the (kind, id, month) slot is already taken.
pub(crate) fn insert_report(conn: &Connection, report: &NewReport) -> Result<bool, TrackerError> {
    let changes = conn.execute(
        r#"
        INSERT INTO monthly_reports (entity_kind, entity_id, month, percentage, reported_by)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (entity_kind, entity_id, month) DO NOTHING
        "#,
        params![
            report.entity_kind,
            report.entity_id,
            report.month,
            report.percentage,
            report.reported_by,
        ],
    ).map_err(|e| TrackerError::Internal(format!("Insert failed: {}", e)))?;

    debug!(
        kind = %report.entity_kind,
        id = report.entity_id,
        month = %report.month,
        inserted = changes > 0,
        "Ledger insert"
    );
    Ok(changes > 0)
}

/// Whether the referenced milestone or activity exists
pub fn entity_exists(conn: &Connection, kind: EntityKind, id: i64) -> Result<bool, TrackerError> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?", kind.table());
    let found = conn.query_row(&sql, params![id], |_| Ok(())).optional()?;
    Ok(found.is_some())
}

/// Entry with the greatest month for an entity
pub fn latest_report(conn: &Connection, kind: EntityKind, id: i64) -> Result<Option<ReportEntry>, TrackerError> {
    let row = conn
        .query_row(
            r#"
            SELECT * FROM monthly_reports
            WHERE entity_kind = ? AND entity_id = ?
            ORDER BY month DESC
            LIMIT 1
            "#,
            params![kind, id],
            ReportEntry::from_row,
        )
        .optional()?;
    Ok(row)
}

pub fn latest_percentage(conn: &Connection, kind: EntityKind, id: i64) -> Result<Option<Percentage>, TrackerError> {
    let value = conn
        .query_row(
            r#"
            SELECT percentage FROM monthly_reports
            WHERE entity_kind = ? AND entity_id = ?
            ORDER BY month DESC
            LIMIT 1
            "#,
            params![kind, id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

/// Every entry for an entity, oldest month first
pub fn history(conn: &Connection, kind: EntityKind, id: i64) -> Result<Vec<ReportEntry>, TrackerError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM monthly_reports WHERE entity_kind = ? AND entity_id = ? ORDER BY month ASC",
    )?;
    let rows = stmt
        .query_map(params![kind, id], ReportEntry::from_row)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TrackerError::Internal(format!("Row parse failed: {}", e)))?;
    Ok(rows)
}

/// Every entry filed for `month`
pub fn reports_for_month(conn: &Connection, month: Month) -> Result<Vec<ReportEntry>, TrackerError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM monthly_reports WHERE month = ? ORDER BY entity_kind, entity_id",
    )?;
    let rows = stmt
        .query_map(params![month], ReportEntry::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn has_report(conn: &Connection, kind: EntityKind, id: i64, month: Month) -> Result<bool, TrackerError> {
    let found = conn
        .query_row(
            "SELECT 1 FROM monthly_reports WHERE entity_kind = ? AND entity_id = ? AND month = ?",
            params![kind, id, month],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Ledger rows whose milestone or activity no longer exists
pub fn count_orphans(conn: &Connection) -> Result<u64, TrackerError> {
    let n: i64 = conn.query_row(
        r#"
        SELECT COUNT(*) FROM monthly_reports r
        WHERE (r.entity_kind = 'milestone' AND NOT EXISTS (SELECT 1 FROM milestones m WHERE m.id = r.entity_id))
           OR (r.entity_kind = 'activity' AND NOT EXISTS (SELECT 1 FROM activities a WHERE a.id = r.entity_id))
        "#,
        [],
        |row| row.get(0),
    )?;
    Ok(n as u64)
}
