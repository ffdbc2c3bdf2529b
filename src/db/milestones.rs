//! Milestone CRUD operations

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TrackerError;
use crate::status::Status;
use crate::types::Percentage;

/// Milestone row from database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilestoneRow {
    pub id: i64,
    pub indicator_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub owner: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub planned_end_date: Option<NaiveDate>,
    pub actual_end_date: Option<NaiveDate>,
    pub ordinal: Option<i64>,
    pub seed_percentage: Percentage,
    pub current_percentage: Percentage,
    pub status: Status,
    pub load_date: NaiveDate,
    pub created_at: String,
    pub updated_at: String,
}

impl MilestoneRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            indicator_id: row.get("indicator_id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            owner: row.get("owner")?,
            start_date: row.get("start_date")?,
            planned_end_date: row.get("planned_end_date")?,
            actual_end_date: row.get("actual_end_date")?,
            ordinal: row.get("ordinal")?,
            seed_percentage: row.get("seed_percentage")?,
            current_percentage: row.get("current_percentage")?,
            status: row.get("status")?,
            load_date: row.get("load_date")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Input for creating a milestone
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateMilestoneInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub planned_end_date: Option<NaiveDate>,
    #[serde(default)]
    pub actual_end_date: Option<NaiveDate>,
    #[serde(default)]
    pub ordinal: Option<i64>,
    /// Progress assumed until the first monthly report arrives
    #[serde(default)]
    pub seed_percentage: Percentage,
}

impl CreateMilestoneInput {
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.name.trim().is_empty() {
            return Err(TrackerError::validation("milestone name must not be empty"));
        }
        Ok(())
    }
}

/// Insert a milestone under `indicator_id`.
///
/// The cached percentage starts at the seed value with the matching status.
/// Returns `None` if the indicator does not exist.
pub(crate) fn insert_milestone(
    conn: &Connection,
    indicator_id: i64,
    input: &CreateMilestoneInput,
) -> Result<Option<i64>, TrackerError> {
    let parent_exists = conn
        .query_row("SELECT 1 FROM indicators WHERE id = ?", params![indicator_id], |_| Ok(()))
        .optional()?
        .is_some();
    if !parent_exists {
        return Ok(None);
    }

    let seed = input.seed_percentage;
    conn.execute(
        r#"
        INSERT INTO milestones (
            indicator_id, name, description, owner, start_date, planned_end_date,
            actual_end_date, ordinal, seed_percentage, current_percentage, status
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            indicator_id,
            input.name.trim(),
            input.description,
            input.owner,
            input.start_date,
            input.planned_end_date,
            input.actual_end_date,
            input.ordinal,
            seed,
            seed,
            Status::from_percentage(seed),
        ],
    ).map_err(|e| TrackerError::Internal(format!("Insert failed: {}", e)))?;

    let id = conn.last_insert_rowid();
    debug!(id, indicator_id, "Inserted milestone");
    Ok(Some(id))
}

/// Get milestone by ID
pub fn get_milestone(conn: &Connection, id: i64) -> Result<Option<MilestoneRow>, TrackerError> {
    let row = conn
        .query_row("SELECT * FROM milestones WHERE id = ?", params![id], MilestoneRow::from_row)
        .optional()?;
    Ok(row)
}

/// Milestones of an indicator: explicit ordinal first, then creation order
pub fn list_by_indicator(conn: &Connection, indicator_id: i64) -> Result<Vec<MilestoneRow>, TrackerError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM milestones WHERE indicator_id = ? ORDER BY ordinal IS NULL, ordinal, id",
    )?;
    let rows = stmt
        .query_map(params![indicator_id], MilestoneRow::from_row)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TrackerError::Internal(format!("Row parse failed: {}", e)))?;
    Ok(rows)
}

/// Milestones assigned to an owner
pub fn list_by_owner(conn: &Connection, owner: &str) -> Result<Vec<MilestoneRow>, TrackerError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM milestones WHERE owner = ? ORDER BY indicator_id, ordinal IS NULL, ordinal, id",
    )?;
    let rows = stmt
        .query_map(params![owner], MilestoneRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Refresh the cached percentage/status after a ledger write
pub(crate) fn write_progress(
    conn: &Connection,
    id: i64,
    percentage: Percentage,
    status: Status,
) -> Result<bool, TrackerError> {
    let changes = conn.execute(
        "UPDATE milestones SET current_percentage = ?, status = ?, updated_at = datetime('now') WHERE id = ?",
        params![percentage, status, id],
    )?;
    Ok(changes > 0)
}

/// Delete a milestone, its activities and their ledger rows.
///
/// Returns the parent indicator id, or `None` if nothing was deleted.
pub(crate) fn delete_milestone(tx: &Transaction<'_>, id: i64) -> Result<Option<i64>, TrackerError> {
    let Some(indicator_id) = tx
        .query_row("SELECT indicator_id FROM milestones WHERE id = ?", params![id], |row| row.get::<_, i64>(0))
        .optional()?
    else {
        return Ok(None);
    };

    tx.execute(
        r#"
        DELETE FROM monthly_reports
        WHERE entity_kind = 'activity'
          AND entity_id IN (SELECT id FROM activities WHERE milestone_id = ?)
        "#,
        params![id],
    )?;
    tx.execute(
        "DELETE FROM monthly_reports WHERE entity_kind = 'milestone' AND entity_id = ?",
        params![id],
    )?;
    tx.execute("DELETE FROM milestones WHERE id = ?", params![id])
        .map_err(|e| TrackerError::Internal(format!("Delete failed: {}", e)))?;

    Ok(Some(indicator_id))
}
