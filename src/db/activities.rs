//! Activity CRUD operations

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TrackerError;
use crate::status::Status;

/// Activity row from database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRow {
    pub id: i64,
    pub milestone_id: i64,
    pub description: String,
    pub owner: Option<String>,
    pub planned_start_date: Option<NaiveDate>,
    pub planned_end_date: Option<NaiveDate>,
    pub actual_date: Option<NaiveDate>,
    pub status: Status,
    pub created_at: String,
    pub updated_at: String,
}

impl ActivityRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            milestone_id: row.get("milestone_id")?,
            description: row.get("description")?,
            owner: row.get("owner")?,
            planned_start_date: row.get("planned_start_date")?,
            planned_end_date: row.get("planned_end_date")?,
            actual_date: row.get("actual_date")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Input for creating an activity
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateActivityInput {
    pub description: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub planned_start_date: Option<NaiveDate>,
    #[serde(default)]
    pub planned_end_date: Option<NaiveDate>,
    #[serde(default)]
    pub actual_date: Option<NaiveDate>,
}

impl CreateActivityInput {
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.description.trim().is_empty() {
            return Err(TrackerError::validation("activity description must not be empty"));
        }
        Ok(())
    }
}

/// Insert an activity under `milestone_id`; `None` if the milestone does not exist
pub(crate) fn insert_activity(
    conn: &Connection,
    milestone_id: i64,
    input: &CreateActivityInput,
) -> Result<Option<i64>, TrackerError> {
    let parent_exists = conn
        .query_row("SELECT 1 FROM milestones WHERE id = ?", params![milestone_id], |_| Ok(()))
        .optional()?
        .is_some();
    if !parent_exists {
        return Ok(None);
    }

    conn.execute(
        r#"
        INSERT INTO activities (
            milestone_id, description, owner, planned_start_date, planned_end_date, actual_date
        ) VALUES (?, ?, ?, ?, ?, ?)
        "#,
        params![
            milestone_id,
            input.description.trim(),
            input.owner,
            input.planned_start_date,
            input.planned_end_date,
            input.actual_date,
        ],
    ).map_err(|e| TrackerError::Internal(format!("Insert failed: {}", e)))?;

    let id = conn.last_insert_rowid();
    debug!(id, milestone_id, "Inserted activity");
    Ok(Some(id))
}

pub fn get_activity(conn: &Connection, id: i64) -> Result<Option<ActivityRow>, TrackerError> {
    let row = conn
        .query_row("SELECT * FROM activities WHERE id = ?", params![id], ActivityRow::from_row)
        .optional()?;
    Ok(row)
}

/// Activities of a milestone in creation order
pub fn list_by_milestone(conn: &Connection, milestone_id: i64) -> Result<Vec<ActivityRow>, TrackerError> {
    let mut stmt = conn.prepare("SELECT * FROM activities WHERE milestone_id = ? ORDER BY id")?;
    let rows = stmt
        .query_map(params![milestone_id], ActivityRow::from_row)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TrackerError::Internal(format!("Row parse failed: {}", e)))?;
    Ok(rows)
}

pub fn list_by_owner(conn: &Connection, owner: &str) -> Result<Vec<ActivityRow>, TrackerError> {
    let mut stmt = conn.prepare("SELECT * FROM activities WHERE owner = ? ORDER BY milestone_id, id")?;
    let rows = stmt
        .query_map(params![owner], ActivityRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn write_status(conn: &Connection, id: i64, status: Status) -> Result<bool, TrackerError> {
    let changes = conn.execute(
        "UPDATE activities SET status = ?, updated_at = datetime('now') WHERE id = ?",
        params![status, id],
    )?;
    Ok(changes > 0)
}

/// Delete an activity and its ledger rows
pub(crate) fn delete_activity(tx: &Transaction<'_>, id: i64) -> Result<bool, TrackerError> {
    tx.execute(
        "DELETE FROM monthly_reports WHERE entity_kind = 'activity' AND entity_id = ?",
        params![id],
    )?;
    let changes = tx
        .execute("DELETE FROM activities WHERE id = ?", params![id])
        .map_err(|e| TrackerError::Internal(format!("Delete failed: {}", e)))?;
    Ok(changes > 0)
}
