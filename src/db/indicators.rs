//! Indicator CRUD operations

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TrackerError;
use crate::quantitative::Target;
use crate::status::Status;
use crate::types::Percentage;

/// Accepted indicator years
pub const YEAR_RANGE: std::ops::RangeInclusive<i32> = 2000..=2100;

/// Indicator row from database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorRow {
    pub id: i64,
    pub strategic_id: Option<String>,
    pub year: i32,
    pub name: String,
    pub org_unit: Option<String>,
    pub collaborating_unit: Option<String>,
    pub area: Option<String>,
    pub strategic_line: Option<String>,
    pub indicator_type: Option<String>,
    pub target: Option<String>,
    pub measure: Option<String>,
    pub actual: Option<f64>,
    pub has_milestones: bool,
    pub percentage: Percentage,
    pub status: Status,
    pub owner: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub original_end_date: Option<NaiveDate>,
    pub current_end_date: Option<NaiveDate>,
    pub load_date: NaiveDate,
    pub created_at: String,
    pub updated_at: String,
}

impl IndicatorRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            strategic_id: row.get("strategic_id")?,
            year: row.get("year")?,
            name: row.get("name")?,
            org_unit: row.get("org_unit")?,
            collaborating_unit: row.get("collaborating_unit")?,
            area: row.get("area")?,
            strategic_line: row.get("strategic_line")?,
            indicator_type: row.get("indicator_type")?,
            target: row.get("target")?,
            measure: row.get("measure")?,
            actual: row.get("actual")?,
            has_milestones: row.get::<_, i64>("has_milestones")? != 0,
            percentage: row.get("percentage")?,
            status: row.get("status")?,
            owner: row.get("owner")?,
            start_date: row.get("start_date")?,
            original_end_date: row.get("original_end_date")?,
            current_end_date: row.get("current_end_date")?,
            load_date: row.get("load_date")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Classified target text
    pub fn target(&self) -> Target {
        Target::parse(self.target.as_deref())
    }
}

/// Input for creating an indicator
///
/// There is no percentage or status field: both are derived after insert.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateIndicatorInput {
    pub year: i32,
    pub name: String,
    #[serde(default)]
    pub strategic_id: Option<String>,
    #[serde(default)]
    pub org_unit: Option<String>,
    #[serde(default)]
    pub collaborating_unit: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub strategic_line: Option<String>,
    #[serde(default)]
    pub indicator_type: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub measure: Option<String>,
    #[serde(default)]
    pub actual: Option<f64>,
    #[serde(default)]
    pub has_milestones: bool,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub original_end_date: Option<NaiveDate>,
    #[serde(default)]
    pub current_end_date: Option<NaiveDate>,
}

impl CreateIndicatorInput {
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.name.trim().is_empty() {
            return Err(TrackerError::validation("indicator name must not be empty"));
        }
        if !YEAR_RANGE.contains(&self.year) {
            return Err(TrackerError::validation(format!(
                "indicator year must be within {}..={}, got {}",
                YEAR_RANGE.start(),
                YEAR_RANGE.end(),
                self.year
            )));
        }
        if let Some(actual) = self.actual {
            if !actual.is_finite() {
                return Err(TrackerError::validation("indicator actual value must be finite"));
            }
        }
        Ok(())
    }
}

/// Optional filters for listing indicators
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndicatorFilter {
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub org_unit: Option<String>,
    #[serde(default)]
    pub indicator_type: Option<String>,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub owner: Option<String>,
}

/// Insert an indicator with a zero rollup; callers recompute right after
pub(crate) fn insert_indicator(conn: &Connection, input: &CreateIndicatorInput) -> Result<i64, TrackerError> {
    conn.execute(
        r#"
        INSERT INTO indicators (
            strategic_id, year, name, org_unit, collaborating_unit, area,
            strategic_line, indicator_type, target, measure, actual,
            has_milestones, owner, start_date, original_end_date, current_end_date
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            input.strategic_id,
            input.year,
            input.name.trim(),
            input.org_unit,
            input.collaborating_unit,
            input.area,
            input.strategic_line,
            input.indicator_type,
            input.target,
            input.measure,
            input.actual,
            input.has_milestones as i64,
            input.owner,
            input.start_date,
            input.original_end_date,
            input.current_end_date,
        ],
    ).map_err(|e| TrackerError::Internal(format!("Insert failed: {}", e)))?;

    let id = conn.last_insert_rowid();
    debug!(id, name = %input.name, "Inserted indicator");
    Ok(id)
}

/// Get indicator by ID
pub fn get_indicator(conn: &Connection, id: i64) -> Result<Option<IndicatorRow>, TrackerError> {
    let row = conn
        .query_row("SELECT * FROM indicators WHERE id = ?", params![id], IndicatorRow::from_row)
        .optional()?;
    Ok(row)
}

/// List indicators matching `filter`, newest first
pub fn list_indicators(conn: &Connection, filter: &IndicatorFilter) -> Result<Vec<IndicatorRow>, TrackerError> {
    let mut sql = String::from("SELECT * FROM indicators");
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![];
    let mut conditions = vec![];

    if let Some(year) = filter.year {
        conditions.push("year = ?");
        params.push(Box::new(year));
    }
    if let Some(ref area) = filter.area {
        conditions.push("area = ?");
        params.push(Box::new(area.clone()));
    }
    if let Some(ref unit) = filter.org_unit {
        conditions.push("org_unit = ?");
        params.push(Box::new(unit.clone()));
    }
    if let Some(ref kind) = filter.indicator_type {
        conditions.push("indicator_type = ?");
        params.push(Box::new(kind.clone()));
    }
    if let Some(status) = filter.status {
        conditions.push("status = ?");
        params.push(Box::new(status));
    }
    if let Some(ref owner) = filter.owner {
        conditions.push("owner = ?");
        params.push(Box::new(owner.clone()));
    }

    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(" ORDER BY created_at DESC, id DESC");

    debug!("Executing query: {}", sql);

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| TrackerError::Internal(format!("Prepare failed: {}", e)))?;

    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

    let rows = stmt
        .query_map(param_refs.as_slice(), IndicatorRow::from_row)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TrackerError::Internal(format!("Row parse failed: {}", e)))?;

    Ok(rows)
}

/// Replace the quantitative source fields (actual, target)
///
/// Returns `false` when the indicator does not exist.
pub(crate) fn update_quantitative_source(
    conn: &Connection,
    id: i64,
    actual: Option<f64>,
    target: Option<&str>,
) -> Result<bool, TrackerError> {
    let changes = conn.execute(
        "UPDATE indicators SET actual = ?, target = ?, updated_at = datetime('now') WHERE id = ?",
        params![actual, target, id],
    )?;
    Ok(changes > 0)
}

/// Store a recomputed rollup. Only the aggregation engine calls this.
pub(crate) fn write_rollup(
    conn: &Connection,
    id: i64,
    percentage: Percentage,
    status: Status,
) -> Result<bool, TrackerError> {
    let changes = conn.execute(
        "UPDATE indicators SET percentage = ?, status = ?, updated_at = datetime('now') WHERE id = ?",
        params![percentage, status, id],
    )?;
    Ok(changes > 0)
}

/// Delete an indicator, its milestones, their activities and every ledger row
/// that referenced any of them
pub(crate) fn delete_indicator(tx: &Transaction<'_>, id: i64) -> Result<bool, TrackerError> {
    tx.execute(
        r#"
        DELETE FROM monthly_reports
        WHERE entity_kind = 'activity' AND entity_id IN (
            SELECT a.id FROM activities a
            INNER JOIN milestones m ON a.milestone_id = m.id
            WHERE m.indicator_id = ?
        )
        "#,
        params![id],
    )?;
    tx.execute(
        r#"
        DELETE FROM monthly_reports
        WHERE entity_kind = 'milestone' AND entity_id IN (
            SELECT id FROM milestones WHERE indicator_id = ?
        )
        "#,
        params![id],
    )?;

    // milestones and activities follow through ON DELETE CASCADE
    let changes = tx
        .execute("DELETE FROM indicators WHERE id = ?", params![id])
        .map_err(|e| TrackerError::Internal(format!("Delete failed: {}", e)))?;

    Ok(changes > 0)
}

/// Dashboard totals over all indicators
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub total: u64,
    pub not_started: u64,
    pub in_progress: u64,
    pub completed: u64,
    /// Mean displayed percentage, one decimal
    pub average_percentage: f64,
}

pub fn summary_stats(conn: &Connection) -> Result<SummaryStats, TrackerError> {
    let mut stats = SummaryStats {
        total: 0,
        not_started: 0,
        in_progress: 0,
        completed: 0,
        average_percentage: 0.0,
    };

    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM indicators GROUP BY status")?;
    let counts = stmt
        .query_map([], |row| Ok((row.get::<_, Status>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    for (status, count) in counts {
        let count = count as u64;
        stats.total += count;
        match status {
            Status::NotStarted => stats.not_started = count,
            Status::InProgress => stats.in_progress = count,
            Status::Completed => stats.completed = count,
        }
    }

    let avg: Option<f64> = conn.query_row("SELECT AVG(percentage) FROM indicators", [], |row| row.get(0))?;
    stats.average_percentage = (avg.unwrap_or(0.0) * 10.0).round() / 10.0;

    Ok(stats)
}
