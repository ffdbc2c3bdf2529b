//! Read-side projections for external consumers
//!
//! These types use camelCase serialization for UI clients.
//! Row types in `db` use snake_case for database compatibility.
//!
//! Pattern:
//! - Service layer reads rows and the ledger
//! - Views carry the derived values a client displays, never raw caches
//!   that could disagree with the ledger

use serde::Serialize;

use crate::db::{ActivityRow, IndicatorRow, MilestoneRow, ReportEntry};
use crate::status::Status;
use crate::types::{EntityKind, Month, Percentage};

// ============================================================================
// Hierarchy Views
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorView {
    pub id: i64,
    pub year: i32,
    pub name: String,
    pub owner: Option<String>,
    pub area: Option<String>,
    pub org_unit: Option<String>,
    pub has_milestones: bool,
    pub target: Option<String>,
    pub actual: Option<f64>,
    pub measure: Option<String>,
    pub percentage: Percentage,
    pub status: Status,
    pub milestones: Vec<MilestoneView>,
}

impl IndicatorView {
    pub fn new(row: IndicatorRow, milestones: Vec<MilestoneView>) -> Self {
        Self {
            id: row.id,
            year: row.year,
            name: row.name,
            owner: row.owner,
            area: row.area,
            org_unit: row.org_unit,
            has_milestones: row.has_milestones,
            target: row.target,
            actual: row.actual,
            measure: row.measure,
            percentage: row.percentage,
            status: row.status,
            milestones,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneView {
    pub id: i64,
    pub name: String,
    pub owner: Option<String>,
    pub ordinal: Option<i64>,
    pub percentage: Percentage,
    pub status: Status,
    /// Month of the latest report; `None` while still on the seed value
    pub last_reported_month: Option<Month>,
    pub activities: Vec<ActivityView>,
}

impl MilestoneView {
    pub fn new(
        row: MilestoneRow,
        latest: Option<&ReportEntry>,
        activities: Vec<ActivityView>,
    ) -> Self {
        let percentage = latest.map(|r| r.percentage).unwrap_or(row.seed_percentage);
        Self {
            id: row.id,
            name: row.name,
            owner: row.owner,
            ordinal: row.ordinal,
            percentage,
            status: Status::from_percentage(percentage),
            last_reported_month: latest.map(|r| r.month),
            activities,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityView {
    pub id: i64,
    pub description: String,
    pub owner: Option<String>,
    pub percentage: Percentage,
    pub status: Status,
    pub last_reported_month: Option<Month>,
}

impl ActivityView {
    pub fn new(row: ActivityRow, latest: Option<&ReportEntry>) -> Self {
        let percentage = latest.map(|r| r.percentage).unwrap_or(Percentage::ZERO);
        Self {
            id: row.id,
            description: row.description,
            owner: row.owner,
            percentage,
            status: Status::from_percentage(percentage),
            last_reported_month: latest.map(|r| r.month),
        }
    }
}

// ============================================================================
// Ledger Views
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItemView {
    pub month: Month,
    pub percentage: Percentage,
    pub reported_by: Option<String>,
    pub report_date: String,
}

impl From<ReportEntry> for HistoryItemView {
    fn from(e: ReportEntry) -> Self {
        Self {
            month: e.month,
            percentage: e.percentage,
            reported_by: e.reported_by,
            report_date: e.report_date,
        }
    }
}

// ============================================================================
// Owner Workload Views
// ============================================================================

/// Everything assigned to one owner, with this month's reporting state
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadView {
    pub owner: String,
    pub month: Month,
    pub milestones: Vec<WorkItemView>,
    pub activities: Vec<WorkItemView>,
    pub pending: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItemView {
    pub kind: EntityKind,
    pub id: i64,
    pub parent_id: i64,
    pub name: String,
    pub percentage: Percentage,
    pub status: Status,
    pub reported_this_month: bool,
}
