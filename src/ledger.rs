//! Progress ledger writes
//!
//! A submission is one `IMMEDIATE` transaction:
//!
//! 1. check the milestone/activity exists
//! 2. append the ledger row (the unique constraint rejects a second report
//!    for the same month)
//! 3. derive the entity's status from its latest ledger percentage and, for
//!    milestones, refresh the cached current percentage
//!
//! Rolling the change up to the indicator is done by the caller after commit.

use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use tracing::{debug, info};

use crate::db::{activities, milestones, reports, NewReport};
use crate::error::TrackerError;
use crate::status::Status;
use crate::types::{EntityKind, Percentage};

/// What happened to a submitted report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportOutcome {
    /// Appended; the entity's status now reflects it
    Recorded { percentage: Percentage, status: Status },
    /// The entity already has a report for that month; nothing changed
    AlreadyReported,
    /// No milestone/activity with that id
    UnknownEntity,
}

impl ReportOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, ReportOutcome::Recorded { .. })
    }
}

/// Append a report and refresh the reported entity's derived fields.
pub(crate) fn submit_report(conn: &mut Connection, report: &NewReport) -> Result<ReportOutcome, TrackerError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if !reports::entity_exists(&tx, report.entity_kind, report.entity_id)? {
        debug!(kind = %report.entity_kind, id = report.entity_id, "Report for unknown entity");
        return Ok(ReportOutcome::UnknownEntity);
    }

    if !reports::insert_report(&tx, report)? {
        info!(
            kind = %report.entity_kind,
            id = report.entity_id,
            month = %report.month,
            "Report rejected: already reported this month"
        );
        return Ok(ReportOutcome::AlreadyReported);
    }

    // A back-dated month does not change which entry is latest
    let latest = reports::latest_percentage(&tx, report.entity_kind, report.entity_id)?
        .unwrap_or(report.percentage);
    let status = Status::from_percentage(latest);

    match report.entity_kind {
        EntityKind::Milestone => milestones::write_progress(&tx, report.entity_id, latest, status)?,
        EntityKind::Activity => activities::write_status(&tx, report.entity_id, status)?,
    };

    tx.commit()?;

    info!(
        kind = %report.entity_kind,
        id = report.entity_id,
        month = %report.month,
        percentage = %report.percentage,
        "Recorded monthly report"
    );

    Ok(ReportOutcome::Recorded { percentage: latest, status })
}

/// Current percentage of an entity: latest ledger entry, else the milestone
/// seed (activities start at zero). `None` if the entity does not exist.
pub fn current_percentage(conn: &Connection, kind: EntityKind, id: i64) -> Result<Option<Percentage>, TrackerError> {
    match kind {
        EntityKind::Milestone => {
            let Some(milestone) = milestones::get_milestone(conn, id)? else {
                return Ok(None);
            };
            crate::aggregation::milestone_current(conn, &milestone).map(Some)
        }
        EntityKind::Activity => {
            if !reports::entity_exists(conn, kind, id)? {
                return Ok(None);
            }
            let latest = reports::latest_percentage(conn, kind, id)?;
            Ok(Some(latest.unwrap_or(Percentage::ZERO)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{indicators, CreateActivityInput, CreateIndicatorInput, CreateMilestoneInput, TrackerDb};

    fn setup() -> (TrackerDb, i64, i64) {
        let db = TrackerDb::open_in_memory().unwrap();
        let (milestone, activity) = db
            .with_conn(|conn| {
                let ind = indicators::insert_indicator(conn, &CreateIndicatorInput {
                    year: 2024,
                    name: "Open data portal".to_string(),
                    has_milestones: true,
                    ..Default::default()
                })?;
                let m = milestones::insert_milestone(conn, ind, &CreateMilestoneInput {
                    name: "Publish catalog".to_string(),
                    ..Default::default()
                })?
                .unwrap();
                let a = activities::insert_activity(conn, m, &CreateActivityInput {
                    description: "Inventory datasets".to_string(),
                    ..Default::default()
                })?
                .unwrap();
                Ok((m, a))
            })
            .unwrap();
        (db, milestone, activity)
    }

    fn new_report(kind: EntityKind, id: i64, month: &str, pct: i64) -> NewReport {
        NewReport {
            entity_kind: kind,
            entity_id: id,
            month: month.parse().unwrap(),
            percentage: Percentage::new(pct).unwrap(),
            reported_by: Some("owner".to_string()),
        }
    }

    #[test]
    fn test_submit_updates_milestone_cache() {
        let (db, milestone, _) = setup();
        let outcome = db
            .with_conn_mut(|conn| submit_report(conn, &new_report(EntityKind::Milestone, milestone, "2024-04", 45)))
            .unwrap();
        assert_eq!(
            outcome,
            ReportOutcome::Recorded { percentage: Percentage::new(45).unwrap(), status: Status::InProgress }
        );

        let row = db.with_conn(|conn| milestones::get_milestone(conn, milestone)).unwrap().unwrap();
        assert_eq!(row.current_percentage.value(), 45);
        assert_eq!(row.status, Status::InProgress);
    }

    #[test]
    fn test_duplicate_month_has_no_side_effects() {
        let (db, _, activity) = setup();
        db.with_conn_mut(|conn| submit_report(conn, &new_report(EntityKind::Activity, activity, "2024-04", 100)))
            .unwrap();

        let second = db
            .with_conn_mut(|conn| submit_report(conn, &new_report(EntityKind::Activity, activity, "2024-04", 10)))
            .unwrap();
        assert_eq!(second, ReportOutcome::AlreadyReported);

        let row = db.with_conn(|conn| activities::get_activity(conn, activity)).unwrap().unwrap();
        assert_eq!(row.status, Status::Completed);
        let history = db.with_conn(|conn| reports::history(conn, EntityKind::Activity, activity)).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].percentage.value(), 100);
    }

    #[test]
    fn test_backdated_report_keeps_latest() {
        let (db, milestone, _) = setup();
        db.with_conn_mut(|conn| submit_report(conn, &new_report(EntityKind::Milestone, milestone, "2024-06", 70)))
            .unwrap();
        let outcome = db
            .with_conn_mut(|conn| submit_report(conn, &new_report(EntityKind::Milestone, milestone, "2024-05", 20)))
            .unwrap();

        assert_eq!(
            outcome,
            ReportOutcome::Recorded { percentage: Percentage::new(70).unwrap(), status: Status::InProgress }
        );
    }

    #[test]
    fn test_unknown_entity() {
        let (db, _, _) = setup();
        let outcome = db
            .with_conn_mut(|conn| submit_report(conn, &new_report(EntityKind::Activity, 404, "2024-04", 50)))
            .unwrap();
        assert_eq!(outcome, ReportOutcome::UnknownEntity);
        assert!(!outcome.is_recorded());
    }

    #[test]
    fn test_current_percentage_defaults() {
        let (db, milestone, activity) = setup();
        db.with_conn(|conn| {
            assert_eq!(current_percentage(conn, EntityKind::Milestone, milestone)?, Some(Percentage::ZERO));
            assert_eq!(current_percentage(conn, EntityKind::Activity, activity)?, Some(Percentage::ZERO));
            assert_eq!(current_percentage(conn, EntityKind::Activity, 999)?, None);
            Ok(())
        })
        .unwrap();
    }
}
