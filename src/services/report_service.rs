//! Report service - monthly submissions, ledger reads and owner follow-up

use std::sync::Arc;

use tracing::{info, warn};

use crate::aggregation;
use crate::db::{activities, milestones, reports, NewReport, ReportEntry, TrackerDb};
use crate::error::TrackerError;
use crate::ledger::{self, ReportOutcome};
use crate::types::{EntityKind, Month, Percentage};
use crate::views::{HistoryItemView, WorkItemView, WorkloadView};

pub struct ReportService {
    db: Arc<TrackerDb>,
}

impl ReportService {
    pub fn new(db: Arc<TrackerDb>) -> Self {
        Self { db }
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Submit a monthly report and roll it up.
    ///
    /// `month` defaults to the current calendar month. Percentage range is
    /// validated before anything is written. The returned outcome is only
    /// handed back once the owning indicator has been recomputed.
    pub fn submit(
        &self,
        kind: EntityKind,
        entity_id: i64,
        percentage: i64,
        user: Option<&str>,
        month: Option<Month>,
    ) -> Result<ReportOutcome, TrackerError> {
        let report = NewReport {
            entity_kind: kind,
            entity_id,
            month: month.unwrap_or_else(Month::current),
            percentage: Percentage::new(percentage)?,
            reported_by: user.map(str::to_string),
        };

        let outcome = self.db.with_conn_mut(|conn| ledger::submit_report(conn, &report))?;

        if outcome.is_recorded() && kind == EntityKind::Milestone {
            // The ledger row is committed; a failure here leaves the indicator stale until the next recompute
            let rollup = self.db.with_conn(|conn| {
                let Some(milestone) = milestones::get_milestone(conn, entity_id)? else {
                    return Ok(None);
                };
                aggregation::recompute(conn, milestone.indicator_id)
            });
            match rollup {
                Ok(Some(rollup)) => info!(
                    indicator_id = rollup.indicator_id,
                    percentage = %rollup.percentage,
                    status = %rollup.status,
                    "Indicator rolled up after report"
                ),
                Ok(None) => warn!(milestone_id = entity_id, "Milestone vanished before rollup"),
                Err(e) => {
                    warn!(milestone_id = entity_id, error = %e, "Rollup failed after committed report");
                    return Err(e);
                }
            }
        }

        Ok(outcome)
    }

    /// Boolean form of [`submit`](Self::submit): `false` means already reported
    /// this month (or unknown entity)
    pub fn submit_monthly_report(
        &self,
        kind: EntityKind,
        entity_id: i64,
        percentage: i64,
        user: Option<&str>,
        month: Option<Month>,
    ) -> Result<bool, TrackerError> {
        Ok(self.submit(kind, entity_id, percentage, user, month)?.is_recorded())
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// Percentage of the latest ledger entry, `None` if never reported
    pub fn latest_report(&self, kind: EntityKind, entity_id: i64) -> Result<Option<Percentage>, TrackerError> {
        self.db.with_conn(|conn| reports::latest_percentage(conn, kind, entity_id))
    }

    /// Latest entry, falling back to the seed (milestones) or zero (activities)
    pub fn current_percentage(&self, kind: EntityKind, entity_id: i64) -> Result<Option<Percentage>, TrackerError> {
        self.db.with_conn(|conn| ledger::current_percentage(conn, kind, entity_id))
    }

    /// Full ledger for an entity, ascending by month
    pub fn history(&self, kind: EntityKind, entity_id: i64) -> Result<Vec<ReportEntry>, TrackerError> {
        self.db.with_conn(|conn| reports::history(conn, kind, entity_id))
    }

    /// `{month, percentage, user}` projection of [`history`](Self::history)
    pub fn report_history(&self, kind: EntityKind, entity_id: i64) -> Result<Vec<HistoryItemView>, TrackerError> {
        Ok(self.history(kind, entity_id)?.into_iter().map(HistoryItemView::from).collect())
    }

    pub fn reports_for_month(&self, month: Month) -> Result<Vec<ReportEntry>, TrackerError> {
        self.db.with_conn(|conn| reports::reports_for_month(conn, month))
    }

    /// Milestones and activities assigned to `owner` with their reporting state for `month`
    pub fn owner_workload(&self, owner: &str, month: Month) -> Result<WorkloadView, TrackerError> {
        self.db.with_conn(|conn| {
            let mut milestone_items = vec![];
            for m in milestones::list_by_owner(conn, owner)? {
                let percentage = aggregation::milestone_current(conn, &m)?;
                milestone_items.push(WorkItemView {
                    kind: EntityKind::Milestone,
                    id: m.id,
                    parent_id: m.indicator_id,
                    reported_this_month: reports::has_report(conn, EntityKind::Milestone, m.id, month)?,
                    name: m.name,
                    percentage,
                    status: m.status,
                });
            }

            let mut activity_items = vec![];
            for a in activities::list_by_owner(conn, owner)? {
                let percentage = reports::latest_percentage(conn, EntityKind::Activity, a.id)?
                    .unwrap_or(Percentage::ZERO);
                activity_items.push(WorkItemView {
                    kind: EntityKind::Activity,
                    id: a.id,
                    parent_id: a.milestone_id,
                    reported_this_month: reports::has_report(conn, EntityKind::Activity, a.id, month)?,
                    name: a.description,
                    percentage,
                    status: a.status,
                });
            }

            let pending = milestone_items
                .iter()
                .chain(&activity_items)
                .filter(|item| !item.reported_this_month)
                .count();

            Ok(WorkloadView {
                owner: owner.to_string(),
                month,
                milestones: milestone_items,
                activities: activity_items,
                pending,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{CreateActivityInput, CreateIndicatorInput, CreateMilestoneInput};
    use crate::services::Services;
    use crate::status::Status;

    fn month(s: &str) -> Option<Month> {
        Some(s.parse().unwrap())
    }

    fn setup() -> (Services, i64, i64, i64) {
        let services = Services::new(Arc::new(TrackerDb::open_in_memory().unwrap()));
        let indicator = services
            .indicators
            .create_indicator(CreateIndicatorInput {
                year: 2024,
                name: "Citizen services online".to_string(),
                has_milestones: true,
                ..Default::default()
            })
            .unwrap();
        let milestone = services
            .indicators
            .create_milestone(indicator, CreateMilestoneInput {
                name: "Launch portal".to_string(),
                owner: Some("maria".to_string()),
                ..Default::default()
            })
            .unwrap()
            .unwrap();
        let activity = services
            .indicators
            .create_activity(milestone, CreateActivityInput {
                description: "Design forms".to_string(),
                owner: Some("maria".to_string()),
                ..Default::default()
            })
            .unwrap()
            .unwrap();
        (services, indicator, milestone, activity)
    }

    #[test]
    fn test_submit_rolls_up_before_returning() {
        let (services, indicator, milestone, _) = setup();
        let recorded = services
            .reports
            .submit_monthly_report(EntityKind::Milestone, milestone, 35, Some("maria"), month("2024-02"))
            .unwrap();
        assert!(recorded);

        let row = services.indicators.get(indicator).unwrap().unwrap();
        assert_eq!(row.percentage.value(), 35);
        assert_eq!(row.status, Status::InProgress);
    }

    #[test]
    fn test_out_of_range_percentage_is_validation_error() {
        let (services, _, milestone, _) = setup();
        let err = services
            .reports
            .submit(EntityKind::Milestone, milestone, 101, None, month("2024-02"))
            .unwrap_err();
        assert!(matches!(err, TrackerError::Validation(_)));
        assert!(services.reports.history(EntityKind::Milestone, milestone).unwrap().is_empty());
    }

    #[test]
    fn test_activity_reports_do_not_move_indicator() {
        let (services, indicator, _, activity) = setup();
        assert!(services
            .reports
            .submit_monthly_report(EntityKind::Activity, activity, 100, None, month("2024-02"))
            .unwrap());

        assert_eq!(services.indicators.get(indicator).unwrap().unwrap().percentage, Percentage::ZERO);
        assert_eq!(services.reports.latest_report(EntityKind::Activity, activity).unwrap(), Some(Percentage::FULL));
    }

    #[test]
    fn test_report_history_projection() {
        let (services, _, _, activity) = setup();
        services.reports.submit(EntityKind::Activity, activity, 70, Some("maria"), month("2024-03")).unwrap();
        services.reports.submit(EntityKind::Activity, activity, 30, Some("maria"), month("2024-01")).unwrap();

        let history = services.reports.report_history(EntityKind::Activity, activity).unwrap();
        let summary: Vec<(String, u8)> = history.iter().map(|h| (h.month.to_string(), h.percentage.value())).collect();
        assert_eq!(summary, vec![("2024-01".to_string(), 30), ("2024-03".to_string(), 70)]);
        assert_eq!(history[0].reported_by.as_deref(), Some("maria"));
    }

    #[test]
    fn test_owner_workload_tracks_pending() {
        let (services, _, milestone, activity) = setup();
        services.reports.submit(EntityKind::Activity, activity, 50, Some("maria"), month("2024-04")).unwrap();

        let workload = services.reports.owner_workload("maria", "2024-04".parse().unwrap()).unwrap();
        assert_eq!(workload.milestones.len(), 1);
        assert_eq!(workload.activities.len(), 1);
        assert_eq!(workload.milestones[0].id, milestone);
        assert!(!workload.milestones[0].reported_this_month);
        assert!(workload.activities[0].reported_this_month);
        assert_eq!(workload.activities[0].percentage.value(), 50);
        assert_eq!(workload.pending, 1);

        let nobody = services.reports.owner_workload("nobody", "2024-04".parse().unwrap()).unwrap();
        assert_eq!(nobody.pending, 0);
    }
}
