//! Indicator service - hierarchy operations and read-side projection
//!
//! Every structural change that can move an indicator's rollup (creating or
//! deleting a milestone, updating quantitative source values) recomputes the
//! indicator inside the same transaction.

use std::sync::Arc;

use rusqlite::TransactionBehavior;
use serde::Deserialize;
use tracing::{info, warn};

use crate::aggregation::{self, Rollup};
use crate::db::indicators::{self, SummaryStats};
use crate::db::{
    activities, milestones, reports, CreateActivityInput, CreateIndicatorInput,
    CreateMilestoneInput, IndicatorFilter, IndicatorRow, TrackerDb,
};
use crate::error::TrackerError;
use crate::types::EntityKind;
use crate::views::{ActivityView, IndicatorView, MilestoneView};

/// New quantitative source values; `None` keeps the stored value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgressUpdate {
    #[serde(default)]
    pub actual: Option<f64>,
    #[serde(default)]
    pub target: Option<String>,
}

pub struct IndicatorService {
    db: Arc<TrackerDb>,
}

impl IndicatorService {
    pub fn new(db: Arc<TrackerDb>) -> Self {
        Self { db }
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    pub fn get(&self, id: i64) -> Result<Option<IndicatorRow>, TrackerError> {
        self.db.with_conn(|conn| indicators::get_indicator(conn, id))
    }

    pub fn list(&self, filter: &IndicatorFilter) -> Result<Vec<IndicatorRow>, TrackerError> {
        self.db.with_conn(|conn| indicators::list_indicators(conn, filter))
    }

    /// Hierarchical projection of an indicator with its milestones and activities
    pub fn view(&self, id: i64) -> Result<Option<IndicatorView>, TrackerError> {
        self.db.with_conn(|conn| {
            let Some(indicator) = indicators::get_indicator(conn, id)? else {
                return Ok(None);
            };

            let mut milestone_views = vec![];
            for milestone in milestones::list_by_indicator(conn, id)? {
                let mut activity_views = vec![];
                for activity in activities::list_by_milestone(conn, milestone.id)? {
                    let latest = reports::latest_report(conn, EntityKind::Activity, activity.id)?;
                    activity_views.push(ActivityView::new(activity, latest.as_ref()));
                }

                let latest = reports::latest_report(conn, EntityKind::Milestone, milestone.id)?;
                milestone_views.push(MilestoneView::new(milestone, latest.as_ref(), activity_views));
            }

            Ok(Some(IndicatorView::new(indicator, milestone_views)))
        })
    }

    pub fn summary_stats(&self) -> Result<SummaryStats, TrackerError> {
        self.db.with_conn(indicators::summary_stats)
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Create an indicator; its initial percentage/status come from a recompute
    pub fn create_indicator(&self, input: CreateIndicatorInput) -> Result<i64, TrackerError> {
        input.validate()?;

        let (id, rollup) = self.db.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let id = indicators::insert_indicator(&tx, &input)?;
            let rollup = aggregation::recompute(&tx, id)?;
            tx.commit()?;
            Ok((id, rollup))
        })?;

        info!(id, name = %input.name, has_milestones = input.has_milestones, ?rollup, "Created indicator");
        Ok(id)
    }

    /// Create a milestone; `None` if the indicator does not exist.
    ///
    /// Rejected for quantitative indicators, whose progress never reads milestones.
    pub fn create_milestone(
        &self,
        indicator_id: i64,
        input: CreateMilestoneInput,
    ) -> Result<Option<i64>, TrackerError> {
        input.validate()?;

        let id = self.db.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let Some(indicator) = indicators::get_indicator(&tx, indicator_id)? else {
                return Ok(None);
            };
            if !indicator.has_milestones {
                return Err(TrackerError::validation(format!(
                    "indicator {} is quantitative and does not take milestones",
                    indicator_id
                )));
            }

            let id = milestones::insert_milestone(&tx, indicator_id, &input)?;
            aggregation::recompute(&tx, indicator_id)?;
            tx.commit()?;
            Ok(id)
        })?;

        if let Some(id) = id {
            info!(id, indicator_id, name = %input.name, "Created milestone");
        }
        Ok(id)
    }

    /// Create an activity; `None` if the milestone does not exist
    pub fn create_activity(
        &self,
        milestone_id: i64,
        input: CreateActivityInput,
    ) -> Result<Option<i64>, TrackerError> {
        input.validate()?;

        let id = self
            .db
            .with_conn(|conn| activities::insert_activity(conn, milestone_id, &input))?;

        if let Some(id) = id {
            info!(id, milestone_id, "Created activity");
        }
        Ok(id)
    }

    /// Update actual/target of a quantitative indicator and recompute.
    ///
    /// Returns `false` for an unknown id.
    pub fn update_progress(&self, id: i64, update: ProgressUpdate) -> Result<bool, TrackerError> {
        if let Some(actual) = update.actual {
            if !actual.is_finite() {
                return Err(TrackerError::validation("actual value must be finite"));
            }
        }

        let rollup = self.db.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let Some(current) = indicators::get_indicator(&tx, id)? else {
                return Ok(None);
            };
            if current.has_milestones {
                return Err(TrackerError::validation(format!(
                    "indicator {} derives its progress from milestones",
                    id
                )));
            }

            let actual = update.actual.or(current.actual);
            let target = update.target.as_deref().or(current.target.as_deref());
            indicators::update_quantitative_source(&tx, id, actual, target)?;

            let rollup = aggregation::recompute(&tx, id)?;
            tx.commit()?;
            Ok(rollup)
        })?;

        match rollup {
            Some(rollup) => {
                info!(id, percentage = %rollup.percentage, status = %rollup.status, "Updated indicator progress");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Rebuild the cached rollup from the ledger / source values
    pub fn recompute(&self, id: i64) -> Result<Option<Rollup>, TrackerError> {
        self.db.with_conn(|conn| aggregation::recompute(conn, id))
    }

    pub fn delete_indicator(&self, id: i64) -> Result<bool, TrackerError> {
        let deleted = self.db.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let deleted = indicators::delete_indicator(&tx, id)?;
            tx.commit()?;
            Ok(deleted)
        })?;

        if deleted {
            info!(id, "Deleted indicator");
        } else {
            warn!(id, "Delete requested for unknown indicator");
        }
        Ok(deleted)
    }

    /// Delete a milestone and roll the change up to its indicator
    pub fn delete_milestone(&self, id: i64) -> Result<bool, TrackerError> {
        let parent = self.db.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let parent = milestones::delete_milestone(&tx, id)?;
            if let Some(indicator_id) = parent {
                aggregation::recompute(&tx, indicator_id)?;
            }
            tx.commit()?;
            Ok(parent)
        })?;

        match parent {
            Some(indicator_id) => {
                info!(id, indicator_id, "Deleted milestone");
                Ok(true)
            }
            None => {
                warn!(id, "Delete requested for unknown milestone");
                Ok(false)
            }
        }
    }

    pub fn delete_activity(&self, id: i64) -> Result<bool, TrackerError> {
        let deleted = self.db.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let deleted = activities::delete_activity(&tx, id)?;
            tx.commit()?;
            Ok(deleted)
        })?;

        if deleted {
            info!(id, "Deleted activity");
        } else {
            warn!(id, "Delete requested for unknown activity");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Status;
    use crate::types::Percentage;

    fn service() -> IndicatorService {
        IndicatorService::new(Arc::new(TrackerDb::open_in_memory().unwrap()))
    }

    fn quantitative(target: &str, actual: f64) -> CreateIndicatorInput {
        CreateIndicatorInput {
            year: 2024,
            name: "Trained staff".to_string(),
            target: Some(target.to_string()),
            actual: Some(actual),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_quantitative_resolves_on_insert() {
        let svc = service();
        let id = svc.create_indicator(quantitative("200", 250.0)).unwrap();
        let row = svc.get(id).unwrap().unwrap();
        assert_eq!(row.percentage, Percentage::FULL);
        assert_eq!(row.status, Status::Completed);

        let id = svc.create_indicator(quantitative("N/A", 10.0)).unwrap();
        let row = svc.get(id).unwrap().unwrap();
        assert_eq!(row.percentage, Percentage::ZERO);
        assert_eq!(row.status, Status::NotStarted);
    }

    #[test]
    fn test_create_rejects_invalid_input() {
        let svc = service();
        let err = svc
            .create_indicator(CreateIndicatorInput { year: 2024, ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, TrackerError::Validation(_)));

        let err = svc
            .create_indicator(CreateIndicatorInput { year: 1850, name: "Old".to_string(), ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, TrackerError::Validation(_)));
    }

    #[test]
    fn test_update_progress_recomputes() {
        let svc = service();
        let id = svc.create_indicator(quantitative("200", 20.0)).unwrap();
        assert_eq!(svc.get(id).unwrap().unwrap().percentage.value(), 10);

        assert!(svc.update_progress(id, ProgressUpdate { actual: Some(150.0), target: None }).unwrap());
        let row = svc.get(id).unwrap().unwrap();
        assert_eq!(row.percentage.value(), 75);
        assert_eq!(row.status, Status::InProgress);
        assert_eq!(row.target.as_deref(), Some("200"));

        assert!(svc
            .update_progress(id, ProgressUpdate { actual: None, target: Some("150".to_string()) })
            .unwrap());
        assert_eq!(svc.get(id).unwrap().unwrap().status, Status::Completed);

        assert!(!svc.update_progress(999, ProgressUpdate::default()).unwrap());
    }

    #[test]
    fn test_milestone_mode_rules() {
        let svc = service();
        let quant = svc.create_indicator(quantitative("10", 1.0)).unwrap();
        let err = svc
            .create_milestone(quant, CreateMilestoneInput { name: "Phase 1".to_string(), ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, TrackerError::Validation(_)));

        let staged = svc
            .create_indicator(CreateIndicatorInput {
                year: 2024,
                name: "Staged rollout".to_string(),
                has_milestones: true,
                ..Default::default()
            })
            .unwrap();
        let err = svc.update_progress(staged, ProgressUpdate { actual: Some(5.0), target: None }).unwrap_err();
        assert!(matches!(err, TrackerError::Validation(_)));

        assert_eq!(
            svc.create_milestone(999, CreateMilestoneInput { name: "Orphan".to_string(), ..Default::default() })
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_milestone_seed_rolls_up_and_delete_recomputes() {
        let svc = service();
        let id = svc
            .create_indicator(CreateIndicatorInput {
                year: 2024,
                name: "Staged rollout".to_string(),
                has_milestones: true,
                ..Default::default()
            })
            .unwrap();

        let first = svc
            .create_milestone(id, CreateMilestoneInput {
                name: "Pilot".to_string(),
                seed_percentage: Percentage::new(100).unwrap(),
                ..Default::default()
            })
            .unwrap()
            .unwrap();
        svc.create_milestone(id, CreateMilestoneInput { name: "Scale".to_string(), ..Default::default() })
            .unwrap()
            .unwrap();

        assert_eq!(svc.get(id).unwrap().unwrap().percentage.value(), 50);

        assert!(svc.delete_milestone(first).unwrap());
        let row = svc.get(id).unwrap().unwrap();
        assert_eq!(row.percentage, Percentage::ZERO);
        assert_eq!(row.status, Status::NotStarted);

        assert!(!svc.delete_milestone(first).unwrap());
    }

    #[test]
    fn test_view_orders_children() {
        let svc = service();
        let id = svc
            .create_indicator(CreateIndicatorInput {
                year: 2025,
                name: "Ordered".to_string(),
                has_milestones: true,
                ..Default::default()
            })
            .unwrap();
        let unordered = svc
            .create_milestone(id, CreateMilestoneInput { name: "Later".to_string(), ..Default::default() })
            .unwrap()
            .unwrap();
        let second = svc
            .create_milestone(id, CreateMilestoneInput {
                name: "Second".to_string(),
                ordinal: Some(2),
                ..Default::default()
            })
            .unwrap()
            .unwrap();
        let first = svc
            .create_milestone(id, CreateMilestoneInput {
                name: "First".to_string(),
                ordinal: Some(1),
                ..Default::default()
            })
            .unwrap()
            .unwrap();

        let a1 = svc
            .create_activity(first, CreateActivityInput { description: "a1".to_string(), ..Default::default() })
            .unwrap()
            .unwrap();
        let a2 = svc
            .create_activity(first, CreateActivityInput { description: "a2".to_string(), ..Default::default() })
            .unwrap()
            .unwrap();

        let view = svc.view(id).unwrap().unwrap();
        let order: Vec<i64> = view.milestones.iter().map(|m| m.id).collect();
        assert_eq!(order, vec![first, second, unordered]);
        let acts: Vec<i64> = view.milestones[0].activities.iter().map(|a| a.id).collect();
        assert_eq!(acts, vec![a1, a2]);

        assert!(svc.view(12345).unwrap().is_none());
    }

    #[test]
    fn test_delete_unknown_is_false() {
        let svc = service();
        assert!(!svc.delete_indicator(1).unwrap());
        assert!(!svc.delete_activity(1).unwrap());
        assert_eq!(
            svc.create_activity(1, CreateActivityInput { description: "x".to_string(), ..Default::default() })
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_summary_stats() {
        let svc = service();
        svc.create_indicator(quantitative("100", 100.0)).unwrap();
        svc.create_indicator(quantitative("100", 25.0)).unwrap();
        svc.create_indicator(quantitative("N/A", 25.0)).unwrap();

        let stats = svc.summary_stats().unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.in_progress, 1);
        assert_eq!(stats.not_started, 1);
        // (100 + 25 + 0) / 3 = 41.66..
        assert_eq!(stats.average_percentage, 41.7);
    }
}
