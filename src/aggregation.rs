//! Indicator rollup
//!
//! An indicator's displayed percentage is a cache. [`recompute`] rebuilds it
//! from the authoritative sources:
//!
//! - quantitative mode: [`quantitative::resolve`] over (actual, target)
//! - milestone mode: truncated mean of every milestone's latest ledger
//!   percentage, falling back to the milestone's seed value
//!
//! Milestones are weighted equally. The status always comes from
//! [`Status::from_percentage`].

use rusqlite::Connection;
use serde::Serialize;
use tracing::debug;

use crate::db::{indicators, milestones, reports, MilestoneRow};
use crate::error::TrackerError;
use crate::quantitative;
use crate::status::Status;
use crate::types::{EntityKind, Percentage};

/// Where a rollup value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RollupSource {
    Quantitative,
    Milestones { count: usize },
}

/// Result of a recompute, as persisted on the indicator row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rollup {
    pub indicator_id: i64,
    pub percentage: Percentage,
    pub status: Status,
    pub source: RollupSource,
}

/// Truncated arithmetic mean; zero for an empty slice
pub fn mean_percentage(values: &[Percentage]) -> Percentage {
    if values.is_empty() {
        return Percentage::ZERO;
    }
    let sum: u64 = values.iter().map(|p| p.value() as u64).sum();
    Percentage::saturating((sum / values.len() as u64) as i64)
}

/// Latest ledger percentage for a milestone, or its seed when never reported
pub fn milestone_current(conn: &Connection, milestone: &MilestoneRow) -> Result<Percentage, TrackerError> {
    let latest = reports::latest_percentage(conn, EntityKind::Milestone, milestone.id)?;
    Ok(latest.unwrap_or(milestone.seed_percentage))
}

/// Rebuild and store the rollup of one indicator.
///
/// Returns `None` if the indicator does not exist.
pub fn recompute(conn: &Connection, indicator_id: i64) -> Result<Option<Rollup>, TrackerError> {
    let Some(indicator) = indicators::get_indicator(conn, indicator_id)? else {
        return Ok(None);
    };

    let (percentage, source) = if indicator.has_milestones {
        let children = milestones::list_by_indicator(conn, indicator_id)?;
        let values = children
            .iter()
            .map(|m| milestone_current(conn, m))
            .collect::<Result<Vec<_>, _>>()?;
        (mean_percentage(&values), RollupSource::Milestones { count: values.len() })
    } else {
        (
            quantitative::resolve(indicator.actual, &indicator.target()),
            RollupSource::Quantitative,
        )
    };

    let status = Status::from_percentage(percentage);
    indicators::write_rollup(conn, indicator_id, percentage, status)?;

    debug!(indicator_id, %percentage, %status, ?source, "Recomputed indicator rollup");

    Ok(Some(Rollup {
        indicator_id,
        percentage,
        status,
        source,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{CreateIndicatorInput, CreateMilestoneInput, NewReport, TrackerDb};

    fn pct(v: i64) -> Percentage {
        Percentage::new(v).unwrap()
    }

    #[test]
    fn test_mean_truncates() {
        assert_eq!(mean_percentage(&[]), Percentage::ZERO);
        assert_eq!(mean_percentage(&[pct(20), pct(60), pct(100)]), pct(60));
        // 50 + 51 = 101 / 2 = 50.5
        assert_eq!(mean_percentage(&[pct(50), pct(51)]), pct(50));
        assert_eq!(mean_percentage(&[pct(100), pct(100)]), Percentage::FULL);
    }

    #[test]
    fn test_recompute_missing_indicator() {
        let db = TrackerDb::open_in_memory().unwrap();
        let rollup = db.with_conn(|conn| recompute(conn, 99)).unwrap();
        assert!(rollup.is_none());
    }

    #[test]
    fn test_recompute_uses_ledger_over_seed() {
        let db = TrackerDb::open_in_memory().unwrap();
        let rollup = db
            .with_conn(|conn| {
                let id = indicators::insert_indicator(conn, &CreateIndicatorInput {
                    year: 2024,
                    name: "Digitalize archives".to_string(),
                    has_milestones: true,
                    ..Default::default()
                })?;
                let seeded = milestones::insert_milestone(conn, id, &CreateMilestoneInput {
                    name: "Scan".to_string(),
                    seed_percentage: pct(40),
                    ..Default::default()
                })?
                .unwrap();
                milestones::insert_milestone(conn, id, &CreateMilestoneInput {
                    name: "Index".to_string(),
                    seed_percentage: pct(40),
                    ..Default::default()
                })?;

                reports::insert_report(conn, &NewReport {
                    entity_kind: EntityKind::Milestone,
                    entity_id: seeded,
                    month: "2024-05".parse()?,
                    percentage: pct(80),
                    reported_by: None,
                })?;

                recompute(conn, id)
            })
            .unwrap()
            .unwrap();

        // (80 + 40) / 2
        assert_eq!(rollup.percentage, pct(60));
        assert_eq!(rollup.status, Status::InProgress);
        assert_eq!(rollup.source, RollupSource::Milestones { count: 2 });
    }

    #[test]
    fn test_recompute_without_milestones_yet() {
        let db = TrackerDb::open_in_memory().unwrap();
        let rollup = db
            .with_conn(|conn| {
                let id = indicators::insert_indicator(conn, &CreateIndicatorInput {
                    year: 2024,
                    name: "Empty plan".to_string(),
                    has_milestones: true,
                    target: Some("10".to_string()),
                    actual: Some(10.0),
                    ..Default::default()
                })?;
                recompute(conn, id)
            })
            .unwrap()
            .unwrap();

        assert_eq!(rollup.percentage, Percentage::ZERO);
        assert_eq!(rollup.status, Status::NotStarted);
    }
}
