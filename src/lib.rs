//! Indicator Tracker - monthly progress ledger and rollup engine
//!
//! Tracks organizational performance indicators. Each indicator is either
//! quantitative (progress = actual / target) or decomposed into milestones,
//! which in turn hold activities. Milestone and activity owners report a
//! percentage once per calendar month.
//!
//! ## Architecture
//!
//! | Component | Module |
//! |-----------|--------|
//! | Entity hierarchy store | [`db::indicators`], [`db::milestones`], [`db::activities`] |
//! | Progress ledger | [`db::reports`], [`ledger`] |
//! | Quantitative resolver | [`quantitative`] |
//! | Aggregation engine | [`aggregation`] |
//! | Status derivation | [`status`] |
//!
//! ## Write path
//!
//! ```text
//! submit report
//!   -> ledger insert (unique per entity and month)
//!   -> entity status from latest ledger value
//!   -> indicator recompute
//! ```
//!
//! Cached percentages on indicator and milestone rows are only written by
//! this path and by structural changes that trigger a recompute.

pub mod aggregation;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod quantitative;
pub mod services;
pub mod status;
pub mod types;
pub mod views;

// Re-exports
pub use aggregation::{Rollup, RollupSource};
pub use config::Config;
pub use db::TrackerDb;
pub use error::TrackerError;
pub use ledger::ReportOutcome;
pub use quantitative::Target;
pub use services::{IndicatorService, ReportService, Services};
pub use status::Status;
pub use types::{EntityKind, Month, Percentage};
pub use views::{ActivityView, IndicatorView, MilestoneView};
