//! Service layer for indicator-tracker
//!
//! Services encapsulate business logic between callers (CLI, forms, HTTP
//! handlers) and the repositories. Each service wraps database operations
//! with:
//! - Input validation
//! - Transaction boundaries
//! - Rollup of ledger changes into the owning indicator
//!
//! ## Architecture
//!
//! ```text
//! Callers (thin)
//!     ↓
//! Service Layer (business logic)
//!     ↓
//! Ledger / Aggregation
//!     ↓
//! Repository Layer (db/*.rs)
//!     ↓
//! SQLite Database
//! ```

pub mod indicator_service;
pub mod report_service;

pub use indicator_service::{IndicatorService, ProgressUpdate};
pub use report_service::ReportService;

use crate::db::TrackerDb;
use std::sync::Arc;

/// Service container for dependency injection
///
/// Holds all services over one shared store handle.
pub struct Services {
    pub indicators: Arc<IndicatorService>,
    pub reports: Arc<ReportService>,
}

impl Services {
    pub fn new(db: Arc<TrackerDb>) -> Self {
        Self {
            indicators: Arc::new(IndicatorService::new(db.clone())),
            reports: Arc::new(ReportService::new(db)),
        }
    }
}
