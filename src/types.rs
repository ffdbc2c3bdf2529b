//! Value types shared by the store, the ledger and the rollup engine
//!
//! - [`Percentage`] - integer progress in `0..=100`
//! - [`Month`] - `YYYY-MM` reporting period token
//! - [`EntityKind`] - which table a ledger entry refers to
//!
//! All three validate on construction and implement `ToSql`/`FromSql`, so
//! a value read back from SQLite is guaranteed to satisfy the same rules
//! as one accepted from a caller.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Local, NaiveDate};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::TrackerError;

// ============================================================================
// Percentage
// ============================================================================

/// Progress percentage, always within `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Percentage(u8);

impl Percentage {
    pub const ZERO: Percentage = Percentage(0);
    pub const FULL: Percentage = Percentage(100);

    /// Validate a caller-supplied percentage.
    pub fn new(value: i64) -> Result<Self, TrackerError> {
        if !(0..=100).contains(&value) {
            return Err(TrackerError::validation(format!(
                "percentage must be between 0 and 100, got {}",
                value
            )));
        }
        Ok(Self(value as u8))
    }

    /// Clamp an arbitrary integer into `0..=100`.
    pub fn saturating(value: i64) -> Self {
        Self(value.clamp(0, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Percentage {
    type Error = TrackerError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Percentage> for u8 {
    fn from(p: Percentage) -> Self {
        p.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl ToSql for Percentage {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0 as i64))
    }
}

impl FromSql for Percentage {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = i64::column_result(value)?;
        Percentage::new(raw).map_err(|_| FromSqlError::OutOfRange(raw))
    }
}

// ============================================================================
// Month
// ============================================================================

/// Calendar month used as the ledger period, rendered as `YYYY-MM`.
///
/// Ordering is (year, month), which matches the lexicographic order of the
/// rendered token for four-digit years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Result<Self, TrackerError> {
        if !(1..=9999).contains(&year) {
            return Err(TrackerError::validation(format!("month year out of range: {}", year)));
        }
        if !(1..=12).contains(&month) {
            return Err(TrackerError::validation(format!("month out of range: {}", month)));
        }
        Ok(Self { year, month })
    }

    /// Month containing `date`.
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Current calendar month in local time.
    pub fn current() -> Self {
        Self::from_date(Local::now().date_naive())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }
}

impl FromStr for Month {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || TrackerError::validation(format!("month must be formatted YYYY-MM, got '{}'", s));

        let bytes = s.as_bytes();
        if bytes.len() != 7 || bytes[4] != b'-' {
            return Err(malformed());
        }
        let digits_ok = bytes[..4].iter().chain(&bytes[5..]).all(u8::is_ascii_digit);
        if !digits_ok {
            return Err(malformed());
        }

        let year: i32 = s[..4].parse().map_err(|_| malformed())?;
        let month: u32 = s[5..].parse().map_err(|_| malformed())?;
        Month::new(year, month)
    }
}

impl TryFrom<String> for Month {
    type Error = TrackerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Month> for String {
    fn from(m: Month) -> Self {
        m.to_string()
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl ToSql for Month {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for Month {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        raw.parse()
            .map_err(|e: TrackerError| FromSqlError::Other(Box::new(e)))
    }
}

// ============================================================================
// EntityKind
// ============================================================================

/// Entities that receive monthly reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Milestone,
    Activity,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Milestone => "milestone",
            EntityKind::Activity => "activity",
        }
    }

    /// Table holding rows of this kind.
    pub(crate) fn table(self) -> &'static str {
        match self {
            EntityKind::Milestone => "milestones",
            EntityKind::Activity => "activities",
        }
    }
}

impl FromStr for EntityKind {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "milestone" => Ok(EntityKind::Milestone),
            "activity" => Ok(EntityKind::Activity),
            other => Err(TrackerError::validation(format!(
                "entity kind must be 'milestone' or 'activity', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for EntityKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for EntityKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: TrackerError| FromSqlError::Other(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_bounds() {
        assert_eq!(Percentage::new(0).unwrap(), Percentage::ZERO);
        assert_eq!(Percentage::new(100).unwrap(), Percentage::FULL);
        assert!(Percentage::new(-1).is_err());
        assert!(Percentage::new(101).is_err());
    }

    #[test]
    fn test_percentage_saturating() {
        assert_eq!(Percentage::saturating(-40).value(), 0);
        assert_eq!(Percentage::saturating(125).value(), 100);
        assert_eq!(Percentage::saturating(42).value(), 42);
    }

    #[test]
    fn test_percentage_deserialize_rejects_out_of_range() {
        let ok: Percentage = serde_json::from_str("55").unwrap();
        assert_eq!(ok.value(), 55);
        assert!(serde_json::from_str::<Percentage>("150").is_err());
    }

    #[test]
    fn test_month_parse_and_display() {
        let m: Month = "2024-03".parse().unwrap();
        assert_eq!(m.year(), 2024);
        assert_eq!(m.month(), 3);
        assert_eq!(m.to_string(), "2024-03");
    }

    #[test]
    fn test_month_rejects_malformed_tokens() {
        for bad in ["2024-3", "2024/03", "24-03", "2024-13", "2024-00", "abcd-ef", "2024-03-01", ""] {
            assert!(bad.parse::<Month>().is_err(), "expected '{}' to be rejected", bad);
        }
    }

    #[test]
    fn test_month_order_matches_token_order() {
        let tokens = ["2023-12", "2024-01", "2024-02", "2024-10"];
        let months: Vec<Month> = tokens.iter().map(|t| t.parse().unwrap()).collect();
        let mut sorted = months.clone();
        sorted.sort();
        assert_eq!(months, sorted);
    }

    #[test]
    fn test_month_from_date() {
        let date = NaiveDate::from_ymd_opt(2025, 7, 31).unwrap();
        assert_eq!(Month::from_date(date).to_string(), "2025-07");
    }

    #[test]
    fn test_entity_kind_parse() {
        assert_eq!("milestone".parse::<EntityKind>().unwrap(), EntityKind::Milestone);
        assert_eq!("activity".parse::<EntityKind>().unwrap(), EntityKind::Activity);
        assert!("indicator".parse::<EntityKind>().is_err());
    }
}
