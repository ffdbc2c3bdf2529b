//! Quantitative resolution for indicators without milestones
//!
//! Targets are stored as free text so administrators can enter things like
//! "N/A" or "100 units". [`Target::parse`] classifies the stored text, and
//! [`resolve`] turns an (actual, target) pair into a percentage. A target
//! that cannot be used yields zero progress instead of an error.

use serde::{Deserialize, Serialize};

use crate::types::Percentage;

/// Classified indicator target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Target {
    Numeric(f64),
    Unspecified,
    NonNumeric(String),
}

impl Target {
    /// Classify the stored target text. Blank text counts as unspecified.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Target::Unspecified;
        };
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => Target::Numeric(value),
            _ => Target::NonNumeric(raw.to_string()),
        }
    }

    /// Positive numeric target, if any.
    pub fn usable_value(&self) -> Option<f64> {
        match self {
            Target::Numeric(value) if *value > 0.0 => Some(*value),
            _ => None,
        }
    }
}

/// `clamp(trunc(actual / target * 100), 0, 100)`, or zero when either side is unusable.
pub fn resolve(actual: Option<f64>, target: &Target) -> Percentage {
    let (Some(actual), Some(target)) = (actual.filter(|a| a.is_finite()), target.usable_value()) else {
        return Percentage::ZERO;
    };

    // `as i64` truncates toward zero and saturates on overflow
    let raw = (actual / target * 100.0) as i64;
    Percentage::saturating(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_parse() {
        assert_eq!(Target::parse(None), Target::Unspecified);
        assert_eq!(Target::parse(Some("  ")), Target::Unspecified);
        assert_eq!(Target::parse(Some("200")), Target::Numeric(200.0));
        assert_eq!(Target::parse(Some(" 12.5 ")), Target::Numeric(12.5));
        assert_eq!(Target::parse(Some("N/A")), Target::NonNumeric("N/A".to_string()));
        assert_eq!(Target::parse(Some("inf")), Target::NonNumeric("inf".to_string()));
    }

    #[test]
    fn test_resolve_over_achievement_is_capped() {
        let p = resolve(Some(250.0), &Target::parse(Some("200")));
        assert_eq!(p, Percentage::FULL);
    }

    #[test]
    fn test_resolve_truncates() {
        // 2 / 3 * 100 = 66.66..
        assert_eq!(resolve(Some(2.0), &Target::Numeric(3.0)).value(), 66);
        // 199 / 200 * 100 = 99.5
        assert_eq!(resolve(Some(199.0), &Target::Numeric(200.0)).value(), 99);
    }

    #[test]
    fn test_resolve_negative_actual_floors_at_zero() {
        assert_eq!(resolve(Some(-30.0), &Target::Numeric(100.0)), Percentage::ZERO);
    }

    #[test]
    fn test_resolve_degrades_to_zero() {
        assert_eq!(resolve(Some(10.0), &Target::parse(Some("N/A"))), Percentage::ZERO);
        assert_eq!(resolve(Some(10.0), &Target::Unspecified), Percentage::ZERO);
        assert_eq!(resolve(Some(10.0), &Target::Numeric(0.0)), Percentage::ZERO);
        assert_eq!(resolve(Some(10.0), &Target::Numeric(-5.0)), Percentage::ZERO);
        assert_eq!(resolve(None, &Target::Numeric(100.0)), Percentage::ZERO);
        assert_eq!(resolve(Some(f64::NAN), &Target::Numeric(100.0)), Percentage::ZERO);
    }
}
