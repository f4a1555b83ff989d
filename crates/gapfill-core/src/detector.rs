//! Gap decision from a baseline and the observed delta.

/// Default relative tolerance for accepting a near-integer multiple.
pub const DEFAULT_TOLERANCE: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapDecision {
    /// The observed delta is a normal single interval (or not a clean multiple).
    NoGap,
    /// The observed delta spans `intervals` baseline intervals; `intervals - 1`
    /// readings are missing.
    GapFound { intervals: u32 },
}

impl GapDecision {
    /// Rows the interpolator will insert for this decision.
    #[must_use]
    pub fn rows_to_insert(&self) -> u32 {
        match self {
            Self::NoGap => 0,
            Self::GapFound { intervals } => intervals - 1,
        }
    }
}

/// Decide whether `observed` hides missing readings.
///
/// `n = round(observed / baseline)` (half away from zero). A gap is reported
/// iff `n > 1` and `|observed - n * baseline| < tolerance * baseline * n`.
/// Non-positive or non-finite inputs never produce a gap.
#[must_use]
pub fn detect_gap(baseline: f64, observed: f64, tolerance: f64) -> GapDecision {
    if !(baseline.is_finite() && observed.is_finite()) || baseline <= 0.0 {
        return GapDecision::NoGap;
    }
    let ratio = (observed / baseline).round();
    if !(ratio > 1.0 && ratio <= f64::from(u32::MAX)) {
        return GapDecision::NoGap;
    }
    let bound = tolerance * baseline * ratio;
    if (observed - ratio * baseline).abs() < bound {
        GapDecision::GapFound {
            intervals: ratio as u32,
        }
    } else {
        GapDecision::NoGap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_near_multiple() {
        assert_eq!(
            detect_gap(1.0, 3.05, DEFAULT_TOLERANCE),
            GapDecision::GapFound { intervals: 3 }
        );
        assert_eq!(detect_gap(1.0, 3.05, DEFAULT_TOLERANCE).rows_to_insert(), 2);
    }

    #[test]
    fn single_interval_is_not_a_gap() {
        assert_eq!(detect_gap(1.0, 1.3, DEFAULT_TOLERANCE), GapDecision::NoGap);
        assert_eq!(detect_gap(1.0, 1.0, DEFAULT_TOLERANCE), GapDecision::NoGap);
        assert_eq!(detect_gap(1.0, 0.2, DEFAULT_TOLERANCE), GapDecision::NoGap);
    }

    #[test]
    fn half_rounds_away_from_zero() {
        // 1.5 rounds to 2; |1.5 - 2| = 0.5 > 0.4 so still rejected.
        assert_eq!(detect_gap(1.0, 1.5, DEFAULT_TOLERANCE), GapDecision::NoGap);
        // 2.5 rounds to 3; |2.5 - 3| = 0.5 < 0.6.
        assert_eq!(
            detect_gap(1.0, 2.5, DEFAULT_TOLERANCE),
            GapDecision::GapFound { intervals: 3 }
        );
    }

    #[test]
    fn tolerance_scales_with_n() {
        // n=2: bound 0.4, miss by 0.39 accepted, by 0.41 rejected (rounds to 2 still).
        assert_eq!(
            detect_gap(1.0, 2.39, DEFAULT_TOLERANCE),
            GapDecision::GapFound { intervals: 2 }
        );
        assert_eq!(detect_gap(1.0, 1.59, DEFAULT_TOLERANCE), GapDecision::NoGap);
        // n=10: bound 1.0
        assert_eq!(
            detect_gap(0.5, 5.2, DEFAULT_TOLERANCE),
            GapDecision::GapFound { intervals: 10 }
        );
    }

    #[test]
    fn degenerate_inputs_never_gap() {
        assert_eq!(detect_gap(0.0, 3.0, DEFAULT_TOLERANCE), GapDecision::NoGap);
        assert_eq!(detect_gap(-1.0, 3.0, DEFAULT_TOLERANCE), GapDecision::NoGap);
        assert_eq!(detect_gap(1.0, f64::NAN, DEFAULT_TOLERANCE), GapDecision::NoGap);
        assert_eq!(detect_gap(1.0, -3.0, DEFAULT_TOLERANCE), GapDecision::NoGap);
    }
}
