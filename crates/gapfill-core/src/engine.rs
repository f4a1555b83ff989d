//! The per-cursor decision shared by the planner and the real run.
//!
//! ```text
//! Scanning ─┬─ BaselineUnavailable ─────────────── advance 1
//!           ├─ DeltaUnavailable / TimestampUnavailable ─ advance 1
//!           ├─ NoGap ───────────────────────────── advance 1
//!           └─ Repair(n) → write → refresh ─────── advance n
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::baseline::compute_baseline;
use crate::columns::ColumnLayout;
use crate::config::Config;
use crate::detector::{GapDecision, detect_gap};
use crate::interpolate::RepairPlan;
use crate::sequence::Sequence;

/// Detection parameters, resolved from configuration.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub window: usize,
    pub tolerance: f64,
    pub layout: ColumnLayout,
    pub marker: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            window: crate::baseline::DEFAULT_WINDOW,
            tolerance: crate::detector::DEFAULT_TOLERANCE,
            layout: ColumnLayout::default(),
            marker: "cleaned".to_string(),
        }
    }
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        Self {
            window: config.engine.window,
            tolerance: config.engine.tolerance,
            layout: config.columns.layout(),
            marker: config.engine.marker.clone(),
        }
    }
}

/// Outcome of evaluating one cursor position.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanStep {
    /// Fewer than `window` valid deltas precede the cursor.
    BaselineUnavailable,
    /// The cursor row's delta is not numeric.
    DeltaUnavailable,
    /// A gap was found but the row above has no parseable timestamp.
    TimestampUnavailable,
    /// Normal interval.
    NoGap { baseline: f64, observed: f64 },
    /// Missing readings to synthesize.
    Repair(RepairPlan),
}

impl ScanStep {
    /// Cursor increment after this step, in post-repair numbering.
    #[must_use]
    pub fn advance(&self) -> usize {
        match self {
            Self::Repair(plan) => plan.intervals as usize,
            _ => 1,
        }
    }
}

/// Evaluate the row at `cursor`.
#[must_use]
pub fn evaluate(sequence: &Sequence, cursor: usize, settings: &EngineSettings) -> ScanStep {
    let Some(baseline) = compute_baseline(sequence, cursor, settings.window) else {
        return ScanStep::BaselineUnavailable;
    };
    let Some(observed) = sequence.delta(cursor) else {
        return ScanStep::DeltaUnavailable;
    };

    match detect_gap(baseline, observed, settings.tolerance) {
        GapDecision::NoGap => ScanStep::NoGap { baseline, observed },
        GapDecision::GapFound { intervals } => {
            let Some(previous) = sequence.timestamp(cursor - 1) else {
                return ScanStep::TimestampUnavailable;
            };
            ScanStep::Repair(RepairPlan::build(
                cursor,
                intervals,
                baseline,
                observed,
                previous,
                &settings.layout,
                &settings.marker,
            ))
        }
    }
}

/// Cooperative stop signal, checked between writes.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hourly log with `deltas[i]` hours between consecutive rows (row 2 first).
    fn hourly(deltas: &[f64]) -> Sequence {
        let start = crate::timestamp::parse("2025-06-22 00:00:00").unwrap();
        let mut rows = vec![vec![String::new(), "Timestamp".into(), "Delta".into()]];
        rows.push(vec![String::new(), crate::timestamp::render(start), String::new()]);
        let mut t = start;
        for d in deltas {
            t = crate::timestamp::add_hours(t, *d);
            rows.push(vec![
                String::new(),
                crate::timestamp::render(t),
                crate::timestamp::format_hours(*d),
            ]);
        }
        Sequence::from_rows(rows, ColumnLayout::default())
    }

    #[test]
    fn gap_after_full_window_is_repaired() {
        // positions 3..=7 hold 1h, position 8 holds 3.05h
        let s = hourly(&[1.0, 1.0, 1.0, 1.0, 1.0, 3.05]);
        let step = evaluate(&s, 8, &EngineSettings::default());
        let ScanStep::Repair(plan) = &step else {
            panic!("expected repair, got {step:?}");
        };
        assert_eq!(plan.intervals, 3);
        assert_eq!(plan.rows_to_insert(), 2);
        assert_eq!(
            crate::timestamp::render(plan.rows[0].timestamp),
            "2025-06-22 06:00:00"
        );
        assert_eq!(step.advance(), 3);
    }

    #[test]
    fn short_history_skips() {
        let s = hourly(&[1.0, 1.0, 1.0, 1.0, 3.0]);
        assert_eq!(
            evaluate(&s, 7, &EngineSettings::default()),
            ScanStep::BaselineUnavailable
        );
    }

    #[test]
    fn normal_row_advances_by_one() {
        let s = hourly(&[1.0, 1.0, 1.0, 1.0, 1.0, 1.3]);
        let step = evaluate(&s, 8, &EngineSettings::default());
        assert!(matches!(step, ScanStep::NoGap { .. }));
        assert_eq!(step.advance(), 1);
    }

    #[test]
    fn unparseable_previous_timestamp_skips() {
        let mut rows = hourly(&[1.0, 1.0, 1.0, 1.0, 1.0, 3.0]).rows().to_vec();
        rows[6][1] = "not a time".to_string();
        let s = Sequence::from_rows(rows, ColumnLayout::default());
        assert_eq!(
            evaluate(&s, 8, &EngineSettings::default()),
            ScanStep::TimestampUnavailable
        );
    }

    #[test]
    fn blank_delta_skips() {
        let mut rows = hourly(&[1.0, 1.0, 1.0, 1.0, 1.0, 3.0]).rows().to_vec();
        rows[7][2] = String::new();
        let s = Sequence::from_rows(rows, ColumnLayout::default());
        assert_eq!(
            evaluate(&s, 8, &EngineSettings::default()),
            ScanStep::DeltaUnavailable
        );
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let cancel = Cancellation::new();
        let observer = cancel.clone();
        assert!(!observer.is_cancelled());
        cancel.cancel();
        assert!(observer.is_cancelled());
    }
}
