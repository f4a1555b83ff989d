//! Dry-run estimation.
//!
//! The planner walks the same decision sequence a real run would, against
//! projected snapshots instead of a live store, and counts the writes. Because
//! both paths share [`evaluate`] and the projection renders repairs the way
//! the store does, the estimate matches what the run will do.

use std::borrow::Cow;
use std::time::Duration;

use crate::engine::{EngineSettings, ScanStep, evaluate};
use crate::interpolate::WriteKind;
use crate::sequence::Sequence;

/// One repair the run would perform.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRepair {
    /// Scan position of the anomalous row at the time it is reached.
    pub cursor: usize,
    pub intervals: u32,
    pub baseline: f64,
    pub observed: f64,
}

impl PlannedRepair {
    #[must_use]
    pub fn rows_to_insert(&self) -> usize {
        self.intervals.saturating_sub(1) as usize
    }
}

/// Predicted work for a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanEstimate {
    pub start: usize,
    /// Rows from `start` to the end of the snapshot.
    pub rows_to_process: usize,
    pub rows_to_insert: usize,
    pub delta_rewrites: usize,
    pub repairs: Vec<PlannedRepair>,
}

impl PlanEstimate {
    #[must_use]
    pub fn total_writes(&self) -> usize {
        self.rows_to_insert + self.delta_rewrites
    }

    /// Wall-clock time at one write per `interval`.
    #[must_use]
    pub fn estimated_duration(&self, interval: Duration) -> Duration {
        interval.saturating_mul(u32::try_from(self.total_writes()).unwrap_or(u32::MAX))
    }
}

/// Estimate a run over `snapshot` starting at `start`. Never touches a store.
#[must_use]
pub fn plan(snapshot: &Sequence, start: usize, settings: &EngineSettings) -> PlanEstimate {
    let mut estimate = PlanEstimate {
        start,
        rows_to_process: (snapshot.len() + 1).saturating_sub(start.max(1)),
        ..PlanEstimate::default()
    };

    let mut sequence = Cow::Borrowed(snapshot);
    let mut cursor = start;
    while cursor <= sequence.len() {
        let step = evaluate(&sequence, cursor, settings);
        if let ScanStep::Repair(plan) = &step {
            for op in plan.write_ops() {
                match op.kind() {
                    WriteKind::InsertRow => estimate.rows_to_insert += 1,
                    WriteKind::UpdateCell => estimate.delta_rewrites += 1,
                }
            }
            let repair = PlannedRepair {
                cursor,
                intervals: plan.intervals,
                baseline: plan.baseline,
                observed: plan.observed,
            };
            tracing::trace!(cursor, rows = repair.rows_to_insert(), "Repair planned");
            estimate.repairs.push(repair);
            sequence = Cow::Owned(sequence.project(plan));
        }
        cursor += step.advance();
    }

    tracing::debug!(
        start,
        repairs = estimate.repairs.len(),
        rows_to_insert = estimate.rows_to_insert,
        delta_rewrites = estimate.delta_rewrites,
        "Plan estimated"
    );
    estimate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::ColumnLayout;
    use crate::timestamp;

    fn log(deltas: &[f64]) -> Sequence {
        let start = timestamp::parse("2025-06-22 00:00:00").unwrap();
        let mut rows = vec![vec![String::new(), "Timestamp".into(), "Delta".into()]];
        rows.push(vec![String::new(), timestamp::render(start), String::new()]);
        let mut t = start;
        for d in deltas {
            t = timestamp::add_hours(t, *d);
            rows.push(vec![
                String::new(),
                timestamp::render(t),
                timestamp::format_hours(*d),
            ]);
        }
        Sequence::from_rows(rows, ColumnLayout::default())
    }

    #[test]
    fn counts_inserts_and_rewrites() {
        // gap of 3 at position 8, gap of 2 at position 12 (pre-repair numbering)
        let s = log(&[1.0, 1.0, 1.0, 1.0, 1.0, 3.0, 1.0, 1.0, 1.0, 2.0]);
        let estimate = plan(&s, 3, &EngineSettings::default());

        assert_eq!(estimate.rows_to_insert, 3);
        assert_eq!(estimate.delta_rewrites, 2);
        assert_eq!(estimate.total_writes(), 5);
        assert_eq!(estimate.repairs.len(), 2);
        assert_eq!(estimate.repairs[0].cursor, 8);
        // second gap shifted down by the two rows inserted above it
        assert_eq!(estimate.repairs[1].cursor, 14);
        assert_eq!(estimate.rows_to_process, s.len() - 2);
    }

    #[test]
    fn clean_log_plans_nothing() {
        let s = log(&[1.0; 12]);
        let estimate = plan(&s, 3, &EngineSettings::default());
        assert_eq!(estimate.total_writes(), 0);
        assert_eq!(
            estimate.estimated_duration(Duration::from_millis(1200)),
            Duration::ZERO
        );
    }

    #[test]
    fn duration_is_writes_times_interval() {
        let estimate = PlanEstimate {
            rows_to_insert: 249,
            delta_rewrites: 1,
            ..PlanEstimate::default()
        };
        assert_eq!(
            estimate.estimated_duration(Duration::from_millis(1200)),
            Duration::from_secs(300)
        );
    }

    #[test]
    fn start_past_end_plans_nothing() {
        let s = log(&[1.0, 1.0, 1.0, 1.0, 1.0, 3.0]);
        let estimate = plan(&s, 50, &EngineSettings::default());
        assert_eq!(estimate.rows_to_process, 0);
        assert!(estimate.repairs.is_empty());
    }
}
