//! Paced, sequential execution of repairs against a live store.
//!
//! Writes are issued one at a time and every write, successful or not, is
//! followed by a fixed pause so the remote quota is never exceeded. A failed
//! write is logged and skipped; the remaining writes of the same repair still
//! run, placed against the rows that actually landed. After each repair the
//! snapshot is re-read from the store before scanning resumes.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::columns::ColumnLayout;
use crate::engine::{Cancellation, EngineSettings, ScanStep, evaluate};
use crate::error::{Result, StoreError};
use crate::interpolate::{RepairPlan, WriteKind, WriteOp};
use crate::sequence::Sequence;
use crate::store::{InputMode, TabularStore};

/// Default pause after every write (the Sheets per-user write quota is 60/min).
pub const DEFAULT_WRITE_INTERVAL: Duration = Duration::from_millis(1200);

/// A write the store rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    pub kind: WriteKind,
    pub position: usize,
    pub message: String,
}

/// What a real run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Cursor positions evaluated.
    pub rows_scanned: usize,
    /// Gaps for which a repair was started.
    pub gaps_repaired: usize,
    /// Synthetic rows the store accepted.
    pub rows_inserted: usize,
    /// Delta rewrites the store accepted.
    pub deltas_rewritten: usize,
    /// Writes issued, including failures.
    pub writes_attempted: usize,
    pub failures: Vec<WriteFailure>,
    /// The run stopped early on user request.
    pub cancelled: bool,
}

impl RunReport {
    #[must_use]
    pub fn rows_added(&self) -> usize {
        self.rows_inserted
    }
}

/// Applies repairs to a store at a bounded rate.
#[derive(Clone)]
pub struct WriteScheduler {
    store: Arc<dyn TabularStore>,
    interval: Duration,
    cancel: Cancellation,
    /// Writes the plan predicted, for progress reporting. Zero when unknown.
    expected_writes: usize,
}

impl WriteScheduler {
    #[must_use]
    pub fn new(store: Arc<dyn TabularStore>, interval: Duration, cancel: Cancellation) -> Self {
        Self {
            store,
            interval,
            cancel,
            expected_writes: 0,
        }
    }

    #[must_use]
    pub fn with_expected_writes(mut self, total: usize) -> Self {
        self.expected_writes = total;
        self
    }

    /// Fetch a fresh snapshot.
    pub async fn refresh(&self, layout: ColumnLayout) -> Result<Sequence> {
        let rows = self.store.read_all().await?;
        debug!(rows = rows.len(), "Refreshed snapshot");
        Ok(Sequence::from_rows(rows, layout))
    }

    async fn write(&self, op: &WriteOp) -> std::result::Result<(), StoreError> {
        match op {
            WriteOp::InsertRow { position, values } => {
                self.store
                    .insert_row(values, *position, InputMode::UserEntered)
                    .await
            }
            WriteOp::UpdateCell {
                position,
                column,
                value,
            } => self.store.update_cell(*position, *column, value).await,
        }
    }

    /// Issue one write, record the outcome and pause. Returns whether it was applied.
    async fn issue(&self, op: &WriteOp, cursor: usize, report: &mut RunReport) -> bool {
        report.writes_attempted += 1;
        let applied = match self.write(op).await {
            Ok(()) => {
                debug!(op = %op.kind(), position = op.position(), "Write applied");
                match op.kind() {
                    WriteKind::InsertRow => report.rows_inserted += 1,
                    WriteKind::UpdateCell => report.deltas_rewritten += 1,
                }
                true
            }
            Err(err) => {
                error!(
                    op = %op.kind(),
                    position = op.position(),
                    cursor,
                    error = %err,
                    "Write failed; continuing with the next one"
                );
                report.failures.push(WriteFailure {
                    kind: op.kind(),
                    position: op.position(),
                    message: err.to_string(),
                });
                false
            }
        };

        info!(
            writes = report.writes_attempted,
            total = self.expected_writes.max(report.writes_attempted),
            "Write progress"
        );
        tokio::time::sleep(self.interval).await;
        applied
    }

    /// Apply one repair: inserts top-down, then the delta rewrite.
    ///
    /// Each insert goes directly below the synthetic rows that actually landed,
    /// so a rejected insert leaves no hole. No further inserts start once
    /// cancellation is requested, but whenever at least one row landed the
    /// anomalous row's delta is still rewritten against its new neighbour,
    /// leaving the log consistent for the next run. Returns the rows inserted.
    pub async fn apply(&self, plan: &RepairPlan, report: &mut RunReport) -> usize {
        let mut inserted = 0;
        for row in &plan.rows {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let op = plan.insert_op(row, plan.cursor + inserted);
            if self.issue(&op, plan.cursor, report).await {
                inserted += 1;
            }
        }

        if inserted > 0 {
            let op = plan.rewrite_op(plan.cursor + inserted);
            self.issue(&op, plan.cursor, report).await;
        }
        inserted
    }

    /// Scan from `start` to the end of the log, repairing every gap found.
    ///
    /// `snapshot` is the state the scan starts from; it is replaced by a fresh
    /// read after every repair.
    pub async fn run(
        &self,
        snapshot: Sequence,
        start: usize,
        settings: &EngineSettings,
    ) -> Result<RunReport> {
        let mut report = RunReport::default();
        let mut sequence = snapshot;
        let mut cursor = start;

        while cursor <= sequence.len() {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let step = evaluate(&sequence, cursor, settings);
            report.rows_scanned += 1;

            match &step {
                ScanStep::Repair(plan) => {
                    info!(
                        cursor,
                        baseline = plan.baseline,
                        observed = plan.observed,
                        intervals = plan.intervals,
                        rows = plan.rows_to_insert(),
                        "Gap detected; inserting rows"
                    );
                    report.gaps_repaired += 1;
                    let inserted = self.apply(plan, &mut report).await;
                    if report.cancelled {
                        break;
                    }
                    sequence = self.refresh(*sequence.layout()).await?;
                    // Resume on the row after the anomalous one, wherever it landed
                    cursor += inserted + 1;
                    continue;
                }
                ScanStep::TimestampUnavailable => {
                    warn!(
                        cursor,
                        "Gap detected but the previous timestamp is unreadable; skipping"
                    );
                }
                ScanStep::NoGap { baseline, observed } => {
                    debug!(cursor, baseline, observed, "No gap");
                }
                ScanStep::BaselineUnavailable | ScanStep::DeltaUnavailable => {
                    debug!(cursor, step = ?step, "Row skipped");
                }
            }

            cursor += step.advance();
        }

        info!(
            rows_scanned = report.rows_scanned,
            gaps = report.gaps_repaired,
            rows_inserted = report.rows_inserted,
            failures = report.failures.len(),
            cancelled = report.cancelled,
            "Scan finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{MemoryStore, RecordedWrite};

    fn plan_at(cursor: usize) -> RepairPlan {
        let previous = crate::timestamp::parse("2025-06-22 05:00:00").unwrap();
        RepairPlan::build(
            cursor,
            3,
            1.0,
            3.0,
            previous,
            &ColumnLayout::default(),
            "cleaned",
        )
    }

    fn store_with_rows(n: usize) -> Arc<MemoryStore> {
        let rows = (0..n)
            .map(|i| vec![String::new(), format!("row {i}"), String::new()])
            .collect();
        Arc::new(MemoryStore::from_rows(rows))
    }

    #[tokio::test(start_paused = true)]
    async fn writes_are_paced() {
        let store = store_with_rows(10);
        let scheduler = WriteScheduler::new(store.clone(), DEFAULT_WRITE_INTERVAL, Cancellation::new());
        let mut report = RunReport::default();

        let started = tokio::time::Instant::now();
        scheduler.apply(&plan_at(8), &mut report).await;

        assert_eq!(report.writes_attempted, 3);
        assert!(started.elapsed() >= DEFAULT_WRITE_INTERVAL * 3);
        assert_eq!(store.writes().len(), 3);
    }

    /// Shared buffer for captured log output.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn every_write_reports_progress_against_the_plan() {
        let logs = CapturedLogs::default();
        let sink = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .flatten_event(true)
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || sink.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let store = store_with_rows(10);
        let scheduler = WriteScheduler::new(store, DEFAULT_WRITE_INTERVAL, Cancellation::new())
            .with_expected_writes(3);
        let mut report = RunReport::default();
        scheduler.apply(&plan_at(8), &mut report).await;

        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let progress: Vec<(u64, u64)> = text
            .lines()
            .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
            .filter(|event| event["message"] == "Write progress")
            .map(|event| {
                (
                    event["writes"].as_u64().unwrap(),
                    event["total"].as_u64().unwrap(),
                )
            })
            .collect();
        assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_write_does_not_stop_the_repair() {
        let store = store_with_rows(10);
        store.fail_write_attempt(1);
        let scheduler = WriteScheduler::new(store.clone(), DEFAULT_WRITE_INTERVAL, Cancellation::new());
        let mut report = RunReport::default();

        scheduler.apply(&plan_at(8), &mut report).await;

        assert_eq!(report.writes_attempted, 3);
        assert_eq!(report.rows_inserted, 1);
        assert_eq!(report.deltas_rewritten, 1);
        // the surviving row takes the first slot; the rewrite follows it
        assert_eq!(
            store.writes().iter().map(|w| match w {
                RecordedWrite::InsertRow { position, .. }
                | RecordedWrite::UpdateCell { position, .. } => *position,
                RecordedWrite::UpdateRange { range, .. } => range.start_row,
            }).collect::<Vec<_>>(),
            vec![8, 9]
        );
        assert_eq!(
            report.failures,
            vec![WriteFailure {
                kind: WriteKind::InsertRow,
                position: 8,
                message: "API error (500): injected failure at row 8".to_string(),
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_before_next_write() {
        let store = store_with_rows(10);
        let cancel = Cancellation::new();
        cancel.cancel();
        let scheduler = WriteScheduler::new(store.clone(), DEFAULT_WRITE_INTERVAL, cancel);
        let mut report = RunReport::default();

        scheduler.apply(&plan_at(8), &mut report).await;

        assert!(report.cancelled);
        assert_eq!(report.writes_attempted, 0);
        assert!(store.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_mid_repair_still_rewrites_the_delta() {
        let store = store_with_rows(10);
        let cancel = Cancellation::new();
        let scheduler =
            WriteScheduler::new(store.clone(), DEFAULT_WRITE_INTERVAL, cancel.clone());
        let mut report = RunReport::default();

        let trigger = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(600)).await;
            cancel.cancel();
        });
        let inserted = scheduler.apply(&plan_at(8), &mut report).await;
        trigger.await.unwrap();

        assert!(report.cancelled);
        assert_eq!(inserted, 1);
        assert_eq!(report.rows_inserted, 1);
        assert_eq!(report.deltas_rewritten, 1);
        assert_eq!(
            store.writes().last(),
            Some(&RecordedWrite::UpdateCell {
                position: 9,
                column: 3,
                value: "=IF(ISDATE(B9),ROUND((B9-B8)*24,2),)".to_string(),
            })
        );
    }
}
