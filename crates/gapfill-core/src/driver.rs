//! One cleaning run, end to end.
//!
//! ```text
//! prepare:  read snapshot ─→ plan ─→ estimate
//! gate:     estimate > threshold ? confirm : proceed
//! execute:  scan + repair (WriteScheduler) ─→ report
//! ```
//!
//! [`RunDriver::run`] chains the three; the CLI calls the phases itself so it
//! can print the estimate and prompt between them.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::config::Config;
use crate::engine::{Cancellation, EngineSettings};
use crate::error::Result;
use crate::planner::{PlanEstimate, plan};
use crate::scheduler::{DEFAULT_WRITE_INTERVAL, RunReport, WriteScheduler};
use crate::sequence::Sequence;
use crate::store::TabularStore;

/// Default estimate above which the user is asked to confirm.
pub const DEFAULT_CONFIRM_THRESHOLD: Duration = Duration::from_secs(300);

/// Decides whether a long run may proceed.
pub trait Confirm {
    fn confirm(&mut self, estimate: &PlanEstimate, duration: Duration) -> bool;
}

/// Proceeds without asking.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&mut self, _estimate: &PlanEstimate, _duration: Duration) -> bool {
        true
    }
}

/// Snapshot and estimate, ready to execute.
#[derive(Debug, Clone)]
pub struct Prepared {
    snapshot: Sequence,
    pub start: usize,
    pub estimate: PlanEstimate,
}

impl Prepared {
    #[must_use]
    pub fn snapshot(&self) -> &Sequence {
        &self.snapshot
    }
}

/// How a run ended.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Writes were issued (possibly cut short by cancellation).
    Completed {
        estimate: PlanEstimate,
        report: RunReport,
    },
    /// The user declined the confirmation prompt. Nothing was written.
    Declined { estimate: PlanEstimate },
    /// Estimation only.
    DryRun { estimate: PlanEstimate },
}

impl RunOutcome {
    #[must_use]
    pub fn rows_added(&self) -> usize {
        match self {
            Self::Completed { report, .. } => report.rows_added(),
            Self::Declined { .. } | Self::DryRun { .. } => 0,
        }
    }

    #[must_use]
    pub fn estimate(&self) -> &PlanEstimate {
        match self {
            Self::Completed { estimate, .. }
            | Self::Declined { estimate }
            | Self::DryRun { estimate } => estimate,
        }
    }
}

/// Orchestrates planning, confirmation and execution against one store.
#[derive(Clone)]
pub struct RunDriver {
    store: Arc<dyn TabularStore>,
    settings: EngineSettings,
    write_interval: Duration,
    confirm_threshold: Duration,
    cancel: Cancellation,
    dry_run: bool,
}

impl RunDriver {
    #[must_use]
    pub fn new(store: Arc<dyn TabularStore>, settings: EngineSettings) -> Self {
        Self {
            store,
            settings,
            write_interval: DEFAULT_WRITE_INTERVAL,
            confirm_threshold: DEFAULT_CONFIRM_THRESHOLD,
            cancel: Cancellation::new(),
            dry_run: false,
        }
    }

    #[must_use]
    pub fn from_config(store: Arc<dyn TabularStore>, config: &Config) -> Self {
        Self::new(store, EngineSettings::from(config))
            .with_write_interval(config.engine.write_interval())
            .with_confirm_threshold(config.engine.confirm_threshold())
    }

    #[must_use]
    pub fn with_write_interval(mut self, interval: Duration) -> Self {
        self.write_interval = interval;
        self
    }

    #[must_use]
    pub fn with_confirm_threshold(mut self, threshold: Duration) -> Self {
        self.confirm_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Estimated durations above this need confirmation.
    #[must_use]
    pub fn confirm_threshold(&self) -> Duration {
        self.confirm_threshold
    }

    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    #[must_use]
    pub fn estimated_duration(&self, estimate: &PlanEstimate) -> Duration {
        estimate.estimated_duration(self.write_interval)
    }

    /// Whether the estimate is long enough to ask first.
    #[must_use]
    pub fn needs_confirmation(&self, estimate: &PlanEstimate) -> bool {
        self.estimated_duration(estimate) > self.confirm_threshold
    }

    /// Read the log and estimate the work from `start`.
    pub async fn prepare(&self, start: usize) -> Result<Prepared> {
        let rows = self.store.read_all().await.inspect_err(|err| {
            error!(error = %err, "Failed to read the log");
        })?;
        let snapshot = Sequence::from_rows(rows, self.settings.layout);
        let estimate = plan(&snapshot, start, &self.settings);
        info!(
            start,
            rows = snapshot.len(),
            rows_to_insert = estimate.rows_to_insert,
            delta_rewrites = estimate.delta_rewrites,
            estimated_secs = self.estimated_duration(&estimate).as_secs(),
            "Run planned"
        );
        Ok(Prepared {
            snapshot,
            start,
            estimate,
        })
    }

    /// Scan and repair from the prepared snapshot.
    pub async fn execute(&self, prepared: Prepared) -> Result<RunReport> {
        let scheduler =
            WriteScheduler::new(self.store.clone(), self.write_interval, self.cancel.clone())
                .with_expected_writes(prepared.estimate.total_writes());
        scheduler
            .run(prepared.snapshot, prepared.start, &self.settings)
            .await
            .inspect_err(|err| error!(error = %err, "Run aborted"))
    }

    /// Prepare, gate on `confirm` when needed, then execute.
    pub async fn run(&self, start: usize, confirm: &mut dyn Confirm) -> Result<RunOutcome> {
        let prepared = self.prepare(start).await?;
        let estimate = prepared.estimate.clone();

        if self.dry_run {
            return Ok(RunOutcome::DryRun { estimate });
        }
        if self.needs_confirmation(&estimate)
            && !confirm.confirm(&estimate, self.estimated_duration(&estimate))
        {
            info!("Run declined at confirmation");
            return Ok(RunOutcome::Declined { estimate });
        }

        let report = self.execute(prepared).await?;
        Ok(RunOutcome::Completed { estimate, report })
    }
}
