//! Human-facing report lines and the confirmation prompt.

use std::io::{self, BufRead, Write};
use std::time::Duration;

use gapfill_core::driver::Confirm;
use gapfill_core::planner::PlanEstimate;
use gapfill_core::scheduler::RunReport;

/// Estimate block printed before any write.
pub fn render_estimate(estimate: &PlanEstimate, duration: Duration) -> String {
    let seconds = duration.as_secs_f64();
    format!(
        "Rows to process: {}\n\
         Estimated rows to insert: {}\n\
         Estimated delta formula updates: {}\n\
         Estimated time: {:.1} minutes ({:.0} seconds)\n",
        estimate.rows_to_process,
        estimate.rows_to_insert,
        estimate.delta_rewrites,
        seconds / 60.0,
        seconds,
    )
}

pub fn render_summary(rows_added: usize) -> String {
    format!("Cleaning complete. Rows added: {rows_added}\n")
}

/// One line per rejected write, so it can be redone by hand.
pub fn render_failures(report: &RunReport) -> String {
    let mut out = String::new();
    if report.failures.is_empty() {
        return out;
    }
    out.push_str(&format!("Failed writes: {}\n", report.failures.len()));
    for failure in &report.failures {
        out.push_str(&format!(
            "  {} at row {}: {}\n",
            failure.kind, failure.position, failure.message
        ));
    }
    out
}

/// Interprets a prompt answer; only "y" proceeds.
pub fn is_affirmative(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

/// Threshold as a person would say it: whole minutes when it divides evenly.
fn describe_threshold(threshold: Duration) -> String {
    let secs = threshold.as_secs();
    match (secs / 60, secs % 60) {
        (1, 0) => "1 minute".to_string(),
        (minutes, 0) if minutes > 0 => format!("{minutes} minutes"),
        _ if secs == 1 => "1 second".to_string(),
        _ => format!("{secs} seconds"),
    }
}

pub fn render_prompt(threshold: Duration) -> String {
    format!(
        "Warning: Estimated time exceeds {}. Continue? (y/n): ",
        describe_threshold(threshold)
    )
}

/// Asks on stdin/stdout.
pub struct StdinConfirm {
    threshold: Duration,
}

impl StdinConfirm {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }
}

impl Confirm for StdinConfirm {
    fn confirm(&mut self, _estimate: &PlanEstimate, _duration: Duration) -> bool {
        let mut stdout = io::stdout();
        let _ = write!(stdout, "{}", render_prompt(self.threshold));
        let _ = stdout.flush();

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(0) | Err(_) => false,
            Ok(_) => is_affirmative(&answer),
        }
    }
}
