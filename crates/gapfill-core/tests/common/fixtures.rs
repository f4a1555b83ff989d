//! Log fixtures shaped like a real sheet: text timestamps in column B and
//! live delta formulas in column C.

use std::sync::Arc;

use gapfill_core::columns::ColumnLayout;
use gapfill_core::store::memory::{MemoryStore, RecordedWrite};
use gapfill_core::timestamp;

pub const START: &str = "2025-06-22 00:00:00";

/// Rows for a log whose readings sit at `offsets` hours after [`START`].
#[must_use]
pub fn log_rows(offsets: &[f64]) -> Vec<Vec<String>> {
    let layout = ColumnLayout::default();
    let start = timestamp::parse(START).expect("fixture start parses");
    let mut rows = vec![vec![String::new(), "Timestamp".to_string(), "Delta".to_string()]];
    for (i, offset) in offsets.iter().enumerate() {
        let position = i + 2;
        let delta = if position > 2 {
            layout.delta_formula(position)
        } else {
            String::new()
        };
        rows.push(vec![
            String::new(),
            timestamp::render(timestamp::add_hours(start, *offset)),
            delta,
        ]);
    }
    rows
}

/// Readings every `base` hours, where each step spans `steps[i]` intervals.
#[must_use]
pub fn offsets_from_steps(base: f64, steps: &[u32]) -> Vec<f64> {
    let mut offsets = vec![0.0];
    let mut units = 0u32;
    for step in steps {
        units += step;
        offsets.push(base * f64::from(units));
    }
    offsets
}

#[must_use]
pub fn store(offsets: &[f64]) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::from_rows(log_rows(offsets)))
}

/// Hourly readings 0..=17h with a three-hour hole before 08:00 (position 8)
/// and a two-hour hole before 16:00 (position 15).
#[must_use]
pub fn two_gap_offsets() -> Vec<f64> {
    [0, 1, 2, 3, 4, 5, 8, 9, 10, 11, 12, 13, 14, 16, 17]
        .into_iter()
        .map(f64::from)
        .collect()
}

#[must_use]
pub fn write_positions(writes: &[RecordedWrite]) -> Vec<usize> {
    writes
        .iter()
        .map(|w| match w {
            RecordedWrite::InsertRow { position, .. }
            | RecordedWrite::UpdateCell { position, .. } => *position,
            RecordedWrite::UpdateRange { range, .. } => range.start_row,
        })
        .collect()
}
