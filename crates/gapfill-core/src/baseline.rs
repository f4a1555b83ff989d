//! Rolling "expected delta" from recent history.

use crate::sequence::Sequence;

/// Number of preceding deltas averaged into a baseline.
pub const DEFAULT_WINDOW: usize = 5;

/// Mean of the valid deltas in `[cursor - window, cursor - 1]`.
///
/// Boundary rows and non-numeric deltas are skipped. The baseline exists only
/// when every one of the `window` slots held a valid value; otherwise `None`,
/// which is the normal state near the start of the log or after irregular rows.
#[must_use]
pub fn compute_baseline(sequence: &Sequence, cursor: usize, window: usize) -> Option<f64> {
    if window == 0 || cursor <= window {
        return None;
    }
    let values: Vec<f64> = (cursor - window..cursor)
        .filter(|&position| !sequence.is_boundary(position))
        .filter_map(|position| sequence.delta(position))
        .collect();

    if values.len() < window {
        return None;
    }
    Some(values.iter().sum::<f64>() / window as f64)
}
