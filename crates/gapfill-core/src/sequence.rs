//! Owned snapshot of the log.
//!
//! A [`Sequence`] is what one `read_all` returned, interpreted through a
//! [`ColumnLayout`]. It is never patched: after a structural write the run
//! fetches a fresh one, and the planner builds projected copies with
//! [`Sequence::project`].

use chrono::NaiveDateTime;

use crate::columns::ColumnLayout;
use crate::interpolate::RepairPlan;
use crate::timestamp;

#[derive(Debug, Clone)]
pub struct Sequence {
    rows: Vec<Vec<String>>,
    layout: ColumnLayout,
}

impl Sequence {
    #[must_use]
    pub fn from_rows(rows: Vec<Vec<String>>, layout: ColumnLayout) -> Self {
        Self { rows, layout }
    }

    /// Number of rows, header included. The last position equals `len()`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn layout(&self) -> &ColumnLayout {
        &self.layout
    }

    /// Raw rows, index 0 holding position 1.
    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Cell text at a 1-based position and column. Missing cells read as blank.
    #[must_use]
    pub fn cell(&self, position: usize, column: u32) -> &str {
        if position == 0 || column == 0 {
            return "";
        }
        self.rows
            .get(position - 1)
            .and_then(|row| row.get(column as usize - 1))
            .map_or("", String::as_str)
    }

    /// Whether `position` lies in the header/boundary band.
    #[must_use]
    pub fn is_boundary(&self, position: usize) -> bool {
        position <= self.layout.boundary_rows
    }

    /// Evaluated delta at `position`, if it is numeric.
    #[must_use]
    pub fn delta(&self, position: usize) -> Option<f64> {
        timestamp::parse_number(self.cell(position, self.layout.delta))
    }

    /// Parsed timestamp at `position`, if any candidate format matches.
    #[must_use]
    pub fn timestamp(&self, position: usize) -> Option<NaiveDateTime> {
        timestamp::parse(self.cell(position, self.layout.timestamp))
    }

    /// Most recent parseable timestamp among the data rows.
    #[must_use]
    pub fn latest_timestamp(&self) -> Option<NaiveDateTime> {
        (2..=self.len())
            .filter_map(|position| self.timestamp(position))
            .max()
    }

    /// A new snapshot showing what the store would return after `plan` is applied.
    ///
    /// Synthetic rows render with evaluated timestamps and deltas, and the
    /// anomalous row's delta is recomputed against its new predecessor. Rows
    /// below the repair keep their values; their formulas shift with them.
    #[must_use]
    pub fn project(&self, plan: &RepairPlan) -> Self {
        let layout = self.layout;
        let split = plan.cursor.saturating_sub(1).min(self.rows.len());
        let mut rows = Vec::with_capacity(self.rows.len() + plan.rows.len());
        rows.extend_from_slice(&self.rows[..split]);

        let mut previous = plan.previous;
        for synthetic in &plan.rows {
            let delta = timestamp::hours_between(previous, synthetic.timestamp);
            rows.push(layout.build_row(
                timestamp::render(synthetic.timestamp),
                timestamp::format_hours(delta),
                &plan.marker,
            ));
            previous = synthetic.timestamp;
        }

        if let Some(original) = self.rows.get(split) {
            let mut original = original.clone();
            let delta_index = layout.delta as usize - 1;
            if original.len() <= delta_index {
                original.resize(delta_index + 1, String::new());
            }
            original[delta_index] = self
                .timestamp(plan.cursor)
                .map(|ts| timestamp::format_hours(timestamp::hours_between(previous, ts)))
                .unwrap_or_default();
            rows.push(original);
            rows.extend_from_slice(&self.rows[split + 1..]);
        }

        Self { rows, layout }
    }
}
