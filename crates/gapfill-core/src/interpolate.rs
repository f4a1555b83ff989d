//! Synthesis of the missing rows for one detected gap.
//!
//! For a gap of `n` intervals at `cursor`, `n - 1` rows are inserted directly
//! above the anomalous row, each one baseline after the last, and the anomalous
//! row's delta is rewritten to reference its new predecessor.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::columns::ColumnLayout;
use crate::timestamp;

/// One discrete mutation against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Insert `values` as a new row at `position`, shifting later rows down.
    InsertRow { position: usize, values: Vec<String> },
    /// Overwrite a single cell.
    UpdateCell {
        position: usize,
        column: u32,
        value: String,
    },
}

impl WriteOp {
    #[must_use]
    pub fn position(&self) -> usize {
        match self {
            Self::InsertRow { position, .. } | Self::UpdateCell { position, .. } => *position,
        }
    }

    #[must_use]
    pub fn kind(&self) -> WriteKind {
        match self {
            Self::InsertRow { .. } => WriteKind::InsertRow,
            Self::UpdateCell { .. } => WriteKind::UpdateCell,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteKind {
    InsertRow,
    UpdateCell,
}

impl std::fmt::Display for WriteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsertRow => write!(f, "insert_row"),
            Self::UpdateCell => write!(f, "update_cell"),
        }
    }
}

/// A row the engine synthesizes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticRow {
    /// Position the row occupies once every insert of its repair succeeded.
    pub position: usize,
    pub timestamp: NaiveDateTime,
}

/// Everything needed to repair one gap.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairPlan {
    /// Position of the anomalous row before repair.
    pub cursor: usize,
    /// Baseline intervals the anomalous delta spans.
    pub intervals: u32,
    pub baseline: f64,
    pub observed: f64,
    /// Timestamp of the row above the gap.
    pub previous: NaiveDateTime,
    pub marker: String,
    pub layout: ColumnLayout,
    pub rows: Vec<SyntheticRow>,
}

impl RepairPlan {
    /// Build the plan for a gap of `intervals` at `cursor`.
    ///
    /// `intervals` must be at least 2.
    #[must_use]
    pub fn build(
        cursor: usize,
        intervals: u32,
        baseline: f64,
        observed: f64,
        previous: NaiveDateTime,
        layout: &ColumnLayout,
        marker: &str,
    ) -> Self {
        let rows = (1..intervals)
            .map(|k| SyntheticRow {
                position: cursor + k as usize - 1,
                timestamp: timestamp::add_hours(previous, baseline * f64::from(k)),
            })
            .collect();

        Self {
            cursor,
            intervals,
            baseline,
            observed,
            previous,
            marker: marker.to_string(),
            layout: *layout,
            rows,
        }
    }

    #[must_use]
    pub fn rows_to_insert(&self) -> usize {
        self.rows.len()
    }

    /// Position of the anomalous row after all inserts.
    #[must_use]
    pub fn shifted_position(&self) -> usize {
        self.cursor + self.rows.len()
    }

    /// Payload for `row` placed at `position` (store-native timestamp, delta formula, marker).
    #[must_use]
    pub fn row_values(&self, row: &SyntheticRow, position: usize) -> Vec<String> {
        self.layout.build_row(
            timestamp::encode_native(row.timestamp),
            self.layout.delta_formula(position),
            &self.marker,
        )
    }

    /// Insert of `row` at `position`.
    ///
    /// `position` differs from `row.position` only when an earlier insert of the
    /// same repair was rejected.
    #[must_use]
    pub fn insert_op(&self, row: &SyntheticRow, position: usize) -> WriteOp {
        WriteOp::InsertRow {
            position,
            values: self.row_values(row, position),
        }
    }

    /// Rewrite of the anomalous row's delta once it sits at `position`.
    #[must_use]
    pub fn rewrite_op(&self, position: usize) -> WriteOp {
        WriteOp::UpdateCell {
            position,
            column: self.layout.delta,
            value: self.layout.delta_formula(position),
        }
    }

    /// Writes in the order they apply when every one succeeds: inserts
    /// top-down, then the rewrite.
    #[must_use]
    pub fn write_ops(&self) -> Vec<WriteOp> {
        self.rows
            .iter()
            .map(|row| self.insert_op(row, row.position))
            .chain(std::iter::once(self.rewrite_op(self.shifted_position())))
            .collect()
    }
}
