//! In-process store with spreadsheet semantics.
//!
//! Cells hold what was entered. Reads evaluate the two expression shapes the
//! engine writes (native date/time and the delta formula) and render them the
//! way a spreadsheet displays them. Row inserts shift every formula reference
//! at or below the insertion point, so a repaired log reads back exactly as the
//! remote store would show it.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, OnceLock};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use regex::{Captures, Regex};

use super::{InputMode, TabularStore};
use crate::columns::{RangeSpec, column_index};
use crate::error::StoreError;
use crate::timestamp;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Cell {
    /// Typed input; formulas evaluate.
    Entered(String),
    /// Stored verbatim.
    Literal(String),
}

impl Cell {
    fn new(value: &str, mode: InputMode) -> Self {
        match mode {
            InputMode::Raw => Self::Literal(value.to_string()),
            InputMode::UserEntered => Self::Entered(value.to_string()),
        }
    }

    fn raw(&self) -> &str {
        match self {
            Self::Entered(s) | Self::Literal(s) => s,
        }
    }
}

/// A write the store accepted, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedWrite {
    InsertRow {
        position: usize,
        values: Vec<String>,
    },
    UpdateCell {
        position: usize,
        column: u32,
        value: String,
    },
    UpdateRange {
        range: RangeSpec,
        values: Vec<Vec<String>>,
    },
}

#[derive(Debug, Default)]
struct Inner {
    rows: Vec<Vec<Cell>>,
    writes: Vec<RecordedWrite>,
    reads: usize,
    /// Write calls received, accepted or not.
    attempts: usize,
    failing_attempts: HashSet<usize>,
    unreachable: bool,
}

/// Rows and write log at one moment, used to undo an accepted write.
#[derive(Debug, Clone)]
pub(crate) struct Checkpoint {
    rows: Vec<Vec<Cell>>,
    writes: usize,
}

/// Store backed by a `Vec` of rows.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Build from entered values, one `Vec` per row starting with the header.
    #[must_use]
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(Cell::Entered).collect())
            .collect();
        Self {
            inner: Mutex::new(Inner {
                rows,
                ..Inner::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave rows half-written.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        let inner = self.lock();
        Checkpoint {
            rows: inner.rows.clone(),
            writes: inner.writes.len(),
        }
    }

    /// Return to `checkpoint`. Attempt counting is left alone.
    pub(crate) fn restore(&self, checkpoint: Checkpoint) {
        let mut inner = self.lock();
        inner.rows = checkpoint.rows;
        inner.writes.truncate(checkpoint.writes);
    }

    /// Make the `n`th write call (1-based, counting rejected ones) fail with a
    /// server error.
    pub fn fail_write_attempt(&self, n: usize) {
        self.lock().failing_attempts.insert(n);
    }

    /// Make every call fail as if the network were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().unreachable = unreachable;
    }

    /// Writes accepted so far.
    #[must_use]
    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.lock().writes.clone()
    }

    /// Number of successful `read_all` calls.
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.lock().reads
    }

    /// Cells as entered (formulas unevaluated).
    #[must_use]
    pub fn raw_rows(&self) -> Vec<Vec<String>> {
        self.lock()
            .rows
            .iter()
            .map(|row| row.iter().map(|c| c.raw().to_string()).collect())
            .collect()
    }

    /// Cells as displayed.
    #[must_use]
    pub fn rendered_rows(&self) -> Vec<Vec<String>> {
        let inner = self.lock();
        render_all(&inner.rows)
    }
}

impl Inner {
    fn check_reachable(&self) -> Result<(), StoreError> {
        if self.unreachable {
            return Err(StoreError::Connection("memory store marked unreachable".into()));
        }
        Ok(())
    }

    fn check_write(&mut self, position: usize) -> Result<(), StoreError> {
        self.check_reachable()?;
        self.attempts += 1;
        if self.failing_attempts.contains(&self.attempts) {
            return Err(StoreError::Api {
                status: 500,
                body: format!("injected failure at row {position}"),
            });
        }
        Ok(())
    }

    fn check_existing(&self, position: usize) -> Result<(), StoreError> {
        if position == 0 || position > self.rows.len() {
            return Err(StoreError::PositionOutOfRange {
                position,
                len: self.rows.len(),
            });
        }
        Ok(())
    }

    fn set(&mut self, position: usize, column: u32, cell: Cell) {
        let row = &mut self.rows[position - 1];
        let index = column as usize - 1;
        if row.len() <= index {
            row.resize(index + 1, Cell::Entered(String::new()));
        }
        row[index] = cell;
    }
}

#[async_trait]
impl TabularStore for MemoryStore {
    async fn read_all(&self) -> Result<Vec<Vec<String>>, StoreError> {
        let mut inner = self.lock();
        inner.check_reachable()?;
        inner.reads += 1;
        Ok(render_all(&inner.rows))
    }

    async fn insert_row(
        &self,
        values: &[String],
        position: usize,
        mode: InputMode,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.check_write(position)?;
        if position == 0 || position > inner.rows.len() + 1 {
            return Err(StoreError::PositionOutOfRange {
                position,
                len: inner.rows.len(),
            });
        }

        for row in &mut inner.rows {
            for cell in row.iter_mut() {
                if let Cell::Entered(text) = cell {
                    if text.starts_with('=') {
                        *text = shift_references(text, position);
                    }
                }
            }
        }
        let row = values.iter().map(|v| Cell::new(v, mode)).collect();
        inner.rows.insert(position - 1, row);
        inner.writes.push(RecordedWrite::InsertRow {
            position,
            values: values.to_vec(),
        });
        Ok(())
    }

    async fn update_cell(
        &self,
        position: usize,
        column: u32,
        value: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.check_write(position)?;
        inner.check_existing(position)?;
        if column == 0 {
            return Err(StoreError::InvalidResponse("column 0 does not exist".into()));
        }
        inner.set(position, column, Cell::Entered(value.to_string()));
        inner.writes.push(RecordedWrite::UpdateCell {
            position,
            column,
            value: value.to_string(),
        });
        Ok(())
    }

    async fn update_range(
        &self,
        range: &RangeSpec,
        values: &[Vec<String>],
        mode: InputMode,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.check_write(range.start_row)?;
        for position in range.start_row..=range.end_row {
            inner.check_existing(position)?;
        }
        if range.start_column == 0 {
            return Err(StoreError::InvalidResponse("column 0 does not exist".into()));
        }

        for (offset, row_values) in values.iter().enumerate() {
            let position = range.start_row + offset;
            if position > range.end_row {
                break;
            }
            for (col_offset, value) in row_values.iter().enumerate() {
                let column = range.start_column + col_offset as u32;
                if column > range.end_column {
                    break;
                }
                inner.set(position, column, Cell::new(value, mode));
            }
        }
        inner.writes.push(RecordedWrite::UpdateRange {
            range: range.clone(),
            values: values.to_vec(),
        });
        Ok(())
    }
}

fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b([A-Z]{1,3})(\d+)\b").expect("valid reference regex"))
}

fn delta_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^=IF\(ISDATE\(([A-Z]+)(\d+)\),ROUND\(\(([A-Z]+)(\d+)-([A-Z]+)(\d+)\)\*24,2\),\)$",
        )
        .expect("valid delta formula regex")
    })
}

/// Bump every row reference at or below `inserted_at` by one.
fn shift_references(formula: &str, inserted_at: usize) -> String {
    reference_pattern()
        .replace_all(formula, |caps: &Captures<'_>| {
            let row: usize = caps[2].parse().unwrap_or(0);
            if row >= inserted_at {
                format!("{}{}", &caps[1], row + 1)
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

fn render_all(rows: &[Vec<Cell>]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| row.iter().map(|cell| render_cell(rows, cell)).collect())
        .collect()
}

fn render_cell(rows: &[Vec<Cell>], cell: &Cell) -> String {
    match cell {
        Cell::Literal(text) => text.clone(),
        Cell::Entered(text) if !text.starts_with('=') => text.clone(),
        Cell::Entered(text) => {
            if let Some(dt) = timestamp::parse(text) {
                return timestamp::render(dt);
            }
            if let Some(caps) = delta_pattern().captures(text) {
                return eval_delta(rows, &caps);
            }
            "#NAME?".to_string()
        }
    }
}

/// Date value of the referenced cell; delta formulas never count as dates.
fn referenced_date(rows: &[Vec<Cell>], letters: &str, row: &str) -> Option<NaiveDateTime> {
    let column = column_index(letters)?;
    let row: usize = row.parse().ok()?;
    let cell = rows.get(row.checked_sub(1)?)?.get(column as usize - 1)?;
    match cell {
        Cell::Entered(text) => timestamp::parse(text),
        Cell::Literal(_) => None,
    }
}

fn eval_delta(rows: &[Vec<Cell>], caps: &Captures<'_>) -> String {
    if referenced_date(rows, &caps[1], &caps[2]).is_none() {
        return String::new();
    }
    let (Some(later), Some(earlier)) = (
        referenced_date(rows, &caps[3], &caps[4]),
        referenced_date(rows, &caps[5], &caps[6]),
    ) else {
        return "#VALUE!".to_string();
    };
    timestamp::format_hours(timestamp::hours_between(earlier, later))
}
