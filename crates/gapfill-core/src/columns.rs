//! Column-letter arithmetic and the sheet column layout.
//!
//! Spreadsheet columns are addressed with bijective base-26 letters
//! (`A`..`Z`, `AA`..`ZZ`, `AAA`..). All indices here are 1-based, matching the
//! store's row positions.

use serde::{Deserialize, Serialize};

/// Map a 1-based column index to its letter form (`1 -> A`, `27 -> AA`).
///
/// Index 0 has no letter form and maps to an empty string.
#[must_use]
pub fn column_letter(index: u32) -> String {
    let mut n = index;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Inverse of [`column_letter`]. Accepts upper-case ASCII letters only.
#[must_use]
pub fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    letters.bytes().try_fold(0u32, |acc, b| {
        if !b.is_ascii_uppercase() {
            return None;
        }
        acc.checked_mul(26)?.checked_add(u32::from(b - b'A') + 1)
    })
}

/// A1-style reference to a single cell.
#[must_use]
pub fn cell_ref(column: u32, row: usize) -> String {
    format!("{}{row}", column_letter(column))
}

/// Where the engine finds and writes each field of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnLayout {
    /// Timestamp column (1-based).
    pub timestamp: u32,
    /// Delta column (1-based). Holds a formula the store evaluates.
    pub delta: u32,
    /// Synthetic-row marker column (1-based).
    pub marker: u32,
    /// Rows at or above this position are never treated as data.
    pub boundary_rows: usize,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            timestamp: 2,
            delta: 3,
            marker: 7,
            boundary_rows: 2,
        }
    }
}

impl ColumnLayout {
    /// Number of cells in a row written by the engine.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.timestamp.max(self.delta).max(self.marker)
    }

    /// Delta expression for the row at `row`, computed against the row directly above.
    #[must_use]
    pub fn delta_formula(&self, row: usize) -> String {
        let current = cell_ref(self.timestamp, row);
        let previous = cell_ref(self.timestamp, row.saturating_sub(1));
        format!("=IF(ISDATE({current}),ROUND(({current}-{previous})*24,2),)")
    }

    /// A blank row of [`Self::width`] cells with the three engine fields filled.
    #[must_use]
    pub fn build_row(&self, timestamp: String, delta: String, marker: &str) -> Vec<String> {
        let mut row = vec![String::new(); self.width() as usize];
        row[self.timestamp as usize - 1] = timestamp;
        row[self.delta as usize - 1] = delta;
        row[self.marker as usize - 1] = marker.to_string();
        row
    }
}

/// Rectangular cell range, 1-based and inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSpec {
    pub start_row: usize,
    pub start_column: u32,
    pub end_row: usize,
    pub end_column: u32,
}

impl RangeSpec {
    /// A single full-width row.
    #[must_use]
    pub fn row(position: usize, width: u32) -> Self {
        Self {
            start_row: position,
            start_column: 1,
            end_row: position,
            end_column: width.max(1),
        }
    }

    /// A single cell.
    #[must_use]
    pub fn cell(position: usize, column: u32) -> Self {
        Self {
            start_row: position,
            start_column: column,
            end_row: position,
            end_column: column,
        }
    }

    /// A1 notation, optionally prefixed with a worksheet name.
    #[must_use]
    pub fn a1(&self, worksheet: Option<&str>) -> String {
        let start = cell_ref(self.start_column, self.start_row);
        let end = cell_ref(self.end_column, self.end_row);
        let body = if start == end {
            start
        } else {
            format!("{start}:{end}")
        };
        match worksheet {
            Some(name) => format!("'{}'!{body}", name.replace('\'', "''")),
            None => body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_at_alphabet_boundaries() {
        assert_eq!(column_letter(1), "A");
        assert_eq!(column_letter(26), "Z");
        assert_eq!(column_letter(27), "AA");
        assert_eq!(column_letter(52), "AZ");
        assert_eq!(column_letter(53), "BA");
        assert_eq!(column_letter(702), "ZZ");
        assert_eq!(column_letter(703), "AAA");
        assert_eq!(column_letter(0), "");
    }

    #[test]
    fn index_inverts_letters() {
        for n in 1..=2000 {
            assert_eq!(column_index(&column_letter(n)), Some(n));
        }
        assert_eq!(column_index(""), None);
        assert_eq!(column_index("a"), None);
        assert_eq!(column_index("A1"), None);
    }

    #[test]
    fn delta_formula_references_previous_row() {
        let layout = ColumnLayout::default();
        assert_eq!(
            layout.delta_formula(12),
            "=IF(ISDATE(B12),ROUND((B12-B11)*24,2),)"
        );
    }

    #[test]
    fn build_row_places_fields() {
        let layout = ColumnLayout::default();
        let row = layout.build_row("ts".to_string(), "d".to_string(), "cleaned");
        assert_eq!(row.len(), 7);
        assert_eq!(row[0], "");
        assert_eq!(row[1], "ts");
        assert_eq!(row[2], "d");
        assert_eq!(row[6], "cleaned");
    }

    #[test]
    fn range_a1_notation() {
        assert_eq!(RangeSpec::row(7, 7).a1(Some("Data")), "'Data'!A7:G7");
        assert_eq!(RangeSpec::cell(9, 3).a1(None), "C9");
        assert_eq!(RangeSpec::cell(2, 28).a1(Some("It's")), "'It''s'!AB2");
    }
}
