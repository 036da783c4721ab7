//! Table types.

use serde::{Deserialize, Serialize};

/// A rectangular table.
///
/// Every row carries the same number of cells; readers pad short rows
/// with empty cells before emitting the table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Rows in the table
    pub rows: Vec<TableRow>,

    /// Number of header rows (0 = no header)
    pub header_rows: u8,
}

impl Table {
    /// Create a new empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row to the table.
    pub fn add_row(&mut self, row: TableRow) {
        self.rows.push(row);
    }

    /// Get the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get the declared column count (width of the widest row).
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(|r| r.cells.len()).max().unwrap_or(0)
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Pad every row with empty cells to the declared column count.
    pub fn normalize(&mut self) {
        let cols = self.column_count();
        for row in &mut self.rows {
            while row.cells.len() < cols {
                row.cells.push(TableCell::empty());
            }
        }
    }

    /// Get plain text representation of the table.
    pub fn plain_text(&self) -> String {
        self.rows
            .iter()
            .map(|row| row.plain_text())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Check if the table has merged cells.
    pub fn has_merged_cells(&self) -> bool {
        self.rows
            .iter()
            .flat_map(|r| &r.cells)
            .any(|c| c.rowspan > 1 || c.colspan > 1)
    }
}

/// A table row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    /// Cells in the row
    pub cells: Vec<TableCell>,
}

impl TableRow {
    /// Create a new row with cells.
    pub fn new(cells: Vec<TableCell>) -> Self {
        Self { cells }
    }

    /// Create a row from text values.
    pub fn from_strings<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        Self::new(values.into_iter().map(TableCell::text).collect())
    }

    /// Get plain text representation.
    pub fn plain_text(&self) -> String {
        self.cells
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\t")
    }
}

/// A table cell. Spans default to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    /// Cell text content (empty for padding cells)
    pub text: String,

    /// Number of rows this cell spans
    #[serde(default = "one", skip_serializing_if = "is_one")]
    pub rowspan: u8,

    /// Number of columns this cell spans
    #[serde(default = "one", skip_serializing_if = "is_one")]
    pub colspan: u8,
}

fn one() -> u8 {
    1
}

fn is_one(v: &u8) -> bool {
    *v == 1
}

impl TableCell {
    /// Create a cell with text content.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            rowspan: 1,
            colspan: 1,
        }
    }

    /// Create an empty cell.
    pub fn empty() -> Self {
        Self::text("")
    }

    /// Set colspan and return self.
    pub fn colspan(mut self, span: u8) -> Self {
        self.colspan = span;
        self
    }

    /// Set rowspan and return self.
    pub fn rowspan(mut self, span: u8) -> Self {
        self.rowspan = span;
        self
    }

    /// Check if the cell has no visible content.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_with_data() {
        let mut table = Table::new();
        table.header_rows = 1;
        table.add_row(TableRow::from_strings(["Name", "Age"]));
        table.add_row(TableRow::from_strings(["Alice", "30"]));
        table.add_row(TableRow::from_strings(["Bob", "25"]));

        assert_eq!(table.row_count(), 3);
        assert_eq!(table.column_count(), 2);
        assert!(!table.has_merged_cells());
    }

    #[test]
    fn test_normalize_pads_short_rows() {
        let mut table = Table::new();
        table.add_row(TableRow::from_strings(["a", "b", "c"]));
        table.add_row(TableRow::from_strings(["d"]));
        table.normalize();

        assert_eq!(table.rows[1].cells.len(), 3);
        assert!(table.rows[1].cells[2].is_empty());
    }

    #[test]
    fn test_merged_cells() {
        let mut table = Table::new();
        table.add_row(TableRow::new(vec![TableCell::text("Merged").colspan(2)]));
        assert!(table.has_merged_cells());
    }

    #[test]
    fn test_span_default_omitted_in_json() {
        let cell = TableCell::text("x");
        let json = serde_json::to_string(&cell).unwrap();
        assert!(!json.contains("colspan"));

        let back: TableCell = serde_json::from_str(&json).unwrap();
        assert_eq!(back.colspan, 1);
    }
}
