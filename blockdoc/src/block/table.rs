use serde::{Deserialize, Serialize};

/// Header text given to a column added with [`TableContent::add_column`].
pub const NEW_COLUMN_HEADER: &str = "New Column";

/// Tabular block content.
///
/// Every row has exactly `headers.len()` cells and there is always at least
/// one column. The fields are private so the only way to change the shape is
/// through the mutators below, which update headers and every row together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTable")]
pub struct TableContent {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// Outcome of a table mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableEdit {
    Applied,
    /// Refused because it would remove the last row or column.
    Refused,
    /// The row or column index does not exist.
    OutOfRange,
}

impl TableEdit {
    pub fn is_applied(self) -> bool {
        self == TableEdit::Applied
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("a table needs at least one column")]
    NoColumns,
    #[error("row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        found: usize,
        expected: usize,
    },
}

impl TableContent {
    /// Build a table, checking that every row matches the header width.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, TableError> {
        if headers.is_empty() {
            return Err(TableError::NoColumns);
        }
        if let Some((row, cells)) = rows
            .iter()
            .enumerate()
            .find(|(_, cells)| cells.len() != headers.len())
        {
            return Err(TableError::RaggedRow {
                row,
                found: cells.len(),
                expected: headers.len(),
            });
        }
        Ok(TableContent { headers, rows })
    }

    /// Placeholder grid for a freshly created table block: 3 columns, 2 rows.
    pub fn placeholder() -> Self {
        TableContent {
            headers: vec!["Column 1".into(), "Column 2".into(), "Column 3".into()],
            rows: vec![
                vec!["Cell 1".into(), "Cell 2".into(), "Cell 3".into()],
                vec!["Cell 4".into(), "Cell 5".into(), "Cell 6".into()],
            ],
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn add_row(&mut self) -> TableEdit {
        self.rows.push(vec![String::new(); self.headers.len()]);
        TableEdit::Applied
    }

    pub fn add_column(&mut self) -> TableEdit {
        self.headers.push(NEW_COLUMN_HEADER.to_string());
        for row in &mut self.rows {
            row.push(String::new());
        }
        TableEdit::Applied
    }

    pub fn delete_row(&mut self, index: usize) -> TableEdit {
        if index >= self.rows.len() {
            return TableEdit::OutOfRange;
        }
        if self.rows.len() <= 1 {
            return TableEdit::Refused;
        }
        self.rows.remove(index);
        TableEdit::Applied
    }

    pub fn delete_column(&mut self, index: usize) -> TableEdit {
        if index >= self.headers.len() {
            return TableEdit::OutOfRange;
        }
        if self.headers.len() <= 1 {
            return TableEdit::Refused;
        }
        self.headers.remove(index);
        for row in &mut self.rows {
            row.remove(index);
        }
        TableEdit::Applied
    }

    pub fn set_header(&mut self, index: usize, text: impl Into<String>) -> TableEdit {
        match self.headers.get_mut(index) {
            Some(header) => {
                *header = text.into();
                TableEdit::Applied
            }
            None => TableEdit::OutOfRange,
        }
    }

    pub fn set_cell(&mut self, row: usize, column: usize, text: impl Into<String>) -> TableEdit {
        match self.rows.get_mut(row).and_then(|cells| cells.get_mut(column)) {
            Some(cell) => {
                *cell = text.into();
                TableEdit::Applied
            }
            None => TableEdit::OutOfRange,
        }
    }

    /// Render as a pipe table, passing every header and cell through `cell`.
    ///
    /// The output always ends with a newline.
    pub fn to_markdown(&self, cell: impl Fn(&str) -> String) -> String {
        let mut out = String::new();
        push_row(&mut out, self.headers.iter().map(|h| cell(h.as_str())));
        push_row(&mut out, self.headers.iter().map(|_| "---".to_string()));
        for row in &self.rows {
            push_row(&mut out, row.iter().map(|c| cell(c.as_str())));
        }
        out
    }
}

fn push_row(out: &mut String, cells: impl Iterator<Item = String>) {
    out.push('|');
    for cell in cells {
        out.push(' ');
        out.push_str(&cell);
        out.push_str(" |");
    }
    out.push('\n');
}

/// Wire shape accepted from snapshots. Ragged rows are padded or cut to the
/// header width instead of rejecting the whole table.
#[derive(Deserialize)]
struct RawTable {
    headers: Vec<String>,
    #[serde(default)]
    rows: Vec<Vec<String>>,
}

impl TryFrom<RawTable> for TableContent {
    type Error = TableError;

    fn try_from(raw: RawTable) -> Result<Self, Self::Error> {
        let width = raw.headers.len();
        let rows = raw
            .rows
            .into_iter()
            .map(|mut cells| {
                cells.resize(width, String::new());
                cells
            })
            .collect();
        TableContent::new(raw.headers, rows)
    }
}
