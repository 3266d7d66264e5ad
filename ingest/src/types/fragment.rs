use serde_json::Value;

pub use postgres::records::JsonRow;

/// A cell whose value comes from another table, resolved by the writer right before the commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeferredLookup {
    pub table: String,
    /// Column matched against `value`.
    pub match_column: String,
    pub value: String,
    /// Column of the matching row used as the cell value.
    pub select_column: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Value(Value),
    Lookup(DeferredLookup),
}

/// One row of a [`WriteFragment`], with cells in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FragmentRow {
    cells: Vec<(String, Cell)>,
}

impl FragmentRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.cells.push((column.into(), Cell::Value(value.into())));
        self
    }

    pub fn lookup(mut self, column: impl Into<String>, lookup: DeferredLookup) -> Self {
        self.cells.push((column.into(), Cell::Lookup(lookup)));
        self
    }

    pub fn cells(&self) -> &[(String, Cell)] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<(String, Cell)> {
        self.cells
    }
}

/// Rows derived from a single record, grouped by target table.
///
/// Tables keep the order in which they were first pushed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteFragment {
    tables: Vec<(String, Vec<FragmentRow>)>,
}

impl WriteFragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_row(&mut self, table: &str, row: FragmentRow) {
        match self.tables.iter_mut().find(|(name, _)| name == table) {
            Some((_, rows)) => rows.push(row),
            None => self.tables.push((table.to_string(), vec![row])),
        }
    }

    /// Registers `table` without rows, so it keeps its position in the table order even when a
    /// record yields nothing for it.
    pub fn touch_table(&mut self, table: &str) {
        if !self.tables.iter().any(|(name, _)| name == table) {
            self.tables.push((table.to_string(), vec![]));
        }
    }

    pub fn rows(&self, table: &str) -> &[FragmentRow] {
        self.tables
            .iter()
            .find(|(name, _)| name == table)
            .map(|(_, rows)| rows.as_slice())
            .unwrap_or_default()
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|(name, _)| name.as_str())
    }

    pub fn into_tables(self) -> Vec<(String, Vec<FragmentRow>)> {
        self.tables
    }
}

/// Fully resolved rows for one table, ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRows {
    pub table: String,
    pub rows: Vec<JsonRow>,
}

impl TableRows {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            rows: vec![],
        }
    }
}
