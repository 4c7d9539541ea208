use crate::column::Column;
use crate::error::{PlateError, Result};
use crate::value::{Value, ValueKind};

/// A columnar table: named, typed columns of equal length.
///
/// Frames are value types. Every operation returns a new frame; nothing
/// mutates in place, so pipelines can branch and replay safely. Row order
/// carries no meaning until an explicit sort.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateFrame {
    names: Vec<String>,
    columns: Vec<Column>,
    num_rows: usize,
}

impl PlateFrame {
    /// Build a frame from named columns. Names must be unique and all
    /// columns the same length.
    pub fn new(names: Vec<String>, columns: Vec<Column>) -> Result<Self> {
        if names.len() != columns.len() {
            return Err(PlateError::Format(format!(
                "{} names for {} columns",
                names.len(),
                columns.len()
            )));
        }
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(PlateError::Format(format!(
                    "duplicate column name '{}'",
                    name
                )));
            }
        }
        let num_rows = columns.first().map_or(0, Column::len);
        for (i, col) in columns.iter().enumerate() {
            if col.len() != num_rows {
                return Err(PlateError::Format(format!(
                    "column {} has {} rows, expected {}",
                    i,
                    col.len(),
                    num_rows
                )));
            }
        }
        Ok(PlateFrame {
            names,
            columns,
            num_rows,
        })
    }

    /// An empty frame with the given schema.
    pub fn empty(names: Vec<String>, kinds: &[ValueKind]) -> Result<Self> {
        let columns = kinds.iter().map(|&k| Column::empty(k)).collect();
        PlateFrame::new(names, columns)
    }

    /// Build a frame from row-major data.
    pub fn from_rows(names: Vec<String>, kinds: &[ValueKind], rows: &[Vec<Value>]) -> Result<Self> {
        let mut columns: Vec<Column> = kinds.iter().map(|&k| Column::empty(k)).collect();
        for (row_idx, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(PlateError::Format(format!(
                    "row {} has {} values, expected {}",
                    row_idx,
                    row.len(),
                    columns.len()
                )));
            }
            for (col, val) in columns.iter_mut().zip(row.iter()) {
                col.push(val)?;
            }
        }
        PlateFrame::new(names, columns)
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn kinds(&self) -> Vec<ValueKind> {
        self.columns.iter().map(Column::kind).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| PlateError::Format(format!("no such column '{}'", name)))
    }

    pub fn column(&self, index: usize) -> &Column {
        &self.columns[index]
    }

    pub fn column_by_name(&self, name: &str) -> Result<&Column> {
        Ok(&self.columns[self.column_index(name)?])
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn row(&self, index: usize) -> Vec<Value> {
        self.columns.iter().map(|col| col.get(index)).collect()
    }

    pub fn value(&self, name: &str, row: usize) -> Result<Value> {
        Ok(self.column_by_name(name)?.get(row))
    }

    /// Project to the given columns, in the given order.
    pub fn select(&self, names: &[&str]) -> Result<PlateFrame> {
        let mut columns = Vec::with_capacity(names.len());
        let mut selected = Vec::with_capacity(names.len());
        for &name in names {
            let idx = self.column_index(name)?;
            columns.push(self.columns[idx].clone());
            selected.push(name.to_string());
        }
        PlateFrame::new(selected, columns)
    }

    /// Gather rows by index.
    pub fn take(&self, indices: &[usize]) -> Result<PlateFrame> {
        let mut columns: Vec<Column> = self.kinds().iter().map(|&k| Column::empty(k)).collect();
        for &idx in indices {
            if idx >= self.num_rows {
                return Err(PlateError::Format(format!(
                    "row index {} out of range ({})",
                    idx, self.num_rows
                )));
            }
            for (col_idx, col) in self.columns.iter().enumerate() {
                let val = col.get(idx);
                columns[col_idx].push(&val)?;
            }
        }
        PlateFrame::new(self.names.clone(), columns)
    }

    /// Keep rows where the predicate holds on the named column.
    pub fn filter<F>(&self, name: &str, pred: F) -> Result<PlateFrame>
    where
        F: Fn(&Value) -> bool,
    {
        let col = self.column_index(name)?;
        let keep: Vec<usize> = (0..self.num_rows)
            .filter(|&i| pred(&self.columns[col].get(i)))
            .collect();
        self.take(&keep)
    }

    /// Append another frame vertically. Column names must match exactly.
    pub fn append(&self, other: &PlateFrame) -> Result<PlateFrame> {
        if self.names != other.names {
            return Err(PlateError::Format(
                "column names must match for append".to_string(),
            ));
        }
        let mut columns = self.columns.clone();
        for (i, col) in columns.iter_mut().enumerate() {
            col.extend(&other.columns[i])?;
        }
        PlateFrame::new(self.names.clone(), columns)
    }

    /// Add a column on the right (returns a new frame).
    pub fn with_column(&self, name: &str, column: Column) -> Result<PlateFrame> {
        if self.has_column(name) {
            return Err(PlateError::Format(format!(
                "column '{}' already exists",
                name
            )));
        }
        if !self.columns.is_empty() && column.len() != self.num_rows {
            return Err(PlateError::Format(format!(
                "column '{}' has {} rows, expected {}",
                name,
                column.len(),
                self.num_rows
            )));
        }
        let mut names = self.names.clone();
        let mut columns = self.columns.clone();
        names.push(name.to_string());
        columns.push(column);
        PlateFrame::new(names, columns)
    }

    /// Replace an existing column, keeping its position.
    pub fn replace_column(&self, name: &str, column: Column) -> Result<PlateFrame> {
        let idx = self.column_index(name)?;
        if column.len() != self.num_rows {
            return Err(PlateError::Format(format!(
                "column '{}' has {} rows, expected {}",
                name,
                column.len(),
                self.num_rows
            )));
        }
        let mut columns = self.columns.clone();
        columns[idx] = column;
        PlateFrame::new(self.names.clone(), columns)
    }

    /// Remove a column by name.
    pub fn drop_column(&self, name: &str) -> Result<PlateFrame> {
        let idx = self.column_index(name)?;
        let mut names = self.names.clone();
        let mut columns = self.columns.clone();
        names.remove(idx);
        columns.remove(idx);
        PlateFrame::new(names, columns)
    }
}
