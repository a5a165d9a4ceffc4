//! In-memory tabular dataset shared by extractors, cleaners and loaders.
//!
//! A [`Table`] is an ordered list of typed columns plus rows of [`Cell`]s
//! aligned to those columns. Raw tables coming out of an extractor are all
//! [`ColumnKind::Text`]; cleaners coerce columns to their final kind.
//!
//! ```text
//! JSON records / CSV ──▶ Table (Text) ──▶ cleaner ──▶ Table (typed) ──▶ loader
//! ```

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::io::Write;

use crate::error::{TableError, TableResult};

/// A single value in a table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    /// Missing value.
    Null,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Cell {
    /// Build a text cell.
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Borrow the text content, if this is a text cell.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Float(v) => Some(*v),
            Cell::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Convert a raw JSON value into a cell, keeping its textual form.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Cell::Null,
            Value::String(s) => Cell::Text(s.clone()),
            Value::Bool(b) => Cell::Text(b.to_string()),
            Value::Number(n) => Cell::Text(n.to_string()),
            other => Cell::Text(other.to_string()),
        }
    }

    /// Convert the cell back into JSON.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Int(v) => write!(f, "{}", v),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Bool(v) => write!(f, "{}", v),
            Cell::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Cell::Timestamp(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// Declared data type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Text,
    Int,
    Float,
    Bool,
    Date,
    Timestamp,
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Text)
    }
}

/// Ordered, typed tabular dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Create an empty table with text columns.
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: names.into_iter().map(Column::text).collect(),
            rows: Vec::new(),
        }
    }

    /// Create an empty table with explicit column definitions.
    pub fn with_columns(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a raw text table from JSON objects.
    ///
    /// Columns appear in first-seen key order across all records. Keys a
    /// record lacks become [`Cell::Null`]. Non-object records are skipped.
    pub fn from_records(records: &[Value]) -> Self {
        let mut names: Vec<String> = Vec::new();
        for record in records {
            if let Some(obj) = record.as_object() {
                for key in obj.keys() {
                    if !names.iter().any(|n| n == key) {
                        names.push(key.clone());
                    }
                }
            }
        }

        let mut table = Table::new(names);
        for record in records {
            if let Some(obj) = record.as_object() {
                let row = table
                    .columns
                    .iter()
                    .map(|c| obj.get(&c.name).map(Cell::from_json).unwrap_or(Cell::Null))
                    .collect();
                table.rows.push(row);
            }
        }
        table
    }

    /// Append a row, padding with nulls or truncating to the column count.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Null);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Like [`Table::column_index`] but a missing column is an error.
    pub fn require(&self, name: &str) -> TableResult<usize> {
        self.column_index(name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))
    }

    /// Cell at `row` in the named column.
    pub fn get(&self, row: usize, name: &str) -> Option<&Cell> {
        let idx = self.column_index(name)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// All values of one column.
    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &Cell> + '_ {
        self.rows.iter().map(move |r| &r[idx])
    }

    /// Remove the named columns. Names that do not exist are ignored.
    pub fn drop_columns(&mut self, names: &[&str]) {
        let keep: Vec<bool> = self
            .columns
            .iter()
            .map(|c| !names.contains(&c.name.as_str()))
            .collect();
        if keep.iter().all(|k| *k) {
            return;
        }

        let mut flags = keep.iter();
        self.columns.retain(|_| *flags.next().unwrap_or(&true));
        for row in &mut self.rows {
            let mut flags = keep.iter();
            row.retain(|_| *flags.next().unwrap_or(&true));
        }
    }

    /// Keep only the rows matching `predicate`. Returns the number dropped.
    pub fn retain_rows<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&[Cell]) -> bool,
    {
        let before = self.rows.len();
        self.rows.retain(|row| predicate(row));
        before - self.rows.len()
    }

    /// Drop rows holding a null in any column. Returns the number dropped.
    pub fn drop_rows_with_nulls(&mut self) -> usize {
        self.retain_rows(|row| !row.iter().any(Cell::is_null))
    }

    /// Drop rows whose value in `idx` repeats an earlier row's value.
    /// Returns the number dropped.
    pub fn dedup_by(&mut self, idx: usize) -> usize {
        let mut seen = std::collections::HashSet::new();
        self.retain_rows(|row| seen.insert(row[idx].to_string()))
    }

    /// Replace every value of a column.
    pub fn map_column<F>(&mut self, idx: usize, mut f: F)
    where
        F: FnMut(&Cell) -> Cell,
    {
        for row in &mut self.rows {
            row[idx] = f(&row[idx]);
        }
    }

    /// Mutate rows in place.
    pub fn update_rows<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut [Cell]),
    {
        for row in &mut self.rows {
            f(row);
        }
    }

    /// Declare the kind of a column after its values have been coerced.
    pub fn set_kind(&mut self, idx: usize, kind: ColumnKind) {
        self.columns[idx].kind = kind;
    }

    /// Append a derived column.
    pub fn push_column(&mut self, column: Column, values: Vec<Cell>) -> TableResult<()> {
        let at = self.columns.len();
        self.insert_column(at, column, values)
    }

    /// Insert a derived column at `position`.
    pub fn insert_column(
        &mut self,
        position: usize,
        column: Column,
        values: Vec<Cell>,
    ) -> TableResult<()> {
        if self.column_index(&column.name).is_some() {
            return Err(TableError::DuplicateColumn(column.name));
        }
        if values.len() != self.rows.len() {
            return Err(TableError::LengthMismatch {
                column: column.name,
                expected: self.rows.len(),
                actual: values.len(),
            });
        }

        let position = position.min(self.columns.len());
        self.columns.insert(position, column);
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.insert(position, value);
        }
        Ok(())
    }

    /// Move the named column to position 0.
    pub fn move_to_front(&mut self, name: &str) -> TableResult<()> {
        let idx = self.require(name)?;
        let column = self.columns.remove(idx);
        self.columns.insert(0, column);
        for row in &mut self.rows {
            let cell = row.remove(idx);
            row.insert(0, cell);
        }
        Ok(())
    }

    /// Project the table onto `names`, in that order. Other columns are
    /// discarded.
    pub fn select(&mut self, names: &[&str]) -> TableResult<()> {
        let indices = names
            .iter()
            .map(|n| self.require(n))
            .collect::<TableResult<Vec<_>>>()?;

        self.columns = indices.iter().map(|&i| self.columns[i].clone()).collect();
        for row in &mut self.rows {
            *row = indices.iter().map(|&i| row[i].clone()).collect();
        }
        Ok(())
    }

    /// Indices of rows that contain at least one null.
    pub fn rows_with_missing(&self) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.iter().any(Cell::is_null))
            .map(|(i, _)| i)
            .collect()
    }

    /// Render every row as a JSON object keyed by column name.
    pub fn to_records(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let obj: Map<String, Value> = self
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(c, cell)| (c.name.clone(), cell.to_json()))
                    .collect();
                Value::Object(obj)
            })
            .collect()
    }

    /// Write the table as CSV with a header row. Nulls are empty fields.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut out = csv::Writer::from_writer(writer);
        out.write_record(self.columns.iter().map(|c| c.name.as_str()))?;
        for row in &self.rows {
            out.write_record(row.iter().map(|c| c.to_string()))?;
        }
        out.flush()?;
        Ok(())
    }
}
