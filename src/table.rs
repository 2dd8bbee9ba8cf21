//! In-memory tabular result set.
//!
//! A `Table` is an ordered list of column names plus rows aligned with those
//! columns. Tables are built from query results or generated ranges, reshaped
//! by transforms and handed to a loader; they never outlive one run.

use crate::entity::{Entity, FieldValue};
use crate::error::EtlError;
use indexmap::IndexMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<FieldValue>>,
}

impl Table {
    /// Create an empty table with the given columns
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Build a table from typed records, one row per record.
    ///
    /// Columns come from the first record; an empty slice yields a table with
    /// no columns.
    pub fn from_entities<T: Entity>(records: &[T]) -> Self {
        let mut table = Table::default();

        for (i, record) in records.iter().enumerate() {
            let dict = record.to_dict();
            if i == 0 {
                table.columns = dict.keys().cloned().collect();
            }
            let row = table
                .columns
                .iter()
                .map(|c| dict.get(c).cloned().unwrap_or(FieldValue::Null))
                .collect();
            table.rows.push(row);
        }

        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<FieldValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Append a row; its width must match the column count
    pub fn push_row(&mut self, row: Vec<FieldValue>) -> Result<(), EtlError> {
        if row.len() != self.columns.len() {
            return Err(EtlError::schema(format!(
                "row has {} values but table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Value at `row` in column `column`
    pub fn get(&self, row: usize, column: &str) -> Option<&FieldValue> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// All values of one column, top to bottom
    pub fn column_values(&self, column: &str) -> Option<Vec<&FieldValue>> {
        let idx = self.column_index(column)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// Row as a column -> value map
    pub fn row_map(&self, row: usize) -> Option<IndexMap<&str, &FieldValue>> {
        let values = self.rows.get(row)?;
        Some(
            self.columns
                .iter()
                .map(String::as_str)
                .zip(values.iter())
                .collect(),
        )
    }

    /// Insert a column at `position`, filling each row from `fill`.
    ///
    /// An existing column of the same name is replaced in place instead.
    pub(crate) fn insert_column_with<F>(&mut self, position: usize, name: &str, mut fill: F)
    where
        F: FnMut(&[FieldValue]) -> FieldValue,
    {
        if let Some(idx) = self.column_index(name) {
            for row in &mut self.rows {
                let value = fill(row);
                row[idx] = value;
            }
            return;
        }

        let position = position.min(self.columns.len());
        self.columns.insert(position, name.to_string());
        for row in &mut self.rows {
            let value = fill(row);
            row.insert(position, value);
        }
    }

    /// Project onto `columns` in the given order, dropping the rest
    pub fn select(&self, columns: &[&str]) -> Result<Table, EtlError> {
        let indices = columns
            .iter()
            .map(|c| {
                self.column_index(c)
                    .ok_or_else(|| EtlError::schema(format!("column '{}' not found", c)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Table {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        })
    }
}
