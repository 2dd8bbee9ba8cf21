//! In-memory warehouse.
//!
//! Follows the SQL semantics the loaders rely on: key columns reject
//! duplicates, unknown tables and columns are query errors, and
//! `insert_missing` skips staging rows with a null key the way `NOT IN` does.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use indexmap::IndexMap;
use std::collections::HashSet;

use super::{Warehouse, WarehouseSession};
use crate::entity::FieldValue;
use crate::error::EtlError;
use crate::schema::TableSchema;
use crate::table::Table;

#[derive(Debug, Clone)]
struct MemoryTable {
    columns: Vec<String>,
    primary_key: Option<usize>,
    rows: Vec<Vec<FieldValue>>,
}

#[derive(Debug, Default)]
pub struct MemoryWarehouse {
    tables: IndexMap<String, MemoryTable>,
    column_reads: usize,
    fail_next_merge: bool,
}

fn query_error(kind: DatabaseErrorKind, message: String) -> EtlError {
    EtlError::Query(DieselError::DatabaseError(kind, Box::new(message)))
}

fn key_of(value: &FieldValue) -> String {
    format!("{:?}", value)
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn row_count(&self, table: &str) -> Option<usize> {
        self.tables.get(table).map(|t| t.rows.len())
    }

    /// Number of `table_columns` calls served so far
    pub fn column_reads(&self) -> usize {
        self.column_reads
    }

    /// Make the next `insert_missing` fail after the staging table was written
    pub fn fail_next_merge(&mut self) {
        self.fail_next_merge = true;
    }

    pub fn column_values(&self, table: &str, column: &str) -> Option<Vec<FieldValue>> {
        let t = self.tables.get(table)?;
        let idx = t.columns.iter().position(|c| c == column)?;
        Some(t.rows.iter().map(|r| r[idx].clone()).collect())
    }

    /// Snapshot of a stored table
    pub fn table(&self, table: &str) -> Option<Table> {
        let t = self.tables.get(table)?;
        let mut out = Table::new(t.columns.iter().cloned());
        for row in &t.rows {
            out.push_row(row.clone()).ok()?;
        }
        Some(out)
    }

    fn get_mut(&mut self, table: &str) -> Result<&mut MemoryTable, EtlError> {
        self.tables.get_mut(table).ok_or_else(|| {
            query_error(
                DatabaseErrorKind::Unknown,
                format!("Table '{}' doesn't exist", table),
            )
        })
    }
}

impl MemoryTable {
    fn column_index(&self, column: &str) -> Result<usize, EtlError> {
        self.columns.iter().position(|c| c == column).ok_or_else(|| {
            query_error(
                DatabaseErrorKind::Unknown,
                format!("Unknown column '{}'", column),
            )
        })
    }

    fn keys(&self) -> HashSet<String> {
        match self.primary_key {
            Some(pk) => self.rows.iter().map(|r| key_of(&r[pk])).collect(),
            None => HashSet::new(),
        }
    }

    /// Insert rows given in `columns` order, all or nothing
    fn insert(&mut self, columns: &[String], rows: &[Vec<FieldValue>]) -> Result<usize, EtlError> {
        let mapping = columns
            .iter()
            .map(|c| self.column_index(c))
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen = self.keys();
        let mut pending = Vec::with_capacity(rows.len());
        for row in rows {
            let mut stored = vec![FieldValue::Null; self.columns.len()];
            for (value, &idx) in row.iter().zip(&mapping) {
                stored[idx] = value.clone();
            }
            if let Some(pk) = self.primary_key {
                if stored[pk].is_null() {
                    return Err(query_error(
                        DatabaseErrorKind::NotNullViolation,
                        format!("Column '{}' cannot be null", self.columns[pk]),
                    ));
                }
                if !seen.insert(key_of(&stored[pk])) {
                    return Err(query_error(
                        DatabaseErrorKind::UniqueViolation,
                        format!("Duplicate entry '{}' for key 'PRIMARY'", stored[pk]),
                    ));
                }
            }
            pending.push(stored);
        }

        let inserted = pending.len();
        self.rows.extend(pending);
        Ok(inserted)
    }
}

impl Warehouse for MemoryWarehouse {
    fn table_columns(&mut self, table: &str) -> Result<Option<Vec<String>>, EtlError> {
        self.column_reads += 1;
        Ok(self.tables.get(table).map(|t| t.columns.clone()))
    }

    fn create_table(&mut self, schema: &TableSchema, if_not_exists: bool) -> Result<(), EtlError> {
        if self.tables.contains_key(&schema.name) {
            if if_not_exists {
                return Ok(());
            }
            return Err(query_error(
                DatabaseErrorKind::Unknown,
                format!("Table '{}' already exists", schema.name),
            ));
        }

        self.tables.insert(
            schema.name.clone(),
            MemoryTable {
                columns: schema.column_names(),
                primary_key: schema.columns.iter().position(|c| c.primary_key),
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    fn drop_table(&mut self, table: &str) -> Result<(), EtlError> {
        self.tables.shift_remove(table);
        Ok(())
    }

    fn insert_rows(&mut self, table: &str, data: &Table, batch_size: usize) -> Result<usize, EtlError> {
        let target = self.get_mut(table)?;
        let mut inserted = 0;
        for chunk in data.rows().chunks(batch_size.max(1)) {
            inserted += target.insert(data.columns(), chunk)?;
        }
        Ok(inserted)
    }

    fn insert_missing(
        &mut self,
        target: &str,
        staging: &str,
        columns: &[String],
        key: &str,
    ) -> Result<usize, EtlError> {
        if std::mem::take(&mut self.fail_next_merge) {
            return Err(query_error(
                DatabaseErrorKind::Unknown,
                "Lock wait timeout exceeded".to_string(),
            ));
        }

        let source = self
            .tables
            .get(staging)
            .ok_or_else(|| {
                query_error(
                    DatabaseErrorKind::Unknown,
                    format!("Table '{}' doesn't exist", staging),
                )
            })?
            .clone();
        let mapping = columns
            .iter()
            .map(|c| source.column_index(c))
            .collect::<Result<Vec<_>, _>>()?;
        let source_key = source.column_index(key)?;

        let dest = self.get_mut(target)?;
        let dest_key = dest.column_index(key)?;
        let existing: HashSet<String> = dest.rows.iter().map(|r| key_of(&r[dest_key])).collect();

        let missing: Vec<Vec<FieldValue>> = source
            .rows
            .iter()
            .filter(|r| !r[source_key].is_null() && !existing.contains(&key_of(&r[source_key])))
            .map(|r| mapping.iter().map(|&i| r[i].clone()).collect())
            .collect();

        dest.insert(columns, &missing)
    }
}

impl WarehouseSession for MemoryWarehouse {
    type Conn = MemoryWarehouse;

    fn with_warehouse<R, F>(&mut self, f: F) -> Result<R, EtlError>
    where
        F: FnOnce(&mut Self::Conn) -> Result<R, EtlError>,
    {
        f(self)
    }
}
