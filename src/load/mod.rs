//! Loading tables into the warehouse.
//!
//! Two modes exist. [`LoadMode::Dedup`] stages the batch in `<table>_temp`,
//! copies over only rows whose key is not yet present, and always drops the
//! staging table afterwards. [`LoadMode::Append`] inserts every row without
//! looking at the destination.

pub mod memory;
pub mod sql;

pub use memory::MemoryWarehouse;

use crate::error::EtlError;
use crate::schema::{self, TableSchema};
use crate::table::Table;

/// Destination-side operations a loader needs.
///
/// Implemented for the diesel connection and for [`MemoryWarehouse`].
pub trait Warehouse {
    /// Column names of `table` in ordinal order, or `None` if it does not exist
    fn table_columns(&mut self, table: &str) -> Result<Option<Vec<String>>, EtlError>;

    fn create_table(&mut self, schema: &TableSchema, if_not_exists: bool) -> Result<(), EtlError>;

    /// Drop `table` if it exists
    fn drop_table(&mut self, table: &str) -> Result<(), EtlError>;

    /// Insert every row of `data`, `batch_size` rows per statement
    fn insert_rows(&mut self, table: &str, data: &Table, batch_size: usize) -> Result<usize, EtlError>;

    /// Copy rows of `staging` into `target` whose `key` is not already in
    /// `target`. Returns the number of rows copied.
    fn insert_missing(
        &mut self,
        target: &str,
        staging: &str,
        columns: &[String],
        key: &str,
    ) -> Result<usize, EtlError>;
}

/// Lends a [`Warehouse`] for the span of one load.
///
/// The diesel implementation checks a connection out of the pool and returns
/// it when `f` finishes, whether or not `f` succeeded.
pub trait WarehouseSession {
    type Conn: Warehouse;

    fn with_warehouse<R, F>(&mut self, f: F) -> Result<R, EtlError>
    where
        F: FnOnce(&mut Self::Conn) -> Result<R, EtlError>;
}

/// How [`write_table`] treats an existing table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Drop and recreate from the batch's column types
    Overwrite,
    /// Insert into the existing table
    Append,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadMode {
    /// Insert rows whose `primary_key` is not already in the destination
    Dedup { primary_key: String },
    /// Insert every row
    Append,
}

impl LoadMode {
    pub fn dedup(primary_key: &str) -> Self {
        LoadMode::Dedup {
            primary_key: primary_key.to_string(),
        }
    }
}

/// Outcome of one load call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub table: String,
    pub incoming: usize,
    pub inserted: usize,
}

pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Write `data` to `table`; see [`WriteMode`]
pub fn write_table<W: Warehouse>(
    warehouse: &mut W,
    table: &str,
    data: &Table,
    mode: WriteMode,
    batch_size: usize,
) -> Result<usize, EtlError> {
    if mode == WriteMode::Overwrite {
        warehouse.drop_table(table)?;
        warehouse.create_table(&TableSchema::infer(table, data), false)?;
    }
    warehouse.insert_rows(table, data, batch_size)
}

/// Loads tables into a warehouse with a fixed insert batch size
#[derive(Debug, Clone)]
pub struct Loader {
    batch_size: usize,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl Loader {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn load<W: Warehouse>(
        &self,
        warehouse: &mut W,
        data: &Table,
        table: &str,
        mode: &LoadMode,
    ) -> Result<LoadReport, EtlError> {
        match mode {
            LoadMode::Dedup { primary_key } => self.load_dedup(warehouse, data, table, primary_key),
            LoadMode::Append => self.load_append(warehouse, data, table),
        }
    }

    /// Merge `data` into `table`, skipping rows whose `primary_key` already
    /// exists there.
    ///
    /// `table` must exist and contain `primary_key` and every column of
    /// `data`. The staging table is dropped whether or not the merge succeeds.
    pub fn load_dedup<W: Warehouse>(
        &self,
        warehouse: &mut W,
        data: &Table,
        table: &str,
        primary_key: &str,
    ) -> Result<LoadReport, EtlError> {
        let target_columns = warehouse
            .table_columns(table)?
            .ok_or_else(|| EtlError::schema(format!("destination table '{}' does not exist", table)))?;

        if !target_columns.iter().any(|c| c == primary_key) {
            return Err(EtlError::schema(format!(
                "primary key '{}' not found in destination table '{}'",
                primary_key, table
            )));
        }

        if data.is_empty() {
            tracing::info!("No incoming rows for {}", table);
            return Ok(LoadReport {
                table: table.to_string(),
                incoming: 0,
                inserted: 0,
            });
        }

        if !data.has_column(primary_key) {
            return Err(EtlError::schema(format!(
                "primary key '{}' not found in incoming data for '{}'",
                primary_key, table
            )));
        }

        if let Some(missing) = data.columns().iter().find(|c| !target_columns.contains(*c)) {
            return Err(EtlError::schema(format!(
                "column '{}' not found in destination table '{}'",
                missing, table
            )));
        }

        let staging = format!("{}_temp", table);
        let merged = self.stage_and_merge(warehouse, data, table, &staging, primary_key);
        let cleanup = warehouse.drop_table(&staging);

        let inserted = match (merged, cleanup) {
            (Ok(inserted), Ok(())) => inserted,
            (Ok(_), Err(e)) => return Err(e),
            (Err(e), Ok(())) => return Err(e),
            (Err(e), Err(drop_err)) => {
                tracing::warn!("Staging table {} left behind: {}", staging, drop_err);
                return Err(e);
            }
        };

        tracing::info!(
            "Loaded {}: {} incoming, {} new, {} already present",
            table,
            data.len(),
            inserted,
            data.len().saturating_sub(inserted)
        );

        Ok(LoadReport {
            table: table.to_string(),
            incoming: data.len(),
            inserted,
        })
    }

    fn stage_and_merge<W: Warehouse>(
        &self,
        warehouse: &mut W,
        data: &Table,
        table: &str,
        staging: &str,
        primary_key: &str,
    ) -> Result<usize, EtlError> {
        let staged = write_table(warehouse, staging, data, WriteMode::Overwrite, self.batch_size)?;
        tracing::debug!("Staged {} rows in {}", staged, staging);

        warehouse.insert_missing(table, staging, data.columns(), primary_key)
    }

    /// Insert every row of `data` into `table` without reading it first
    pub fn load_append<W: Warehouse>(
        &self,
        warehouse: &mut W,
        data: &Table,
        table: &str,
    ) -> Result<LoadReport, EtlError> {
        let inserted = if data.is_empty() {
            0
        } else {
            write_table(warehouse, table, data, WriteMode::Append, self.batch_size)?
        };

        tracing::info!("Appended {} rows to {}", inserted, table);

        Ok(LoadReport {
            table: table.to_string(),
            incoming: data.len(),
            inserted,
        })
    }
}

/// Create every warehouse table that does not exist yet
pub fn ensure_warehouse_tables<W: Warehouse>(warehouse: &mut W) -> Result<(), EtlError> {
    tracing::info!("Ensuring warehouse tables exist...");
    for table in schema::warehouse_tables() {
        warehouse.create_table(&table, true)?;
    }
    Ok(())
}
