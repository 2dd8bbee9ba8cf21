//! # star-etl: E-commerce Star Schema Loader
//!
//! Batch ETL that copies an e-commerce MySQL schema into a star-schema
//! warehouse: three dimensions (products, customers, addresses), a generated
//! calendar dimension, and an aggregated orders fact.
//!
//! ## Pipeline
//!
//! - **Extract**: named SQL queries against the source, decoded into typed
//!   records and flattened into a [`Table`]
//! - **Transform**: constant columns the source does not carry, and
//!   `YYYYMMDD` integer date keys
//! - **Load**: dimensions through a staging table so existing keys are never
//!   duplicated; facts appended as-is
//!
//! ## Example
//!
//! ```no_run
//! use star_etl::{run_etl, Database, EtlConfig};
//!
//! let config = EtlConfig::from_env()?;
//! let mut source = Database::new("source", &config.source_url())?;
//! let mut destination = Database::new("destination", &config.destination_url())?;
//!
//! let summary = run_etl(&config.settings, &mut source, &mut destination)?;
//! println!("inserted {} rows", summary.total_inserted());
//! # Ok::<(), star_etl::EtlError>(())
//! ```

pub mod config;
pub mod date_dimension;
pub mod diesel_runtime;
pub mod entity;
pub mod error;
pub mod extract;
pub mod load;
pub mod pipeline;
pub mod schema;
pub mod table;
pub mod transform;

pub use config::{ConnectionConfig, EtlConfig, FactWindow, PipelineSettings};
pub use date_dimension::{generate_date_dimension, populate_date_dimension, DateRange};
pub use diesel_runtime::{Database, DatabaseConfig, DbConnection};
pub use entity::{Entity, FieldValue};
pub use error::EtlError;
pub use extract::{MemorySource, Source, SourceQuery};
pub use load::{
    ensure_warehouse_tables, write_table, LoadMode, LoadReport, Loader, MemoryWarehouse, Warehouse,
    WarehouseSession, WriteMode,
};
pub use pipeline::{run_etl, Pipeline, RunSummary};
pub use table::Table;
pub use transform::{add_constant_column, add_date_key, date_key};
