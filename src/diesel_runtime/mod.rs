//! Diesel runtime: connection pools and dynamic SQL binding.

pub mod binds;
pub mod database;

pub use binds::{bind_value, bound_query, BoxedQuery};
pub use database::{Database, DatabaseConfig, DbBackend, DbConnection, Pool, PooledConnection};
