//! Extraction: run a read query against the source and hold the whole result
//! in memory.

use diesel::prelude::*;
use std::collections::HashMap;

use crate::diesel_runtime::{bound_query, Database, DbBackend, DbConnection};
use crate::entity::{Entity, FieldValue};
use crate::error::EtlError;
use crate::table::Table;

/// A typed source row: readable from a raw query and convertible to a table row
pub trait Record: Entity + QueryableByName<DbBackend> + 'static {}

impl<T> Record for T where T: Entity + QueryableByName<DbBackend> + 'static {}

/// A read query with positional `?` bind values
#[derive(Debug, Clone, PartialEq)]
pub struct SourceQuery {
    /// Label used in logs and by in-memory sources
    pub name: String,
    pub sql: String,
    pub binds: Vec<FieldValue>,
}

impl SourceQuery {
    pub fn new(name: &str, sql: &str) -> Self {
        Self {
            name: name.to_string(),
            sql: sql.to_string(),
            binds: Vec::new(),
        }
    }

    pub fn bind(mut self, value: impl Into<FieldValue>) -> Self {
        self.binds.push(value.into());
        self
    }
}

/// Something a [`SourceQuery`] can be run against
pub trait Source {
    /// Run `query`, reading each row as `T`, and return the full result
    fn extract<T: Record>(&mut self, query: &SourceQuery) -> Result<Table, EtlError>;
}

impl Source for DbConnection {
    fn extract<T: Record>(&mut self, query: &SourceQuery) -> Result<Table, EtlError> {
        tracing::debug!("Running source query {}: {}", query.name, query.sql.trim());

        let records = bound_query(&query.sql, &query.binds).load::<T>(self)?;
        let table = Table::from_entities(&records);

        tracing::info!("Extracted {} rows for {}", table.len(), query.name);
        Ok(table)
    }
}

impl Source for Database {
    /// Check out a connection for this one query
    fn extract<T: Record>(&mut self, query: &SourceQuery) -> Result<Table, EtlError> {
        let mut conn = self.get_connection()?;
        conn.extract::<T>(query)
    }
}

/// Source serving canned tables by query name.
///
/// Records the queries it receives so callers can inspect binds.
#[derive(Debug, Default)]
pub struct MemorySource {
    results: HashMap<String, Table>,
    received: Vec<SourceQuery>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(mut self, query_name: &str, table: Table) -> Self {
        self.results.insert(query_name.to_string(), table);
        self
    }

    pub fn received(&self) -> &[SourceQuery] {
        &self.received
    }
}

impl Source for MemorySource {
    fn extract<T: Record>(&mut self, query: &SourceQuery) -> Result<Table, EtlError> {
        self.received.push(query.clone());
        self.results
            .get(&query.name)
            .cloned()
            .ok_or_else(|| EtlError::schema(format!("no result registered for query '{}'", query.name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::sql_types::BigInt;
    use serde::Serialize;

    #[derive(Debug, Serialize, QueryableByName)]
    struct IdRecord {
        #[diesel(sql_type = BigInt)]
        id: i64,
    }

    impl Entity for IdRecord {
        const NAME: &'static str = "IdRecord";
    }

    #[test]
    fn test_source_query_binds_in_order() {
        let query = SourceQuery::new("orders", "SELECT 1 WHERE ? <= ?")
            .bind("2021-01-01")
            .bind(5i64);

        assert_eq!(
            query.binds,
            vec![FieldValue::String("2021-01-01".to_string()), FieldValue::Int(5)]
        );
    }

    #[test]
    fn test_memory_source_serves_and_records() {
        let mut table = Table::new(["id"]);
        table.push_row(vec![1i64.into()]).unwrap();
        let mut source = MemorySource::new().with_result("ids", table.clone());

        let extracted = source.extract::<IdRecord>(&SourceQuery::new("ids", "SELECT id FROM t")).unwrap();

        assert_eq!(extracted, table);
        assert_eq!(source.received().len(), 1);
    }

    #[test]
    fn test_memory_source_unknown_query() {
        let mut source = MemorySource::new();
        let result = source.extract::<IdRecord>(&SourceQuery::new("missing", "SELECT 1"));
        assert!(result.is_err());
    }
}
