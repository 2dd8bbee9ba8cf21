//! Warehouse operations over a diesel connection.

use diesel::prelude::*;
use diesel::sql_types::Text;

use super::{Warehouse, WarehouseSession};
use crate::diesel_runtime::{bound_query, Database, DbConnection};
use crate::error::EtlError;
use crate::schema::{quote_ident, TableSchema};
use crate::table::Table;

#[derive(QueryableByName)]
struct ColumnName {
    #[diesel(sql_type = Text)]
    column_name: String,
}

fn column_list(columns: &[String]) -> Result<String, EtlError> {
    Ok(columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Result<Vec<_>, _>>()?
        .join(", "))
}

/// `INSERT INTO t (a, b) VALUES (?, ?), (?, ?)` for `rows` rows
pub(crate) fn insert_sql(table: &str, columns: &[String], rows: usize) -> Result<String, EtlError> {
    let row = format!("({})", vec!["?"; columns.len()].join(", "));
    Ok(format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_ident(table)?,
        column_list(columns)?,
        vec![row; rows].join(", ")
    ))
}

/// Set-difference insert from `staging` into `target` on `key`
pub(crate) fn insert_missing_sql(
    target: &str,
    staging: &str,
    columns: &[String],
    key: &str,
) -> Result<String, EtlError> {
    let columns = column_list(columns)?;
    let target = quote_ident(target)?;
    let key = quote_ident(key)?;
    Ok(format!(
        "INSERT INTO {target} ({columns}) SELECT {columns} FROM {staging} \
         WHERE {key} NOT IN (SELECT {key} FROM {target})",
        target = target,
        columns = columns,
        staging = quote_ident(staging)?,
        key = key,
    ))
}

impl Warehouse for DbConnection {
    fn table_columns(&mut self, table: &str) -> Result<Option<Vec<String>>, EtlError> {
        let columns = diesel::sql_query(
            "SELECT COLUMN_NAME AS column_name FROM information_schema.COLUMNS \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? ORDER BY ORDINAL_POSITION",
        )
        .bind::<Text, _>(table)
        .load::<ColumnName>(self)?;

        if columns.is_empty() {
            return Ok(None);
        }
        Ok(Some(columns.into_iter().map(|c| c.column_name).collect()))
    }

    fn create_table(&mut self, schema: &TableSchema, if_not_exists: bool) -> Result<(), EtlError> {
        diesel::sql_query(schema.create_sql(if_not_exists)?).execute(self)?;
        tracing::debug!("Created table {}", schema.name);
        Ok(())
    }

    fn drop_table(&mut self, table: &str) -> Result<(), EtlError> {
        diesel::sql_query(format!("DROP TABLE IF EXISTS {}", quote_ident(table)?)).execute(self)?;
        tracing::debug!("Dropped table {}", table);
        Ok(())
    }

    fn insert_rows(&mut self, table: &str, data: &Table, batch_size: usize) -> Result<usize, EtlError> {
        let mut inserted = 0;
        for chunk in data.rows().chunks(batch_size.max(1)) {
            let sql = insert_sql(table, data.columns(), chunk.len())?;
            let values: Vec<_> = chunk.iter().flatten().cloned().collect();
            inserted += bound_query(&sql, &values).execute(self)?;
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
        let sql = insert_missing_sql(target, staging, columns, key)?;
        Ok(diesel::sql_query(sql).execute(self)?)
    }
}

impl WarehouseSession for Database {
    type Conn = DbConnection;

    fn with_warehouse<R, F>(&mut self, f: F) -> Result<R, EtlError>
    where
        F: FnOnce(&mut Self::Conn) -> Result<R, EtlError>,
    {
        let mut conn = self.get_connection()?;
        f(&mut *conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_insert_sql_multi_row() {
        let sql = insert_sql("fact_orders", &cols(&["customer_id", "quantity"]), 2).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO `fact_orders` (`customer_id`, `quantity`) VALUES (?, ?), (?, ?)"
        );
    }

    #[test]
    fn test_insert_missing_sql() {
        let sql = insert_missing_sql(
            "dim_products",
            "dim_products_temp",
            &cols(&["product_id", "name"]),
            "product_id",
        )
        .unwrap();

        assert_eq!(
            sql,
            "INSERT INTO `dim_products` (`product_id`, `name`) SELECT `product_id`, `name` \
             FROM `dim_products_temp` WHERE `product_id` NOT IN (SELECT `product_id` FROM `dim_products`)"
        );
    }

    #[test]
    fn test_insert_sql_rejects_bad_identifiers() {
        assert!(insert_sql("t; DROP", &cols(&["a"]), 1).is_err());
        assert!(insert_missing_sql("t", "t_temp", &cols(&["a b"]), "a").is_err());
    }
}
