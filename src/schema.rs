//! Table definitions for the warehouse and for staging tables.
//!
//! The five warehouse tables have fixed definitions; staging tables take
//! their column types from the batch being loaded.

use crate::entity::FieldValue;
use crate::error::EtlError;
use crate::table::Table;
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int,
    BigInt,
    Double,
    Text,
    Varchar(u16),
    Bool,
    Date,
    DateTime,
}

impl ColumnType {
    /// MySQL type name used in DDL
    pub fn sql_type(&self) -> String {
        match self {
            ColumnType::Int => "INT".to_string(),
            ColumnType::BigInt => "BIGINT".to_string(),
            ColumnType::Double => "DOUBLE".to_string(),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Varchar(n) => format!("VARCHAR({})", n),
            ColumnType::Bool => "BOOLEAN".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::DateTime => "DATETIME".to_string(),
        }
    }

    /// Type a staging column gets for a given value
    pub fn of_value(value: &FieldValue) -> Option<ColumnType> {
        match value {
            FieldValue::String(_) => Some(ColumnType::Text),
            FieldValue::Int(_) => Some(ColumnType::BigInt),
            FieldValue::Float(_) => Some(ColumnType::Double),
            FieldValue::Bool(_) => Some(ColumnType::Bool),
            FieldValue::Date(_) => Some(ColumnType::Date),
            FieldValue::DateTime(_) => Some(ColumnType::DateTime),
            FieldValue::Null => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
    pub primary_key: bool,
}

impl ColumnDef {
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            primary_key: false,
        }
    }

    pub fn key(name: &str, column_type: ColumnType) -> Self {
        Self {
            primary_key: true,
            ..Self::new(name, column_type)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    pub fn new(name: &str, columns: Vec<ColumnDef>) -> Self {
        Self {
            name: name.to_string(),
            columns,
        }
    }

    /// Derive a schema from a batch.
    ///
    /// Each column takes the type of its first non-null value; all-null and
    /// empty columns become TEXT. Mixed integer/float columns widen to DOUBLE.
    pub fn infer(name: &str, table: &Table) -> Self {
        let columns = table
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                let mut column_type = None;
                for row in table.rows() {
                    match (column_type, ColumnType::of_value(&row[idx])) {
                        (_, None) => continue,
                        (None, found) => column_type = found,
                        (Some(ColumnType::BigInt), Some(ColumnType::Double)) => {
                            column_type = Some(ColumnType::Double)
                        }
                        _ => {}
                    }
                }
                ColumnDef::new(column, column_type.unwrap_or(ColumnType::Text))
            })
            .collect();

        Self::new(name, columns)
    }

    pub fn primary_key(&self) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.primary_key)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Render `CREATE TABLE` for this schema
    pub fn create_sql(&self, if_not_exists: bool) -> Result<String, EtlError> {
        let mut lines = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let mut line = format!("{} {}", quote_ident(&column.name)?, column.column_type.sql_type());
            if column.primary_key {
                line.push_str(" PRIMARY KEY");
            }
            lines.push(line);
        }

        Ok(format!(
            "CREATE TABLE {}{} ({})",
            if if_not_exists { "IF NOT EXISTS " } else { "" },
            quote_ident(&self.name)?,
            lines.join(", ")
        ))
    }
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").expect("valid identifier regex"))
}

/// Quote a table or column name for MySQL.
///
/// Only plain identifiers are accepted; anything else is a schema error.
pub fn quote_ident(name: &str) -> Result<String, EtlError> {
    if !identifier_pattern().is_match(name) {
        return Err(EtlError::schema(format!("invalid identifier '{}'", name)));
    }
    Ok(format!("`{}`", name))
}

pub const DIM_PRODUCTS: &str = "dim_products";
pub const DIM_CUSTOMERS: &str = "dim_customers";
pub const DIM_ADDRESSES: &str = "dim_addresses";
pub const DIM_DATE: &str = "dim_date";
pub const FACT_ORDERS: &str = "fact_orders";

pub fn dim_products() -> TableSchema {
    TableSchema::new(
        DIM_PRODUCTS,
        vec![
            ColumnDef::key("product_id", ColumnType::BigInt),
            ColumnDef::new("name", ColumnType::Text),
            ColumnDef::new("category", ColumnType::Text),
            ColumnDef::new("brand", ColumnType::Text),
            ColumnDef::new("price", ColumnType::Double),
        ],
    )
}

pub fn dim_customers() -> TableSchema {
    TableSchema::new(
        DIM_CUSTOMERS,
        vec![
            ColumnDef::key("customer_id", ColumnType::BigInt),
            ColumnDef::new("name", ColumnType::Text),
            ColumnDef::new("email", ColumnType::Text),
            ColumnDef::new("phone", ColumnType::Text),
            ColumnDef::new("address_id", ColumnType::BigInt),
        ],
    )
}

pub fn dim_addresses() -> TableSchema {
    TableSchema::new(
        DIM_ADDRESSES,
        vec![
            ColumnDef::key("address_id", ColumnType::BigInt),
            ColumnDef::new("city", ColumnType::Text),
            ColumnDef::new("state", ColumnType::Text),
            ColumnDef::new("country", ColumnType::Text),
            ColumnDef::new("zipcode", ColumnType::Text),
        ],
    )
}

pub fn dim_date() -> TableSchema {
    TableSchema::new(
        DIM_DATE,
        vec![
            ColumnDef::key("date_id", ColumnType::Int),
            ColumnDef::new("full_date", ColumnType::Date),
            ColumnDef::new("day", ColumnType::Int),
            ColumnDef::new("month", ColumnType::Int),
            ColumnDef::new("quarter", ColumnType::Int),
            ColumnDef::new("year", ColumnType::Int),
            ColumnDef::new("weekday_name", ColumnType::Varchar(10)),
        ],
    )
}

pub fn fact_orders() -> TableSchema {
    TableSchema::new(
        FACT_ORDERS,
        vec![
            ColumnDef::new("customer_id", ColumnType::BigInt),
            ColumnDef::new("product_id", ColumnType::BigInt),
            ColumnDef::new("address_id", ColumnType::BigInt),
            ColumnDef::new("order_date_id", ColumnType::Int),
            ColumnDef::new("quantity", ColumnType::Double),
            ColumnDef::new("price", ColumnType::Double),
        ],
    )
}

/// Every warehouse table, dimensions first
pub fn warehouse_tables() -> Vec<TableSchema> {
    vec![
        dim_products(),
        dim_customers(),
        dim_addresses(),
        dim_date(),
        fact_orders(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_sql_dim_date() {
        let sql = dim_date().create_sql(true).unwrap();

        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS `dim_date` ("));
        assert!(sql.contains("`date_id` INT PRIMARY KEY"));
        assert!(sql.contains("`full_date` DATE"));
        assert!(sql.contains("`weekday_name` VARCHAR(10)"));
    }

    #[test]
    fn test_quote_ident_rejects_injection() {
        assert_eq!(quote_ident("dim_products_temp").unwrap(), "`dim_products_temp`");
        assert!(matches!(quote_ident("x`; DROP TABLE y"), Err(EtlError::Schema(_))));
        assert!(quote_ident("").is_err());
    }

    #[test]
    fn test_infer_staging_schema() {
        let mut table = Table::new(["id", "name", "price", "note"]);
        table
            .push_row(vec![1i64.into(), FieldValue::Null, 2i64.into(), FieldValue::Null])
            .unwrap();
        table
            .push_row(vec![2i64.into(), "b".into(), 2.5f64.into(), FieldValue::Null])
            .unwrap();

        let schema = TableSchema::infer("t_temp", &table);
        let types: Vec<ColumnType> = schema.columns.iter().map(|c| c.column_type).collect();
        assert_eq!(
            types,
            vec![ColumnType::BigInt, ColumnType::Text, ColumnType::Double, ColumnType::Text]
        );
        assert!(schema.primary_key().is_none());
    }

    #[test]
    fn test_warehouse_keys() {
        let keys: Vec<Option<String>> = warehouse_tables()
            .iter()
            .map(|t| t.primary_key().map(|c| c.name.clone()))
            .collect();
        assert_eq!(
            keys,
            vec![
                Some("product_id".to_string()),
                Some("customer_id".to_string()),
                Some("address_id".to_string()),
                Some("date_id".to_string()),
                None,
            ]
        );
    }
}
