//! Binding dynamically typed values into raw SQL.

use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::sql_types::{BigInt, Bool, Date, Double, Nullable, Text, Timestamp};

use super::database::DbBackend;
use crate::entity::FieldValue;

pub type BoxedQuery<'f> = BoxedSqlQuery<'f, DbBackend, SqlQuery>;

/// Bind one value to the next `?` placeholder, picking the SQL type from the
/// value's variant.
pub fn bind_value<'f>(query: BoxedQuery<'f>, value: &FieldValue) -> BoxedQuery<'f> {
    match value {
        FieldValue::String(s) => query.bind::<Text, _>(s.clone()),
        FieldValue::Int(i) => query.bind::<BigInt, _>(*i),
        FieldValue::Float(f) => query.bind::<Double, _>(*f),
        FieldValue::Bool(b) => query.bind::<Bool, _>(*b),
        FieldValue::Date(d) => query.bind::<Date, _>(*d),
        FieldValue::DateTime(dt) => query.bind::<Timestamp, _>(*dt),
        FieldValue::Null => query.bind::<Nullable<Text>, _>(None::<String>),
    }
}

/// Build a boxed raw query with every value bound in order
pub fn bound_query<'f>(sql: &str, values: &[FieldValue]) -> BoxedQuery<'f> {
    values
        .iter()
        .fold(diesel::sql_query(sql).into_boxed(), bind_value)
}
