//! Row transforms applied between extraction and load.
//!
//! Two kinds exist: surrogate date keys derived from a date column, and
//! static columns that stand in for data the source does not carry.

use crate::entity::FieldValue;
use crate::error::EtlError;
use crate::table::Table;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

/// Integer `YYYYMMDD` key for a calendar date
pub fn date_key(date: NaiveDate) -> i32 {
    date.year() * 10_000 + date.month() as i32 * 100 + date.day() as i32
}

/// Reduce a date, datetime or date-like string to a calendar date.
///
/// Nulls and anything unparseable are errors; no default date is substituted.
pub fn parse_calendar_date(value: &FieldValue) -> Result<NaiveDate, EtlError> {
    match value {
        FieldValue::Date(d) => Ok(*d),
        FieldValue::DateTime(dt) => Ok(dt.date()),
        FieldValue::String(s) => parse_date_str(s.trim()),
        FieldValue::Null => Err(EtlError::parse("null date value")),
        other => Err(EtlError::parse(format!("'{}' is not a date", other))),
    }
}

fn parse_date_str(s: &str) -> Result<NaiveDate, EtlError> {
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt.date());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }
    for format in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, format) {
            return Ok(d);
        }
    }
    Err(EtlError::parse(format!("unparseable date '{}'", s)))
}

/// Add `<column>_id` holding the `YYYYMMDD` key of each row's date.
///
/// The source column is kept. The first bad row aborts the transform and
/// leaves the table unchanged.
pub fn add_date_key(table: &mut Table, column: &str) -> Result<(), EtlError> {
    let values = table
        .column_values(column)
        .ok_or_else(|| EtlError::schema(format!("date column '{}' not found", column)))?;

    let keys = values
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            parse_calendar_date(value)
                .map(|d| FieldValue::Int(i64::from(date_key(d))))
                .map_err(|e| EtlError::parse(format!("column '{}', row {}: {}", column, row, e)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let key_column = format!("{}_id", column);
    let position = table.columns().len();
    let mut keys = keys.into_iter();
    table.insert_column_with(position, &key_column, |_| keys.next().unwrap_or(FieldValue::Null));

    tracing::debug!("Derived {} from {} for {} rows", key_column, column, table.len());
    Ok(())
}

/// Add a column holding `value` on every row.
///
/// With `before`, the column is placed immediately left of that column;
/// otherwise it is appended.
pub fn add_constant_column(
    table: &mut Table,
    name: &str,
    value: FieldValue,
    before: Option<&str>,
) -> Result<(), EtlError> {
    let position = match before {
        Some(anchor) => table
            .column_index(anchor)
            .ok_or_else(|| EtlError::schema(format!("column '{}' not found", anchor)))?,
        None => table.columns().len(),
    };

    table.insert_column_with(position, name, |_| value.clone());
    Ok(())
}
