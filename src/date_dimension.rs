//! Calendar dimension generator.
//!
//! Produces one `dim_date` row per day of a fixed inclusive range. Loading
//! goes through the dedup loader keyed on `date_id`, so running the generator
//! twice leaves one row per day.

use chrono::{Datelike, NaiveDate};

use crate::entity::FieldValue;
use crate::error::EtlError;
use crate::load::{LoadReport, Loader, Warehouse};
use crate::schema::{self, DIM_DATE};
use crate::table::Table;
use crate::transform::date_key;

/// Inclusive range of calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, EtlError> {
        if start > end {
            return Err(EtlError::config(format!(
                "date range start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// 2020-01-01 through 2030-12-31
    pub fn warehouse_default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2020, 1, 1).expect("valid calendar date"),
            end: NaiveDate::from_ymd_opt(2030, 12, 31).expect("valid calendar date"),
        }
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |d| *d <= self.end)
    }

    pub fn num_days(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }
}

fn quarter(date: NaiveDate) -> u32 {
    (date.month() - 1) / 3 + 1
}

/// Build the `dim_date` rows for `range`
pub fn generate_date_dimension(range: &DateRange) -> Result<Table, EtlError> {
    let mut table = Table::new(schema::dim_date().column_names());

    for day in range.days() {
        let row = vec![
            FieldValue::from(date_key(day)),
            FieldValue::Date(day),
            FieldValue::from(day.day() as i64),
            FieldValue::from(day.month() as i64),
            FieldValue::from(quarter(day) as i64),
            FieldValue::from(day.year()),
            FieldValue::String(day.format("%A").to_string()),
        ];
        table.push_row(row)?;
    }

    Ok(table)
}

/// Create `dim_date` if absent and load every day of `range` not yet present
pub fn populate_date_dimension<W: Warehouse>(
    warehouse: &mut W,
    loader: &Loader,
    range: &DateRange,
) -> Result<LoadReport, EtlError> {
    tracing::info!("Generating date dimension {} to {}", range.start, range.end);

    warehouse.create_table(&schema::dim_date(), true)?;
    let table = generate_date_dimension(range)?;
    loader.load_dedup(warehouse, &table, DIM_DATE, "date_id")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_default_range_has_4018_days() {
        let range = DateRange::warehouse_default();
        let table = generate_date_dimension(&range).unwrap();

        assert_eq!(range.num_days(), 4018);
        assert_eq!(table.len(), 4018);
        assert_eq!(table.get(0, "date_id"), Some(&FieldValue::Int(20200101)));
        assert_eq!(table.get(4017, "date_id"), Some(&FieldValue::Int(20301231)));
    }

    #[test]
    fn test_date_id_matches_full_date() {
        let table = generate_date_dimension(&DateRange::warehouse_default()).unwrap();

        for row in table.rows() {
            let (FieldValue::Int(id), FieldValue::Date(date)) = (&row[0], &row[1]) else {
                panic!("unexpected row {:?}", row);
            };
            assert_eq!(*id, date.format("%Y%m%d").to_string().parse::<i64>().unwrap());
        }
    }

    #[test]
    fn test_calendar_attributes() {
        let range = DateRange::new(ymd(2020, 2, 29), ymd(2020, 10, 1)).unwrap();
        let table = generate_date_dimension(&range).unwrap();

        let first = table.row_map(0).unwrap();
        assert_eq!(first["day"], &FieldValue::Int(29));
        assert_eq!(first["month"], &FieldValue::Int(2));
        assert_eq!(first["quarter"], &FieldValue::Int(1));
        assert_eq!(first["year"], &FieldValue::Int(2020));
        assert_eq!(first["weekday_name"], &FieldValue::String("Saturday".to_string()));

        let last = table.row_map(table.len() - 1).unwrap();
        assert_eq!(last["quarter"], &FieldValue::Int(4));
        assert_eq!(last["weekday_name"], &FieldValue::String("Thursday".to_string()));
    }

    #[test]
    fn test_single_day_range() {
        let day = ymd(2021, 1, 1);
        let table = generate_date_dimension(&DateRange::new(day, day).unwrap()).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert!(matches!(
            DateRange::new(ymd(2021, 1, 2), ymd(2021, 1, 1)),
            Err(EtlError::Config(_))
        ));
    }
}
