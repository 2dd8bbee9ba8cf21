//! The star-schema load: three dimensions, then the orders fact.
//!
//! Each table goes extract → transform → load on its own; nothing carries
//! over between tables except the ordering (dimensions before the fact that
//! references them).

use diesel::prelude::*;
use diesel::sql_types::{BigInt, Date, Double, Nullable, Text};
use serde::Serialize;

use crate::config::{FactWindow, PipelineSettings};
use crate::entity::{Entity, FieldValue};
use crate::error::EtlError;
use crate::extract::{Source, SourceQuery};
use crate::load::{ensure_warehouse_tables, LoadMode, LoadReport, Loader, WarehouseSession};
use crate::schema::{DIM_ADDRESSES, DIM_CUSTOMERS, DIM_PRODUCTS, FACT_ORDERS};
use crate::table::Table;
use crate::transform::{add_constant_column, add_date_key};

#[derive(Debug, Clone, Serialize, QueryableByName)]
pub struct ProductRecord {
    #[diesel(sql_type = BigInt)]
    pub product_id: i64,
    #[diesel(sql_type = Nullable<Text>)]
    pub name: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub category: Option<String>,
    #[diesel(sql_type = Nullable<Double>)]
    pub price: Option<f64>,
}

impl Entity for ProductRecord {
    const NAME: &'static str = "ProductRecord";
}

#[derive(Debug, Clone, Serialize, QueryableByName)]
pub struct CustomerRecord {
    #[diesel(sql_type = BigInt)]
    pub customer_id: i64,
    #[diesel(sql_type = Nullable<Text>)]
    pub name: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub email: Option<String>,
    #[diesel(sql_type = Nullable<BigInt>)]
    pub address_id: Option<i64>,
}

impl Entity for CustomerRecord {
    const NAME: &'static str = "CustomerRecord";
}

#[derive(Debug, Clone, Serialize, QueryableByName)]
pub struct AddressRecord {
    #[diesel(sql_type = BigInt)]
    pub address_id: i64,
    #[diesel(sql_type = Nullable<Text>)]
    pub city: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub state: Option<String>,
}

impl Entity for AddressRecord {
    const NAME: &'static str = "AddressRecord";
}

/// One aggregated order line: customer × product × address × day
#[derive(Debug, Clone, Serialize, QueryableByName)]
pub struct OrderFactRecord {
    #[diesel(sql_type = BigInt)]
    pub customer_id: i64,
    #[diesel(sql_type = BigInt)]
    pub product_id: i64,
    #[diesel(sql_type = BigInt)]
    pub address_id: i64,
    #[diesel(sql_type = Nullable<Date>)]
    pub order_date: Option<chrono::NaiveDate>,
    #[diesel(sql_type = Nullable<Double>)]
    pub quantity: Option<f64>,
    #[diesel(sql_type = Nullable<Double>)]
    pub price: Option<f64>,
}

impl Entity for OrderFactRecord {
    const NAME: &'static str = "OrderFactRecord";
}

pub const PRODUCTS_QUERY: &str = "products";
pub const CUSTOMERS_QUERY: &str = "customers";
pub const ADDRESSES_QUERY: &str = "addresses";
pub const ORDERS_QUERY: &str = "orders";

pub fn products_query() -> SourceQuery {
    SourceQuery::new(
        PRODUCTS_QUERY,
        "SELECT CAST(id AS SIGNED) AS product_id, name, category, \
         CAST(pricing AS DOUBLE) AS price FROM products",
    )
}

pub fn customers_query() -> SourceQuery {
    SourceQuery::new(
        CUSTOMERS_QUERY,
        "SELECT CAST(id AS SIGNED) AS customer_id, name, email, \
         CAST(address_id AS SIGNED) AS address_id FROM customers",
    )
}

pub fn addresses_query() -> SourceQuery {
    SourceQuery::new(
        ADDRESSES_QUERY,
        "SELECT CAST(id AS SIGNED) AS address_id, city, region AS state FROM addresses",
    )
}

/// Order lines summed per customer, product, day and address within `window`
pub fn orders_query(window: &FactWindow) -> SourceQuery {
    SourceQuery::new(
        ORDERS_QUERY,
        r#"
        SELECT
            CAST(o.customer_id AS SIGNED) AS customer_id,
            CAST(op.product_id AS SIGNED) AS product_id,
            CAST(ad.id AS SIGNED) AS address_id,
            DATE(o.created_at) AS order_date,
            CAST(SUM(op.quantity) AS DOUBLE) AS quantity,
            CAST(AVG(op.unit_price) AS DOUBLE) AS price
        FROM orders o
        JOIN order_product op ON o.id = op.order_id
        JOIN addresses ad ON o.address_id = ad.id
        WHERE DATE(o.created_at) BETWEEN ? AND ?
        GROUP BY o.customer_id, op.product_id, DATE(o.created_at), ad.id
        "#,
    )
    .bind(window.start)
    .bind(window.end)
}

/// Reports of one full run, in load order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub loads: Vec<LoadReport>,
}

impl RunSummary {
    pub fn total_inserted(&self) -> usize {
        self.loads.iter().map(|l| l.inserted).sum()
    }
}

/// Runs the four loads against a source and a warehouse
pub struct Pipeline<'a> {
    settings: &'a PipelineSettings,
    loader: Loader,
}

impl<'a> Pipeline<'a> {
    pub fn new(settings: &'a PipelineSettings) -> Self {
        Self {
            settings,
            loader: Loader::new(settings.insert_batch_size),
        }
    }

    pub fn products<S: Source>(&self, source: &mut S) -> Result<Table, EtlError> {
        let mut table = source.extract::<ProductRecord>(&products_query())?;
        if !table.is_empty() {
            add_constant_column(&mut table, "brand", self.settings.product_brand.as_str().into(), Some("price"))?;
        }
        Ok(table)
    }

    pub fn customers<S: Source>(&self, source: &mut S) -> Result<Table, EtlError> {
        let mut table = source.extract::<CustomerRecord>(&customers_query())?;
        if !table.is_empty() {
            add_constant_column(
                &mut table,
                "phone",
                self.settings.customer_phone.as_str().into(),
                Some("address_id"),
            )?;
        }
        Ok(table)
    }

    pub fn addresses<S: Source>(&self, source: &mut S) -> Result<Table, EtlError> {
        let mut table = source.extract::<AddressRecord>(&addresses_query())?;
        if !table.is_empty() {
            add_constant_column(&mut table, "country", self.settings.address_country.as_str().into(), None)?;
            add_constant_column(
                &mut table,
                "zipcode",
                FieldValue::String(self.settings.address_zipcode.clone()),
                None,
            )?;
        }
        Ok(table)
    }

    pub fn order_facts<S: Source>(&self, source: &mut S) -> Result<Table, EtlError> {
        let mut table = source.extract::<OrderFactRecord>(&orders_query(&self.settings.fact_window))?;
        if table.is_empty() {
            return Ok(table);
        }
        add_date_key(&mut table, "order_date")?;
        table.select(&[
            "customer_id",
            "product_id",
            "address_id",
            "order_date_id",
            "quantity",
            "price",
        ])
    }

    /// Products, customers and addresses dimensions, then the orders fact.
    ///
    /// Each load checks out its own warehouse connection. The first error
    /// stops the run; tables already loaded stay loaded.
    pub fn run<S, D>(&self, source: &mut S, destination: &mut D) -> Result<RunSummary, EtlError>
    where
        S: Source,
        D: WarehouseSession,
    {
        let mut summary = RunSummary::default();

        let products = self.products(source)?;
        summary.loads.push(self.load(destination, &products, DIM_PRODUCTS, LoadMode::dedup("product_id"))?);

        let customers = self.customers(source)?;
        summary.loads.push(self.load(destination, &customers, DIM_CUSTOMERS, LoadMode::dedup("customer_id"))?);

        let addresses = self.addresses(source)?;
        summary.loads.push(self.load(destination, &addresses, DIM_ADDRESSES, LoadMode::dedup("address_id"))?);

        let facts = self.order_facts(source)?;
        summary.loads.push(self.load(destination, &facts, FACT_ORDERS, LoadMode::Append)?);

        Ok(summary)
    }

    fn load<D: WarehouseSession>(
        &self,
        destination: &mut D,
        data: &Table,
        table: &str,
        mode: LoadMode,
    ) -> Result<LoadReport, EtlError> {
        destination.with_warehouse(|wh| self.loader.load(wh, data, table, &mode))
    }
}

/// Create missing warehouse tables, then run the full pipeline
pub fn run_etl<S, D>(settings: &PipelineSettings, source: &mut S, destination: &mut D) -> Result<RunSummary, EtlError>
where
    S: Source,
    D: WarehouseSession,
{
    destination.with_warehouse(|wh| ensure_warehouse_tables(wh))?;

    let summary = Pipeline::new(settings).run(source, destination)?;
    tracing::info!(
        "Run finished: {} tables loaded, {} rows inserted",
        summary.loads.len(),
        summary.total_inserted()
    );
    Ok(summary)
}
