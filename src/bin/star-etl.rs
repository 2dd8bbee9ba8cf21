//! star-etl CLI - loads the e-commerce warehouse from the source database
//!
//! Connection settings come from the environment (a `.env` file is read first).

use clap::{Parser, Subcommand};
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use star_etl::{
    populate_date_dimension, run_etl, Database, DateRange, EtlConfig, EtlError, Loader, WarehouseSession,
};

#[derive(Parser)]
#[command(name = "star-etl")]
#[command(version, about = "Load an e-commerce database into a star-schema warehouse", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load products, customers and addresses dimensions, then the orders fact (default)
    Run,

    /// Generate the calendar dimension (2020-01-01 to 2030-12-31)
    PopulateDates,

    /// Verify that the source and destination databases are reachable
    Check,
}

fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(),
        Commands::PopulateDates => populate_dates(),
        Commands::Check => check(),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), EtlError> {
    let config = EtlConfig::from_env()?;
    let mut source = Database::new("source", &config.source_url())?;
    let mut destination = Database::new("destination", &config.destination_url())?;

    let summary = run_etl(&config.settings, &mut source, &mut destination)?;
    for load in &summary.loads {
        println!("  {}: {} of {} rows inserted", load.table, load.inserted, load.incoming);
    }
    println!("ETL process completed successfully.");
    Ok(())
}

fn populate_dates() -> Result<(), EtlError> {
    let config = EtlConfig::from_env()?;
    let mut destination = Database::new("destination", &config.destination_url())?;
    let loader = Loader::new(config.settings.insert_batch_size);

    let report = destination.with_warehouse(|wh| {
        populate_date_dimension(wh, &loader, &DateRange::warehouse_default())
    })?;
    println!("  {}: {} of {} rows inserted", report.table, report.inserted, report.incoming);
    println!("Date dimension inserted successfully.");
    Ok(())
}

fn check() -> Result<(), EtlError> {
    let config = EtlConfig::from_env()?;

    for (name, url) in [
        ("source", config.source_url()),
        ("destination", config.destination_url()),
    ] {
        let db = Database::new(name, &url)?;
        db.test_connection()?;
        println!("✓ {} database reachable", name);
    }
    Ok(())
}
