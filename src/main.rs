use clap::Parser;
use mechconnect::application::{LifecycleOrchestrator, NotificationDispatcher};
use mechconnect::config::AppConfig;
use mechconnect::domain::commission::CommissionSettings;
use mechconnect::domain::ports::{BookingFilter, LifecycleStore, LifecycleStoreRef};
use mechconnect::infrastructure::directory::{StaticCatalog, StaticDirectory};
use mechconnect::infrastructure::in_memory::InMemoryLifecycleStore;
use mechconnect::infrastructure::log_sink::LogNotificationSink;
use mechconnect::interfaces::csv::command_reader::CommandReader;
use mechconnect::interfaces::csv::directory_loader::{read_catalog, read_profiles};
use mechconnect::interfaces::csv::report_writer::ReportWriter;
use mechconnect::interfaces::replay;
use mechconnect::telemetry;
use miette::{IntoDiagnostic, Result, WrapErr};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Lifecycle commands CSV file
    input: PathBuf,

    /// Service catalog CSV (`id,name,price`)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Provider directory CSV (`id,name,kind,tier,contact`)
    #[arg(long)]
    providers: Option<PathBuf>,

    /// Commission settings JSON. Defaults apply when omitted.
    #[arg(long)]
    commission: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[cfg(feature = "storage-rocksdb")]
    #[arg(long)]
    db_path: Option<PathBuf>,
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(cli: &Cli) -> Result<LifecycleStoreRef> {
    match &cli.db_path {
        Some(db_path) => {
            let store = mechconnect::infrastructure::rocksdb::RocksDbLifecycleStore::open(db_path)
                .into_diagnostic()?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(InMemoryLifecycleStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(_cli: &Cli) -> Result<LifecycleStoreRef> {
    Ok(Arc::new(InMemoryLifecycleStore::new()))
}

/// Settings saved by an earlier run win; the file (or the defaults) seed a fresh store.
async fn load_commission(cli: &Cli, store: &LifecycleStoreRef) -> Result<CommissionSettings> {
    let seed = match &cli.commission {
        Some(path) => {
            let file = File::open(path).into_diagnostic()?;
            serde_json::from_reader(file)
                .into_diagnostic()
                .wrap_err("Invalid commission settings file")?
        }
        None => CommissionSettings::default(),
    };
    match store.commission_settings().await.into_diagnostic()? {
        Some(saved) => {
            info!(updated_by = ?saved.updated_by, "Using saved commission settings");
            Ok(saved)
        }
        None => Ok(seed),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load().into_diagnostic()?;
    telemetry::init(&config.telemetry).into_diagnostic()?;

    let catalog = match &cli.catalog {
        Some(path) => StaticCatalog::new(
            read_catalog(File::open(path).into_diagnostic()?).into_diagnostic()?,
        ),
        None => StaticCatalog::default(),
    };
    let directory = match &cli.providers {
        Some(path) => StaticDirectory::new(
            read_profiles(File::open(path).into_diagnostic()?).into_diagnostic()?,
        ),
        None => StaticDirectory::default(),
    };

    let store = open_store(&cli)?;
    let orchestrator = LifecycleOrchestrator::new(
        store.clone(),
        Arc::new(catalog),
        Arc::new(directory),
        load_commission(&cli, &store).await?,
        config.policy,
    );

    // Replay commands
    let file = File::open(&cli.input).into_diagnostic()?;
    for command in CommandReader::new(file).commands() {
        match command {
            Ok(command) => {
                if let Err(e) = replay::apply(&orchestrator, &command).await {
                    eprintln!("Error processing command: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading command: {}", e);
            }
        }
    }

    // Drain the outbox to the log
    let dispatcher = NotificationDispatcher::new(store, Arc::new(LogNotificationSink))
        .with_settings(config.dispatcher);
    loop {
        let report = dispatcher.dispatch_pending().await.into_diagnostic()?;
        if report.delivered + report.failed + report.abandoned == 0 {
            break;
        }
    }
    dispatcher.compact().await.into_diagnostic()?;

    let bookings = orchestrator
        .bookings(&BookingFilter::default())
        .await
        .into_diagnostic()?;
    let transactions = orchestrator.transactions().await.into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    writer
        .write_reports(&bookings, &transactions)
        .into_diagnostic()?;

    Ok(())
}
