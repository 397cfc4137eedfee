use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use helpdesk_db::import::import_path;
use helpdesk_db::{Database, DbConfig};

/// Import client queries from a CSV export into the helpdesk database.
#[derive(Parser, Debug)]
#[command(name = "helpdesk-import", version)]
struct Cli {
    /// Path to the CSV file to import
    csv: PathBuf,

    /// Database file (defaults to HELPDESK_DB_PATH, then helpdesk.db)
    #[arg(long)]
    db: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "helpdesk_import=info,helpdesk_db=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = DbConfig::from_env()?;
    if let Some(path) = cli.db {
        config.path = path;
    }

    let db = Database::open(&config)?;
    let report = import_path(&db, &cli.csv)?;
    db.close()?;

    info!("Import of {} finished", cli.csv.display());
    println!(
        "Imported {} rows into client_queries ({} duplicates skipped, {} rejected).",
        report.inserted, report.duplicates, report.rejected
    );
    Ok(())
}
