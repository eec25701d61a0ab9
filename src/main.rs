use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use neighborhood_directory::{
    load_feed, run_import, Directory, ImportConfig, LogNotifier, SqliteDirectory,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(version, about = "Neighborhood resident directory")]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, default_value = "directory.db", env = "NEIGHBORHOOD_DB")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a saved GIS feature-query response
    Import {
        /// JSON feature collection
        #[arg(long)]
        feed: PathBuf,

        /// Import settings (JSON); defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the run report as JSON here
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// List residents of one parcel
    Residents {
        #[arg(long)]
        parcel: String,

        /// Include people who moved out
        #[arg(long)]
        include_former: bool,
    },

    /// Audit trail of one parcel
    History {
        #[arg(long)]
        parcel: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "neighborhood_directory=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Import {
            feed,
            config,
            report,
        } => run_import_command(&cli.db, &feed, config.as_deref(), report.as_deref()),
        Command::Residents {
            parcel,
            include_former,
        } => list_residents(&cli.db, &parcel, include_former),
        Command::History { parcel } => show_history(&cli.db, &parcel),
    }
}

fn run_import_command(
    db_path: &std::path::Path,
    feed_path: &std::path::Path,
    config_path: Option<&std::path::Path>,
    report_path: Option<&std::path::Path>,
) -> Result<()> {
    let config = match config_path {
        Some(path) => ImportConfig::from_file(path)?,
        None => ImportConfig::default(),
    };

    // A feed that cannot be read aborts the job before any record is touched
    let records = load_feed(feed_path)?;
    info!("Loaded {} parcel records from {:?}", records.len(), feed_path);

    let mut directory = SqliteDirectory::open(db_path)
        .with_context(|| format!("Failed to open database {:?}", db_path))?;

    let report = run_import(&mut directory, records, &config, &mut LogNotifier);

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report {:?}", path))?;
        info!("Report written to {:?}", path);
    }

    println!("{}", report.summary());
    Ok(())
}

fn list_residents(db_path: &std::path::Path, parcel: &str, include_former: bool) -> Result<()> {
    let directory = SqliteDirectory::open(db_path)?;
    let house = directory
        .find_house(parcel)?
        .with_context(|| format!("No house with parcel id {}", parcel))?;

    println!("{} ({})", house.attributes.formatted_address(), house.parcel_id);

    for resident in directory.residents(&house.id, include_former)? {
        let status = match resident.moved_out_at {
            Some(at) => format!("moved out {}", at.format("%Y-%m-%d")),
            None => "current".to_string(),
        };
        println!(
            "  {:<40} {:<10} since {}  {}",
            resident.name_for_display().unwrap_or("(housemate)"),
            if resident.is_owner() { "owner" } else { "housemate" },
            resident.first_seen_at.format("%Y-%m-%d"),
            status,
        );
    }

    Ok(())
}

fn show_history(db_path: &std::path::Path, parcel: &str) -> Result<()> {
    let directory = SqliteDirectory::open(db_path)?;
    let house = directory
        .find_house(parcel)?
        .with_context(|| format!("No house with parcel id {}", parcel))?;

    for event in directory.history(&house.id)? {
        println!(
            "{}  {:<20} {:<12} {}",
            event.timestamp.format("%Y-%m-%d %H:%M"),
            event.event_type,
            event.actor,
            event.data
        );
    }

    Ok(())
}
