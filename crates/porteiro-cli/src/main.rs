use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use porteiro_store::RosterStore;

#[derive(Parser)]
#[command(name = "porteiro", about = "Porteiro access-control roster and log inspector")]
struct Cli {
    /// Path to the SQLite database (defaults to the daemon's location).
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List enrolled residents
    Residents {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show recent access events, newest first
    Events {
        /// Maximum number of events to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn default_db_path() -> PathBuf {
    std::env::var("PORTEIRO_DB_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let data_dir = std::env::var("XDG_DATA_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                    PathBuf::from(home).join(".local/share")
                });
            data_dir.join("porteiro/condominio.db")
        })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let db_path = cli.db.unwrap_or_else(default_db_path);
    let store = RosterStore::open(&db_path)
        .with_context(|| format!("opening roster store at {}", db_path.display()))?;

    match cli.command {
        Commands::Residents { json } => {
            let residents = store.all_residents().context("loading residents")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&residents)?);
            } else if residents.is_empty() {
                println!("No residents enrolled.");
            } else {
                println!("{:>5}  {:<24} {:<8} {:<8}", "id", "name", "block", "unit");
                for r in &residents {
                    println!("{:>5}  {:<24} {:<8} {:<8}", r.id, r.name, r.block, r.unit);
                }
            }
        }
        Commands::Events { limit, json } => {
            let events = store
                .recent_access_events(limit)
                .context("loading access events")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&events)?);
            } else if events.is_empty() {
                println!("No access events logged.");
            } else {
                println!(
                    "{:>5}  {:>11}  {:<28} {}",
                    "id", "resident", "timestamp", "authorized"
                );
                for e in &events {
                    let resident = e
                        .resident_id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{:>5}  {:>11}  {:<28} {}",
                        e.id, resident, e.timestamp, e.authorized
                    );
                }
            }
        }
    }

    Ok(())
}
