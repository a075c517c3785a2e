#![warn(rust_2018_idioms, clippy::pedantic)]
#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

use clap::{Parser, Subcommand};
use modera_core::CONFIG;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

mod serve;
mod wait_for_db;
mod worker;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate the database.
    Migrate {},
    /// Wait for the database to come up.
    WaitForDb {
        #[clap(
            default_value_t = 15,
            long,
            short,
            help = "Number of retries before giving up."
        )]
        retries: u32,
        #[clap(
            default_value_t = 2,
            long,
            short,
            help = "Delay in seconds between retries."
        )]
        backoff: u64,
    },
    /// Run the HTTP API (enqueue, read and entity-management routes).
    Serve {},
    /// Run the moderation worker consuming the bus and scoring listings.
    Worker {},
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .json()
        .flatten_event(true)
        .with_current_span(true)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    match cli.command {
        Some(Commands::WaitForDb { retries, backoff }) => {
            wait_for_db::wait_for_db(retries, backoff).await?;
        }
        Some(Commands::Migrate {}) => {
            print_version();
            migrate().await?;
        }
        Some(Commands::Serve {}) => {
            print_version();
            serve_and_maybe_migrate().await?;
        }
        Some(Commands::Worker {}) => {
            print_version();
            worker::run().await?;
        }
        None => {
            if CONFIG.debug.auto_serve {
                print_version();
                serve_and_maybe_migrate().await?;
            } else {
                eprintln!("No subcommand provided. Use --help for more information.");
                anyhow::bail!("No subcommand provided");
            }
        }
    }

    Ok(())
}

async fn serve_and_maybe_migrate() -> anyhow::Result<()> {
    if CONFIG.debug.migrate_before_serve {
        wait_for_db::wait_for_db(15, 2).await?;
        migrate().await?;
    }
    serve::serve().await
}

async fn migrate() -> anyhow::Result<()> {
    println!("Migrating database...");
    let store = modera_core::store::PostgresTaskStore::connect(&CONFIG.database).await?;
    store.migrate().await?;
    println!("Database migration complete.");
    Ok(())
}

fn print_version() {
    tracing::info!("Modera moderation pipeline version {VERSION}");
}
