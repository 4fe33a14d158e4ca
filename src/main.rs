use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{fmt, EnvFilter};

mod attendance;
mod auth;
mod coerce;
mod error;
mod ingest;
mod models;
mod ranking;
mod report;
mod store;
mod triggers;

use auth::{CallContext, CallerIdentity};
use ingest::ImportKind;
use store::postgres::{self, PgStore};

#[derive(Parser)]
#[command(name = "weekly-aggregates")]
#[command(about = "Group ranking and weekly attendance aggregates for Group Scholar", long_about = None)]
struct Cli {
    /// Postgres instance holding the document collections
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,

    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", global = true, default_value_t = 5)]
    max_connections: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the document store schema
    InitDb,
    /// Load realistic seed data and build its aggregates
    Seed,
    /// Import source rows from a CSV file
    Import {
        #[arg(long, value_enum)]
        kind: ImportKind,
        #[arg(long)]
        csv: PathBuf,
    },
    /// Rebuild every aggregate on behalf of an administrator
    RecomputeAll {
        /// Signed-in caller; omit to call anonymously
        #[arg(long)]
        email: Option<String>,
        /// The caller's email has not been verified
        #[arg(long)]
        unverified: bool,
    },
    /// Recompute aggregates as source collections change
    Watch,
    /// Generate a markdown report of the current aggregates
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let database_url = cli
        .database_url
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(cli.max_connections)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;
    let store = PgStore::new(pool);

    match cli.command {
        Commands::InitDb => {
            postgres::init_db(store.pool()).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let written = ingest::seed(&store).await?;
            println!("Seed data written ({written} documents) and aggregates rebuilt.");
        }
        Commands::Import { kind, csv } => {
            let inserted = ingest::import_csv(&store, kind, &csv).await?;
            println!(
                "Inserted {inserted} {} documents from {}.",
                kind.collection(),
                csv.display()
            );
        }
        Commands::RecomputeAll { email, unverified } => {
            let ctx = CallContext {
                auth: email.map(|email| CallerIdentity {
                    email: Some(email),
                    email_verified: !unverified,
                }),
            };
            match auth::recompute_all(&store, &ctx).await {
                Ok(ack) => println!("{}", serde_json::to_string(&ack)?),
                Err(err) => return Err(anyhow::anyhow!("{}: {err}", err.kind())),
            }
        }
        Commands::Watch => {
            triggers::watch(store.pool(), &store).await?;
        }
        Commands::Report { out } => {
            let data = report::load(&store).await?;
            std::fs::write(&out, report::build_report(&data))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
