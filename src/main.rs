mod analytics;
mod cli;
mod config;
mod db;
mod error;
mod identity;
mod ledger;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use ledger::types::MetricName;

#[derive(Parser)]
#[command(name = "ragledger", version, about = "Query ledger and usage analytics for a RAG chatbot")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database (or migrate an existing one)
    Init,
    /// Check database integrity and list what needs attention
    Doctor {
        /// Delete embeddings whose query no longer exists
        #[arg(long)]
        fix: bool,
    },
    /// Print usage analytics for a date range (UTC days, end inclusive)
    Summary {
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        /// Restrict to one book
        #[arg(long)]
        book: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Compute and store the daily aggregates for one UTC day
    Aggregate {
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        book: Option<String>,
    },
    /// List stored aggregates of one metric
    Aggregates {
        #[arg(long)]
        metric: MetricName,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        #[arg(long)]
        book: Option<String>,
    },
    /// Delete a query and its retrievals, response and feedback
    Purge {
        query_id: Uuid,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::LedgerConfig::load()?;

    // Log to stderr so stdout stays clean for --json output.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Init => cli::init(&config)?,
        Command::Doctor { fix } => cli::doctor::doctor(&config, fix)?,
        Command::Summary {
            start,
            end,
            book,
            json,
        } => cli::summary::summary(&config, start, end, book.as_deref(), json)?,
        Command::Aggregate { date, book } => {
            cli::aggregate::aggregate(&config, date, book.as_deref())?
        }
        Command::Aggregates {
            metric,
            start,
            end,
            book,
        } => cli::aggregate::list(&config, metric, start, end, book.as_deref())?,
        Command::Purge { query_id } => cli::purge::purge(&config, query_id)?,
    }

    Ok(())
}
