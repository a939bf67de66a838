mod ingest;
mod query;
mod schedule;
mod services;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::services::{parse_feed, FeedSpec};

#[derive(Debug, Parser)]
#[command(name = "sentirag")]
#[command(about = "Financial sentiment ingestion and retrieval-augmented answers")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Fetch, score, embed and store snapshots for a tier or explicit tickers
    Ingest {
        /// Ticker tier to ingest (e.g., T0)
        #[arg(long)]
        tier: Option<String>,
        /// Ticker to ingest; repeatable, overrides --tier
        #[arg(long = "ticker")]
        tickers: Vec<String>,
        /// Source feed as `<source>=<path>` (e.g., finnhub=feeds/finnhub.json)
        #[arg(long = "feed", value_parser = parse_feed, required = true)]
        feeds: Vec<FeedSpec>,
        /// Run the pipeline against an in-memory store without touching the database
        #[arg(long)]
        dry_run: bool,
    },
    /// Delete snapshots and embeddings older than the retention horizon
    Retention {
        /// Retention horizon in hours (defaults to RETENTION_HOURS)
        #[arg(long)]
        hours: Option<i64>,
    },
    /// Ask a question answered from recent snapshots
    Ask {
        /// The question to answer
        query: String,
        /// Restrict retrieval to a ticker; repeatable
        #[arg(long = "ticker")]
        tickers: Vec<String>,
        /// Number of snapshots to retrieve
        #[arg(long)]
        k: Option<usize>,
        /// Only consider snapshots from the last N hours
        #[arg(long)]
        window_hours: Option<i64>,
        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show recent snapshots for a ticker
    Snapshots {
        /// Ticker symbol (e.g., AAPL)
        #[arg(long)]
        ticker: String,
        /// Look back this many minutes
        #[arg(long, default_value = "1440")]
        since_minutes: i64,
    },
    /// Run ingestion and retention on a cron schedule until interrupted
    Schedule {
        /// Source feed as `<source>=<path>`; repeatable
        #[arg(long = "feed", value_parser = parse_feed, required = true)]
        feeds: Vec<FeedSpec>,
        /// Cron expression (with seconds) for ingesting every tier
        #[arg(long, default_value = schedule::DEFAULT_INGEST_CRON)]
        ingest_cron: String,
        /// Cron expression (with seconds) for the retention sweep
        #[arg(long, default_value = schedule::DEFAULT_RETENTION_CRON)]
        retention_cron: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = sentirag_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Some(Commands::Migrate) => {
            let pool = services::connect(&config).await?;
            let applied = sentirag_db::run_migrations(&pool).await?;
            println!("migrations applied: {applied}");
            pool.close().await;
        }
        Some(Commands::Ingest {
            tier,
            tickers,
            feeds,
            dry_run,
        }) => {
            ingest::run_ingest(&config, tier.as_deref(), &tickers, &feeds, dry_run).await?;
        }
        Some(Commands::Retention { hours }) => {
            ingest::run_retention(&config, hours).await?;
        }
        Some(Commands::Ask {
            query,
            tickers,
            k,
            window_hours,
            json,
        }) => {
            query::run_ask(&config, &query, &tickers, k, window_hours, json).await?;
        }
        Some(Commands::Snapshots {
            ticker,
            since_minutes,
        }) => {
            query::run_snapshots(&config, &ticker, since_minutes).await?;
        }
        Some(Commands::Schedule {
            feeds,
            ingest_cron,
            retention_cron,
        }) => {
            schedule::run_schedule(config, &feeds, &ingest_cron, &retention_cron).await?;
        }
        None => println!("no command given; run `sentirag --help`"),
    }

    Ok(())
}
