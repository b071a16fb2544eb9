use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod executor;
mod models;
mod output;
mod planner;
mod retrieval;
mod tags;
mod template;
mod twitter;
mod week;

use config::AppConfig;
use executor::WarehouseExecutor;
use models::{Mode, Platform};
use retrieval::Retriever;
use twitter::{StatsOutcome, TwitterClient};
use week::WeekId;

#[derive(Parser)]
#[command(name = "kol-retrieval")]
#[command(about = "Fetch KOL post, tag and follower metrics from the warehouse", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct WeekArgs {
    #[arg(long)]
    platform: Platform,
    /// First week as YYYYWW (Monday-start numbering)
    #[arg(long, value_parser = parse_week)]
    start_week: WeekId,
    /// Last week as YYYYWW, strictly after the start week
    #[arg(long, value_parser = parse_week)]
    end_week: WeekId,
    /// Write CSV here instead of stdout. A query with no rows writes an
    /// empty file with no header.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Post timing with six weeks of history
    PostTime {
        #[command(flatten)]
        weeks: WeekArgs,
        #[arg(long)]
        country: String,
    },
    /// Weighted post metrics with six weeks of history
    PostMetrics {
        #[command(flatten)]
        weeks: WeekArgs,
        #[arg(long)]
        country: String,
    },
    /// Per-KOL weekly tag counts
    TagCounts {
        #[command(flatten)]
        weeks: WeekArgs,
        /// CSV with post_id,kol_id columns
        #[arg(long)]
        kol_map: PathBuf,
    },
    /// Follower counts over the training or inference window
    FollowerCount {
        #[command(flatten)]
        weeks: WeekArgs,
        #[arg(long)]
        inference: bool,
    },
    /// Raw post property rows
    Properties {
        #[command(flatten)]
        weeks: WeekArgs,
    },
    /// Raw post content rows
    Content {
        #[command(flatten)]
        weeks: WeekArgs,
    },
    /// Live follower, listed and post counts for a Twitter/X handle
    TwitterStats {
        #[arg(long)]
        handle: String,
    },
}

fn parse_week(raw: &str) -> Result<WeekId, String> {
    let value: i64 = raw
        .parse()
        .map_err(|_| format!("'{raw}' is not a YYYYWW week number"))?;
    WeekId::from_raw(value).map_err(|e| e.to_string())
}

fn init_tracing(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_output(out: Option<&PathBuf>) -> anyhow::Result<Box<dyn Write>> {
    match out {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(std::io::stdout().lock())),
    }
}

async fn connect(config: &AppConfig) -> anyhow::Result<Retriever<WarehouseExecutor>> {
    let database_url = config::require_database_url(config)
        .context("DATABASE_URL must be set to the KOL warehouse")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(database_url)
        .await
        .context("failed to connect to the warehouse")?;

    Ok(Retriever::new(WarehouseExecutor::new(
        pool,
        config.warehouse_context(),
    )))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load_app_config().context("invalid configuration")?;
    init_tracing(&config);

    match cli.command {
        Commands::PostTime { weeks, country } => {
            let retriever = connect(&config).await?;
            let table = retriever
                .post_time(weeks.platform, weeks.start_week, weeks.end_week, &country)
                .await?;
            output::write_table(&table, open_output(weeks.out.as_ref())?)?;
        }
        Commands::PostMetrics { weeks, country } => {
            let retriever = connect(&config).await?;
            let table = retriever
                .post_metrics(weeks.platform, weeks.start_week, weeks.end_week, &country)
                .await?;
            output::write_table(&table, open_output(weeks.out.as_ref())?)?;
        }
        Commands::TagCounts { weeks, kol_map } => {
            let post_to_kol = output::load_kol_map(&kol_map)?;
            let retriever = connect(&config).await?;
            let counts = retriever
                .tag_counts(weeks.platform, &post_to_kol, weeks.start_week, weeks.end_week)
                .await?;
            output::write_records(&counts, open_output(weeks.out.as_ref())?)?;
        }
        Commands::FollowerCount { weeks, inference } => {
            let retriever = connect(&config).await?;
            let table = retriever
                .follower_count(
                    weeks.platform,
                    weeks.start_week,
                    weeks.end_week,
                    Mode::from_inference_flag(inference),
                )
                .await?;
            output::write_table(&table, open_output(weeks.out.as_ref())?)?;
        }
        Commands::Properties { weeks } => {
            let retriever = connect(&config).await?;
            let table = retriever
                .post_properties(weeks.platform, weeks.start_week, weeks.end_week)
                .await?;
            output::write_table(&table, open_output(weeks.out.as_ref())?)?;
        }
        Commands::Content { weeks } => {
            let retriever = connect(&config).await?;
            let table = retriever
                .post_content(weeks.platform, weeks.start_week, weeks.end_week)
                .await?;
            output::write_table(&table, open_output(weeks.out.as_ref())?)?;
        }
        Commands::TwitterStats { handle } => {
            let credentials = config.twitter.clone().context(
                "API_KEY, API_SECRET, ACCESS_TOKEN_KEY and ACCESS_TOKEN_SECRET must all be set",
            )?;
            let client = TwitterClient::with_base_url(
                credentials,
                config.twitter_timeout_secs,
                &config.twitter_base_url,
            )?;

            match client.account_stats(&handle).await? {
                StatsOutcome::Fetched(stats) => {
                    let [followers, listed, posts] = stats.features();
                    println!("{handle}: {followers} followers, {listed} listed, {posts} posts");
                }
                StatsOutcome::AuthFailed { reason } => {
                    anyhow::bail!("Twitter authentication failed: {reason}");
                }
            }
        }
    }

    Ok(())
}
