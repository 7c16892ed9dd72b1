use clap::{Parser, Subcommand};

mod dashboard;
mod discover;
mod trends;

#[derive(Debug, Parser)]
#[command(name = "trendscout-cli")]
#[command(about = "trendscout command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one discovery pass against the configured sources.
    Discover {
        /// Restrict the pass to one source (`reddit` or `x`); repeatable.
        #[arg(long = "source", value_name = "NAME")]
        sources: Vec<String>,

        /// Per-source fetch cap, overriding the configured default.
        #[arg(long)]
        max_posts: Option<usize>,

        /// Show what would run without fetching or writing anything.
        #[arg(long)]
        dry_run: bool,
    },
    /// Show the top trend analyses by viral score.
    Trends {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Show the aggregated dashboard for the recent-post window.
    Dashboard {
        /// Lookback window in hours.
        #[arg(long)]
        hours: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = trendscout_core::load_app_config_from_env()?;
    let pool = trendscout_db::connect_pool(
        &config.database_url,
        trendscout_db::PoolConfig::from_app_config(&config),
    )
    .await?;
    trendscout_db::run_migrations(&pool).await?;

    match cli.command {
        Commands::Discover {
            sources,
            max_posts,
            dry_run,
        } => discover::run_discover(&pool, &config, &sources, max_posts, dry_run).await,
        Commands::Trends { limit } => trends::run_trends(&pool, limit).await,
        Commands::Dashboard { hours } => dashboard::run_dashboard(&pool, &config, hours).await,
    }
}
