//! BlockMine: mine reusable UI blocks from block-authored sites

use anyhow::Result;
use blockmine::config::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "blockmine")]
#[command(about = "Discover, crawl, extract and score UI blocks from block-authored sites")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "blockmine.toml")]
    config: PathBuf,

    /// Data directory
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run repository discovery
    Discover {
        /// Stage to run
        #[arg(short, long, value_enum, default_value = "all")]
        stage: commands::discover::Stage,

        /// Skip the live preview check during verification
        #[arg(long)]
        no_live: bool,
    },

    /// Queue a crawl job
    Enqueue {
        /// URL of the site to crawl
        url: String,

        /// Lower runs first
        #[arg(short, long, default_value = "100")]
        priority: i32,
    },

    /// Process queued crawl jobs
    Work {
        /// Exit once the queue has nothing claimable
        #[arg(long)]
        until_idle: bool,

        /// Number of concurrent workers (defaults to queue.workers)
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Crawl one site immediately
    Crawl {
        /// Site id or domain
        site: String,

        /// Page budget
        #[arg(short, long)]
        max_pages: Option<usize>,

        /// Ignore robots.txt
        #[arg(long)]
        ignore_robots: bool,
    },

    /// Extract blocks from a crawled site
    Extract {
        /// Site id or domain
        site: String,
    },

    /// Score a site's blocks
    Score {
        /// Site id or domain
        site: String,

        /// Delete blocks below the prune floor
        #[arg(long)]
        prune: bool,
    },

    /// Show crawl queue statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_or_default(&cli.config)?;
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir;
    }
    config.logging.init(cli.verbose)?;

    std::fs::create_dir_all(&config.storage.data_dir)?;
    let ctx = commands::Context::open(config)?;

    let outcome = match cli.command {
        Commands::Discover { stage, no_live } => {
            commands::discover::run(&ctx, stage, !no_live).await
        }
        Commands::Enqueue { url, priority } => commands::crawl::enqueue(&ctx, &url, priority).await,
        Commands::Work { until_idle, workers } => {
            commands::crawl::work(&ctx, until_idle, workers).await
        }
        Commands::Crawl {
            site,
            max_pages,
            ignore_robots,
        } => commands::crawl::crawl(&ctx, &site, max_pages, ignore_robots).await,
        Commands::Extract { site } => commands::blocks::extract(&ctx, &site).await,
        Commands::Score { site, prune } => commands::blocks::score(&ctx, &site, prune).await,
        Commands::Stats => commands::stats::show_stats(&ctx).await,
    };

    // Persist whatever was recorded, even after a failed command
    ctx.save()?;
    outcome
}
