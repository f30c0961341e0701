use anyhow::Result;
use clap::ValueEnum;
use std::sync::Arc;
use tracing::info;

use blockmine::discovery::{DiscoveryPipeline, GitHubClient};

use super::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Stage {
    Contributors,
    Scan,
    Verify,
    All,
}

pub async fn run(ctx: &Context, stage: Stage, check_live: bool) -> Result<()> {
    let mut config = ctx.config.discovery.clone();
    config.check_live_urls &= check_live;

    let host = GitHubClient::from_config(&config, &ctx.config.crawl.user_agent)?;
    let pipeline = DiscoveryPipeline::new(Arc::new(host), ctx.store.clone(), config)
        .with_fetcher(ctx.fetcher()?)
        .with_queue(ctx.queue());

    info!("Running discovery stage {:?}", stage);

    if matches!(stage, Stage::Contributors | Stage::All) {
        let r = pipeline.discover_contributors().await?;
        println!(
            "Contributors: {} repos, {} developers, {} bots skipped",
            r.repos_processed, r.developers_found, r.bots_skipped
        );
        print_errors(&r.errors);
    }

    if matches!(stage, Stage::Scan | Stage::All) {
        let r = pipeline.scan_developers().await?;
        println!(
            "Scan: {} developers, {} orgs, {} repositories ({} new), {} starred skipped",
            r.developers_scanned, r.orgs_scanned, r.repositories_found, r.repositories_added, r.starred_skipped
        );
        print_errors(&r.errors);
    }

    if matches!(stage, Stage::Verify | Stage::All) {
        let r = pipeline.verify_repositories().await?;
        println!(
            "Verify: {} checked, {} confirmed, {} live, {} sites, {} jobs queued",
            r.repositories_checked, r.repositories_confirmed, r.live_confirmed, r.sites_created, r.jobs_enqueued
        );
        print_errors(&r.errors);
    }

    Ok(())
}

pub fn print_errors(errors: &[String]) {
    if errors.is_empty() {
        return;
    }
    println!("  {} error(s):", errors.len());
    for e in errors.iter().take(20) {
        println!("    - {}", e);
    }
    if errors.len() > 20 {
        println!("    ... and {} more", errors.len() - 20);
    }
}
