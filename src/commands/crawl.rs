use anyhow::{Context as _, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use url::Url;

use blockmine::scraping::{CrawlOptions, CrawlWorker, SiteCrawler};
use blockmine::store::Store;

use super::discover::print_errors;
use super::Context;

pub async fn enqueue(ctx: &Context, url: &str, priority: i32) -> Result<()> {
    let parsed = Url::parse(url)
        .or_else(|_| Url::parse(&format!("https://{}", url)))
        .with_context(|| format!("Invalid URL '{}'", url))?;

    let site_id = match parsed.host_str() {
        Some(host) => ctx.store.get_site_by_domain(host).await?.map(|s| s.id),
        None => None,
    };

    let job = ctx.queue().enqueue(parsed.as_str(), site_id, priority).await?;
    println!("Queued job {} for {}", job.id, job.url);
    Ok(())
}

pub async fn work(ctx: &Context, until_idle: bool, workers: Option<usize>) -> Result<()> {
    let fetcher = ctx.fetcher()?;
    let crawler = Arc::new(SiteCrawler::new(
        ctx.store.clone(),
        ctx.blobs.clone(),
        ctx.politeness(fetcher),
    ));
    let queue = ctx.queue();
    let options = CrawlOptions::from_config(&ctx.config.crawl);
    let idle_poll = Duration::from_millis(ctx.config.queue.idle_poll_ms);
    let count = workers.unwrap_or(ctx.config.queue.workers).max(1);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    if !until_idle {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutting down workers...");
                let _ = shutdown_tx.send(true);
            }
        });
    }

    let mut handles = Vec::with_capacity(count);
    for n in 0..count {
        let worker = CrawlWorker::new(queue.clone(), crawler.clone(), ctx.store.clone(), options.clone())
            .with_idle_poll(idle_poll);
        let shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            let summary = if until_idle {
                worker.run_until_idle().await
            } else {
                worker.run(shutdown).await
            };
            (n, summary)
        }));
    }

    let mut total_jobs = 0;
    let mut total_pages = 0;
    for handle in handles {
        match handle.await {
            Ok((n, Ok(summary))) => {
                info!(worker = n, ?summary, "worker finished");
                total_jobs += summary.jobs_processed;
                total_pages += summary.pages_crawled;
            }
            Ok((n, Err(e))) => warn!(worker = n, "worker failed: {:#}", e),
            Err(e) => warn!("worker task panicked: {}", e),
        }
    }

    println!("Processed {} job(s), crawled {} page(s)", total_jobs, total_pages);
    Ok(())
}

pub async fn crawl(ctx: &Context, site: &str, max_pages: Option<usize>, ignore_robots: bool) -> Result<()> {
    let site = match ctx.resolve_site(site).await {
        Ok(found) => found,
        Err(_) => {
            let domain = site.to_ascii_lowercase();
            info!("Registering new site {}", domain);
            ctx.store.upsert_site(&blockmine::types::Site::new(domain, None)).await?
        }
    };

    let mut options = CrawlOptions::from_config(&ctx.config.crawl);
    if let Some(max) = max_pages {
        options.max_pages = max;
    }
    if ignore_robots {
        options.respect_robots = false;
    }

    let crawler = SiteCrawler::new(
        ctx.store.clone(),
        ctx.blobs.clone(),
        ctx.politeness(ctx.fetcher()?),
    );
    let result = crawler.crawl_site(&site.id, &options).await?;

    println!("\nCrawl of {}", result.domain);
    println!("==============");
    println!("Status: {}", result.status);
    println!("Pages crawled: {}", result.pages_crawled());
    println!("Blocks found: {}", result.blocks_found);
    println!("Sitemap URLs: {}", result.sitemap_urls);
    println!("Skipped by robots: {}", result.skipped_by_robots);
    println!("Duration: {:.1}s", result.duration.as_secs_f64());
    print_errors(&result.errors);
    Ok(())
}
