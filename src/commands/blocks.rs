use anyhow::Result;

use blockmine::extraction::SiteExtractor;
use blockmine::scoring::BatchScorer;

use super::discover::print_errors;
use super::Context;

pub async fn extract(ctx: &Context, site: &str) -> Result<()> {
    let site = ctx.resolve_site(site).await?;
    let extractor = SiteExtractor::new(ctx.store.clone(), ctx.blobs.clone());
    let result = extractor.extract_site(&site.id).await?;

    println!(
        "Extracted {} block(s) from {} page(s) of {}",
        result.blocks_extracted, result.pages_processed, site.domain
    );
    print_errors(&result.errors);
    Ok(())
}

pub async fn score(ctx: &Context, site: &str, prune: bool) -> Result<()> {
    let site = ctx.resolve_site(site).await?;
    let scorer = BatchScorer::from_config(ctx.store.clone(), ctx.blobs.clone(), &ctx.config.scoring);
    let prune = prune || ctx.config.scoring.prune;
    let result = scorer.score_site(&site.id, prune).await?;

    println!("Scored {} block(s) of {}", result.blocks_scored, site.domain);
    for (tier, count) in &result.tiers {
        println!("  {:<8} {}", tier.to_string(), count);
    }
    if let Some(avg) = result.avg_score {
        println!("Average score: {:.1}", avg);
    }
    if prune {
        println!("Pruned: {}", result.blocks_pruned);
    }
    print_errors(&result.errors);
    Ok(())
}
