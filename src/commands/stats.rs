use anyhow::Result;

use super::Context;

pub async fn show_stats(ctx: &Context) -> Result<()> {
    let stats = ctx.queue().stats().await?;

    println!("\nBlockMine Statistics");
    println!("====================");
    println!("Data directory: {}", ctx.config.storage.data_dir.display());
    println!("Crawl jobs: {}", stats.total());
    println!("  pending:     {}", stats.pending);
    println!("  in progress: {}", stats.in_progress);
    println!("  complete:    {}", stats.complete);
    println!("  failed:      {}", stats.failed);
    Ok(())
}
