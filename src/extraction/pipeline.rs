//! Site extraction stage
//!
//! Runs the block extractor over every stored page of a site, upserts the
//! resulting Block records, stores block HTML and metadata blobs, and rolls
//! the site's blocks up into its DesignSystem.

use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use super::extractor::BlockExtractor;
use super::types::ExtractedBlock;
use crate::store::{block_html_key, block_metadata_key, page_html_key, BlobStore, Store};
use crate::types::{new_id, Block, BoundingBox, DesignSystem, Page, RecordId};

/// Detector name recorded on extracted blocks
pub const DETECTOR: &str = "section-class";

/// Outcome of extracting one site
#[derive(Debug, Clone, Default)]
pub struct SiteExtractionResult {
    pub site_id: RecordId,
    pub pages_processed: usize,
    pub blocks_extracted: usize,
    pub errors: Vec<String>,
}

/// Extracts and persists the blocks of a crawled site
pub struct SiteExtractor {
    store: Arc<dyn Store>,
    blobs: Arc<dyn BlobStore>,
    extractor: BlockExtractor,
}

impl SiteExtractor {
    pub fn new(store: Arc<dyn Store>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            blobs,
            extractor: BlockExtractor::new(),
        }
    }

    pub async fn extract_site(&self, site_id: &str) -> Result<SiteExtractionResult> {
        let mut site = self
            .store
            .get_site(site_id)
            .await?
            .with_context(|| format!("Site {} not found", site_id))?;

        let mut result = SiteExtractionResult {
            site_id: site.id.clone(),
            ..Default::default()
        };

        for page in self.store.list_pages(&site.id).await? {
            match self.extract_page(&page).await {
                Ok(count) => {
                    result.pages_processed += 1;
                    result.blocks_extracted += count;
                }
                Err(e) => result.errors.push(format!("{}: {:#}", page.path, e)),
            }
        }

        let blocks = self.store.list_blocks(&site.id).await?;
        site.block_count = blocks.len() as u32;
        site.updated_at = Utc::now();
        self.store.update_site(&site).await?;

        let design = roll_up_design_system(&site.id, &blocks);
        if let Err(e) = self.store.upsert_design_system(&design).await {
            result.errors.push(format!("design system: {:#}", e));
        }

        tracing::info!(
            site_id,
            pages = result.pages_processed,
            blocks = result.blocks_extracted,
            errors = result.errors.len(),
            "site extraction finished"
        );
        Ok(result)
    }

    async fn extract_page(&self, page: &Page) -> Result<usize> {
        let key = page_html_key(&page.site_id, &page.id);
        let bytes = self
            .blobs
            .get(&key)
            .await?
            .with_context(|| format!("No stored HTML at {}", key))?;
        let html = String::from_utf8_lossy(&bytes);

        let extracted = self.extractor.extract(&html);
        let count = extracted.len();
        let mut kept = HashSet::with_capacity(count);
        for block in extracted {
            kept.insert(self.save_block(page, block).await?);
        }
        self.remove_stale_blocks(page, &kept).await?;
        Ok(count)
    }

    /// Delete blocks of `page` left over from an earlier extraction
    async fn remove_stale_blocks(&self, page: &Page, kept: &HashSet<RecordId>) -> Result<()> {
        let stale: Vec<RecordId> = self
            .store
            .list_blocks(&page.site_id)
            .await?
            .into_iter()
            .filter(|b| b.page_id == page.id && !kept.contains(&b.id))
            .map(|b| b.id)
            .collect();
        if stale.is_empty() {
            return Ok(());
        }

        for id in &stale {
            self.blobs.delete(&block_html_key(&page.site_id, id)).await?;
            self.blobs.delete(&block_metadata_key(&page.site_id, id)).await?;
        }
        let removed = self.store.delete_blocks(&stale).await?;
        tracing::debug!(page = %page.path, removed, "removed stale blocks");
        Ok(())
    }

    async fn save_block(&self, page: &Page, extracted: ExtractedBlock) -> Result<RecordId> {
        let now = Utc::now();
        let record = Block {
            id: new_id(),
            page_id: page.id.clone(),
            site_id: page.site_id.clone(),
            name: extracted.name,
            variant: extracted.variant,
            raw_html: extracted.raw_html,
            clean_html: extracted.clean_html,
            html_key: None,
            bbox: BoundingBox::from_ordinal(extracted.ordinal),
            design_tokens: extracted.design_tokens,
            content_model: extracted.content_model,
            css_variables: extracted.css_variables,
            quality_score: None,
            quality_tier: None,
            quality_breakdown: None,
            interactivity: extracted.interactivity,
            detector: DETECTOR.to_string(),
            created_at: now,
            updated_at: now,
        };

        let mut stored = self.store.upsert_block(&record).await?;

        let html_key = block_html_key(&stored.site_id, &stored.id);
        self.blobs
            .put(&html_key, stored.clean_html.as_bytes().to_vec(), "text/html")
            .await?;

        let metadata = serde_json::json!({
            "name": stored.name,
            "variant": stored.variant,
            "design_tokens": stored.design_tokens,
            "content_model": stored.content_model,
            "css_variables": stored.css_variables,
            "interactivity": stored.interactivity,
        });
        self.blobs
            .put(
                &block_metadata_key(&stored.site_id, &stored.id),
                serde_json::to_vec(&metadata)?,
                "application/json",
            )
            .await?;

        stored.html_key = Some(html_key);
        self.store.update_block(&stored).await?;
        Ok(stored.id)
    }
}

/// Aggregate tokens and CSS variables of a site's blocks.
///
/// Lists keep first-seen order; for CSS variables the first non-empty value wins.
pub fn roll_up_design_system(site_id: &str, blocks: &[Block]) -> DesignSystem {
    let mut colors = Vec::new();
    let mut fonts = Vec::new();
    let mut spacing = Vec::new();
    let mut css_variables = BTreeMap::new();

    fn merge(into: &mut Vec<String>, values: &[String]) {
        for v in values {
            if !into.contains(v) {
                into.push(v.clone());
            }
        }
    }

    for block in blocks {
        merge(&mut colors, &block.design_tokens.colors);
        merge(&mut fonts, &block.design_tokens.fonts);
        merge(&mut spacing, &block.design_tokens.spacing);
        for (name, value) in &block.css_variables {
            let entry = css_variables.entry(name.clone()).or_insert_with(String::new);
            if entry.is_empty() {
                *entry = value.clone();
            }
        }
    }

    DesignSystem {
        id: new_id(),
        site_id: site_id.to_string(),
        colors,
        fonts,
        spacing,
        css_variables,
        block_count: blocks.len() as u32,
        updated_at: Utc::now(),
    }
}
