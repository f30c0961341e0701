//! Batch scoring of a site's blocks

use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{QualityScorer, QualityTier};
use crate::config::{ScoringConfig, DEFAULT_PRUNE_FLOOR};
use crate::store::{block_html_key, block_metadata_key, BlobStore, Store};
use crate::types::{Block, RecordId};

/// Outcome of scoring one site
#[derive(Debug, Clone, Default)]
pub struct BatchScoreResult {
    pub site_id: RecordId,
    pub blocks_scored: usize,
    pub blocks_pruned: usize,
    pub tiers: BTreeMap<QualityTier, usize>,
    pub avg_score: Option<f64>,
    pub errors: Vec<String>,
}

pub struct BatchScorer {
    store: Arc<dyn Store>,
    blobs: Arc<dyn BlobStore>,
    scorer: QualityScorer,
    prune_floor: u8,
}

impl BatchScorer {
    pub fn new(store: Arc<dyn Store>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            blobs,
            scorer: QualityScorer::new(),
            prune_floor: DEFAULT_PRUNE_FLOOR,
        }
    }

    pub fn from_config(store: Arc<dyn Store>, blobs: Arc<dyn BlobStore>, config: &ScoringConfig) -> Self {
        Self::new(store, blobs).with_prune_floor(config.prune_floor)
    }

    pub fn with_prune_floor(mut self, floor: u8) -> Self {
        self.prune_floor = floor;
        self
    }

    /// Score every block of a site and persist score, tier and breakdown.
    ///
    /// With `prune`, blocks scoring below the floor or left without a score
    /// are deleted along with their blobs.
    pub async fn score_site(&self, site_id: &str, prune: bool) -> Result<BatchScoreResult> {
        let mut site = self
            .store
            .get_site(site_id)
            .await?
            .with_context(|| format!("Site {} not found", site_id))?;

        let mut result = BatchScoreResult {
            site_id: site.id.clone(),
            ..Default::default()
        };

        for mut block in self.store.list_blocks(&site.id).await? {
            // The cleaned copy has lost inline styles and data attributes
            let html = if block.raw_html.is_empty() {
                &block.clean_html
            } else {
                &block.raw_html
            };
            let report = self.scorer.score(html, &block.interactivity);

            block.quality_score = Some(report.overall);
            block.quality_tier = Some(report.tier);
            block.quality_breakdown = Some(report.breakdown);
            block.updated_at = Utc::now();

            match self.store.update_block(&block).await {
                Ok(()) => {
                    result.blocks_scored += 1;
                    *result.tiers.entry(report.tier).or_default() += 1;
                    tracing::debug!(
                        block = %block.name,
                        score = report.overall,
                        tier = %report.tier,
                        issues = report.issues.len(),
                        "scored block"
                    );
                }
                Err(e) => result.errors.push(format!("{}: {:#}", block.id, e)),
            }
        }

        if prune {
            let blocks = self.store.list_blocks(&site.id).await?;
            let doomed: Vec<&Block> = blocks
                .iter()
                .filter(|b| b.quality_score.map_or(true, |s| s < self.prune_floor))
                .collect();
            result.blocks_pruned = self.prune(&doomed, &mut result.errors).await?;
        }

        let remaining = self.store.list_blocks(&site.id).await?;
        let scores: Vec<f64> = remaining
            .iter()
            .filter_map(|b| b.quality_score)
            .map(f64::from)
            .collect();
        result.avg_score = if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        };

        site.avg_quality_score = result.avg_score;
        site.block_count = remaining.len() as u32;
        site.updated_at = Utc::now();
        self.store.update_site(&site).await?;

        tracing::info!(
            site_id,
            scored = result.blocks_scored,
            pruned = result.blocks_pruned,
            avg = ?result.avg_score,
            "site scoring finished"
        );
        Ok(result)
    }

    async fn prune(&self, blocks: &[&Block], errors: &mut Vec<String>) -> Result<usize> {
        if blocks.is_empty() {
            return Ok(0);
        }
        for block in blocks {
            for key in [
                block_html_key(&block.site_id, &block.id),
                block_metadata_key(&block.site_id, &block.id),
            ] {
                if let Err(e) = self.blobs.delete(&key).await {
                    errors.push(format!("{}: {:#}", key, e));
                }
            }
        }
        let ids: Vec<RecordId> = blocks.iter().map(|b| b.id.clone()).collect();
        self.store.delete_blocks(&ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::InteractivityFlags;
    use crate::store::{MemoryBlobStore, MemoryStore};
    use crate::types::{new_id, BoundingBox, Site};

    const GOOD: &str = r#"<div class="cards"><div><div><picture><source srcset="a.webp"><img src="a.jpg" alt="A" loading="lazy" width="4" height="3"></picture></div><div><h3>Title</h3><p><a href="/more">More</a></p></div></div></div>"#;

    fn block(site: &Site, name: &str, html: &str, ordinal: usize) -> Block {
        let now = Utc::now();
        Block {
            id: new_id(),
            page_id: "page-1".into(),
            site_id: site.id.clone(),
            name: name.into(),
            variant: None,
            raw_html: html.into(),
            clean_html: html.into(),
            html_key: None,
            bbox: BoundingBox::from_ordinal(ordinal),
            design_tokens: Default::default(),
            content_model: Vec::new(),
            css_variables: BTreeMap::new(),
            quality_score: None,
            quality_tier: None,
            quality_breakdown: None,
            interactivity: InteractivityFlags::default(),
            detector: "test".into(),
            created_at: now,
            updated_at: now,
        }
    }

    async fn seeded(floor: u8) -> (BatchScorer, Arc<MemoryStore>, Arc<MemoryBlobStore>, Site) {
        let store = Arc::new(MemoryStore::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let site = store.upsert_site(&Site::new("acme.example", None)).await.unwrap();
        for (i, (name, html)) in [("cards", GOOD), ("hero", GOOD)].iter().enumerate() {
            let stored = store.upsert_block(&block(&site, name, html, i)).await.unwrap();
            blobs
                .put(&block_html_key(&site.id, &stored.id), html.as_bytes().to_vec(), "text/html")
                .await
                .unwrap();
        }
        let scorer = BatchScorer::new(store.clone(), blobs.clone()).with_prune_floor(floor);
        (scorer, store, blobs, site)
    }

    #[tokio::test]
    async fn test_score_site_persists_scores() {
        let (scorer, store, _, site) = seeded(DEFAULT_PRUNE_FLOOR).await;
        let result = scorer.score_site(&site.id, false).await.unwrap();
        assert_eq!(result.blocks_scored, 2);
        assert_eq!(result.blocks_pruned, 0);

        for b in store.list_blocks(&site.id).await.unwrap() {
            let score = b.quality_score.unwrap();
            assert_eq!(b.quality_tier, Some(QualityTier::from_score(score)));
            assert_eq!(b.quality_breakdown.unwrap().overall(), score);
        }

        let site = store.get_site(&site.id).await.unwrap().unwrap();
        assert_eq!(site.avg_quality_score, result.avg_score);
        assert!(site.avg_quality_score.is_some());
        assert_eq!(site.block_count, 2);
    }

    #[tokio::test]
    async fn test_prune_removes_blocks_below_floor() {
        // Nothing scores above 100, so every block is pruned
        let (scorer, store, blobs, site) = seeded(101).await;
        let ids: Vec<String> = store.list_blocks(&site.id).await.unwrap().into_iter().map(|b| b.id).collect();

        let result = scorer.score_site(&site.id, true).await.unwrap();
        assert_eq!(result.blocks_pruned, 2);
        assert_eq!(store.count_blocks(&site.id).await.unwrap(), 0);
        for id in ids {
            assert!(blobs.get(&block_html_key(&site.id, &id)).await.unwrap().is_none());
        }

        let site = store.get_site(&site.id).await.unwrap().unwrap();
        assert_eq!(site.block_count, 0);
        assert_eq!(site.avg_quality_score, None);
    }

    #[tokio::test]
    async fn test_prune_keeps_good_blocks() {
        let (scorer, store, _, site) = seeded(DEFAULT_PRUNE_FLOOR).await;
        let result = scorer.score_site(&site.id, true).await.unwrap();
        assert_eq!(result.blocks_pruned, 0);
        assert_eq!(store.count_blocks(&site.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_scores_markup_before_cleaning() {
        let page = r#"<main><div class="section">
            <div class="legacy" style="width: 1600px; color: red"><div style="min-width: 2000px"><p>Wide</p></div></div>
        </div></main>"#;
        let extracted = crate::extraction::BlockExtractor::new().extract(page).remove(0);
        assert!(!extracted.clean_html.contains("1600px"));

        let store = Arc::new(MemoryStore::new());
        let site = store.upsert_site(&Site::new("acme.example", None)).await.unwrap();
        let mut record = block(&site, "legacy", &extracted.raw_html, 0);
        record.clean_html = extracted.clean_html.clone();
        record.interactivity = extracted.interactivity;
        store.upsert_block(&record).await.unwrap();

        BatchScorer::new(store.clone(), Arc::new(MemoryBlobStore::new()))
            .score_site(&site.id, false)
            .await
            .unwrap();

        let expected = crate::scoring::QualityScorer::new().score(&extracted.raw_html, &extracted.interactivity);
        let stored = store.list_blocks(&site.id).await.unwrap().remove(0);
        assert_eq!(stored.quality_breakdown, Some(expected.breakdown));
        assert_eq!(stored.quality_score, Some(expected.overall));
        assert!(expected.breakdown.responsiveness < 75);
    }

    #[tokio::test]
    async fn test_unknown_site_is_error() {
        let (scorer, _, _, _) = seeded(DEFAULT_PRUNE_FLOOR).await;
        assert!(scorer.score_site("missing", false).await.is_err());
    }
}
