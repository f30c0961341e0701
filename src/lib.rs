//! BlockMine: a corpus builder for reusable UI blocks
//!
//! Mines sites authored with the section/block page convention:
//! - Repository discovery through a code-hosting API (contributors, orgs, stars)
//! - Structural and live verification of candidate repositories
//! - Polite crawling with robots.txt, sitemaps and per-domain rate limits
//! - A durable crawl queue with bounded retry
//! - Block extraction with design tokens, content models and CSS variables
//! - Six-axis quality scoring, tiering and pruning

pub mod config;
pub mod discovery;
pub mod extraction;
pub mod scoring;
pub mod scraping;
pub mod store;
pub mod testing;
pub mod types;

pub use config::Config;
pub use types::*;
