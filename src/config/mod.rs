//! Configuration for blockmine

mod crawl;
mod discovery;
mod logging;
mod scoring;
mod storage;

pub use crawl::{CrawlConfig, QueueConfig};
pub use discovery::DiscoveryConfig;
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use scoring::{ScoringConfig, DEFAULT_PRUNE_FLOOR};
pub use storage::StorageConfig;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default user agent for all HTTP requests (pages, robots.txt, sitemaps, API)
pub const DEFAULT_USER_AGENT: &str = "BlockMineBot/1.0 (+https://github.com/blockmine/blockmine)";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file and validate it
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when it exists, otherwise fall back to defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate all configuration fields.
    ///
    /// Collects every error and reports them together.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.crawl.user_agent.trim().is_empty() {
            errors.push("crawl.user_agent must not be empty".to_string());
        }
        if self.crawl.max_pages == 0 {
            errors.push("crawl.max_pages must be positive".to_string());
        }
        if self.crawl.request_timeout_secs == 0 {
            errors.push("crawl.request_timeout_secs must be positive".to_string());
        }
        if self.crawl.max_content_size == 0 {
            errors.push("crawl.max_content_size must be positive".to_string());
        }
        if self.crawl.robots_cache_size == 0 {
            errors.push("crawl.robots_cache_size must be positive".to_string());
        }

        if self.queue.max_attempts == 0 {
            errors.push("queue.max_attempts must be positive".to_string());
        }
        if self.queue.workers == 0 {
            errors.push("queue.workers must be positive".to_string());
        }

        if self.discovery.api_base_url.trim().is_empty() {
            errors.push("discovery.api_base_url must not be empty".to_string());
        }
        for repo in &self.discovery.seed_repositories {
            if repo.split_once('/').map_or(true, |(o, n)| o.is_empty() || n.is_empty()) {
                errors.push(format!("discovery.seed_repositories entry '{}' must be owner/name", repo));
            }
        }
        if self.discovery.concurrency == 0 {
            errors.push("discovery.concurrency must be positive".to_string());
        }

        if self.scoring.prune_floor > 100 {
            errors.push("scoring.prune_floor must be at most 100".to_string());
        }

        if self.storage.data_dir.as_os_str().is_empty() {
            errors.push("storage.data_dir must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes_validation() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn default_crawl_values() {
        let cfg = CrawlConfig::default();
        assert_eq!(cfg.default_delay_ms, 3000);
        assert!(cfg.respect_robots);
        assert!(cfg.include_sitemap);
        assert_eq!(QueueConfig::default().max_attempts, 3);
    }

    #[test]
    fn validate_rejects_malformed_seed_repository() {
        let mut cfg = Config::default();
        cfg.discovery.seed_repositories = vec!["no-slash".to_string()];
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("no-slash"));
    }

    #[test]
    fn validate_collects_multiple_errors() {
        let mut cfg = Config::default();
        cfg.crawl.max_pages = 0;
        cfg.queue.workers = 0;
        cfg.discovery.concurrency = 0;
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("max_pages"));
        assert!(err.contains("workers"));
        assert!(err.contains("concurrency"));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: Config = toml::from_str("[crawl]\nmax_pages = 10\n").unwrap();
        assert_eq!(cfg.crawl.max_pages, 10);
        assert_eq!(cfg.crawl.default_delay_ms, 3000);
        assert_eq!(cfg.queue.max_attempts, 3);
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blockmine.toml");
        std::fs::write(&path, "[queue]\nworkers = 4\n").unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.queue.workers, 4);
    }
}
