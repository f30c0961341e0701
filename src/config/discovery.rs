//! Repository discovery configuration

use serde::{Deserialize, Serialize};

/// Repository discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Base URL of the code-hosting REST API
    pub api_base_url: String,
    /// Environment variable holding the API token
    pub token_env: String,
    /// Repositories whose contributors seed discovery
    pub seed_repositories: Vec<String>,
    /// Organizations scanned directly regardless of developers
    pub well_known_orgs: Vec<String>,
    /// Developers scanned per run, highest priority first
    pub top_developers: usize,
    /// Organizations followed per developer
    pub max_orgs_per_developer: usize,
    /// Starred repositories inspected per developer
    pub max_starred_per_developer: usize,
    /// Name keywords that make a starred repository worth keeping
    pub starred_keywords: Vec<String>,
    /// Items processed concurrently within one stage
    pub concurrency: usize,
    /// Repositories verified per run
    pub verify_batch_size: usize,
    /// Re-check confirmed repositories against their live preview URL
    pub check_live_urls: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.github.com".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
            seed_repositories: vec![
                "adobe/aem-boilerplate".to_string(),
                "adobe/aem-block-collection".to_string(),
                "adobe/helix-website".to_string(),
                "adobe/aem-lib".to_string(),
            ],
            well_known_orgs: vec!["hlxsites".to_string(), "aemsites".to_string()],
            top_developers: 50,
            max_orgs_per_developer: 10,
            max_starred_per_developer: 100,
            starred_keywords: vec![
                "aem".to_string(),
                "eds".to_string(),
                "franklin".to_string(),
                "helix".to_string(),
                "hlx".to_string(),
                "edge-delivery".to_string(),
                "boilerplate".to_string(),
            ],
            concurrency: 4,
            verify_batch_size: 100,
            check_live_urls: true,
        }
    }
}

impl DiscoveryConfig {
    /// Resolve the API token from the configured environment variable
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
    }
}
