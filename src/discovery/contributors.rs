//! Stage 1: contributors of the seed repositories become Developers

use anyhow::Result;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;

use super::DiscoveryPipeline;
use crate::types::Developer;

/// Outcome of contributor discovery
#[derive(Debug, Clone, Default)]
pub struct ContributorResult {
    pub repos_processed: usize,
    pub developers_found: usize,
    pub bots_skipped: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Default)]
struct Tally {
    contributions: u64,
    source_repos: Vec<String>,
}

impl DiscoveryPipeline {
    /// Fetch contributors of every seed repository and upsert them as
    /// Developers ranked by their total contributions.
    pub async fn discover_contributors(&self) -> Result<ContributorResult> {
        let mut result = ContributorResult::default();

        let fetched: Vec<_> = stream::iter(self.config.seed_repositories.iter().map(|repo| {
            let host = self.host.clone();
            async move { (repo, host.contributors(repo).await) }
        }))
        .buffer_unordered(self.concurrency())
        .collect()
        .await;

        let mut tallies: BTreeMap<String, Tally> = BTreeMap::new();
        for (repo, contributors) in fetched {
            let contributors = match contributors {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(repo = %repo, error = %e, "contributor listing failed");
                    result.errors.push(format!("contributors of {}: {}", repo, e));
                    continue;
                }
            };
            result.repos_processed += 1;

            for contributor in contributors {
                if contributor.is_bot {
                    result.bots_skipped += 1;
                    continue;
                }
                let tally = tallies.entry(contributor.login).or_default();
                tally.contributions += contributor.contributions;
                if !tally.source_repos.contains(repo) {
                    tally.source_repos.push(repo.clone());
                }
            }
        }

        for (username, tally) in tallies {
            let mut developer = Developer::new(&username, tally.contributions, tally.source_repos);
            // Keep scan counters of a developer seen on an earlier run
            match self.store.get_developer(&username).await {
                Ok(Some(existing)) => {
                    developer.repos_discovered = existing.repos_discovered;
                    developer.orgs_discovered = existing.orgs_discovered;
                    developer.last_scanned_at = existing.last_scanned_at;
                }
                Ok(None) => {}
                Err(e) => {
                    result.errors.push(format!("developer {}: {:#}", username, e));
                    continue;
                }
            }
            match self.store.upsert_developer(&developer).await {
                Ok(_) => result.developers_found += 1,
                Err(e) => result.errors.push(format!("developer {}: {:#}", username, e)),
            }
        }

        tracing::info!(
            repos = result.repos_processed,
            developers = result.developers_found,
            bots = result.bots_skipped,
            errors = result.errors.len(),
            "contributor discovery finished"
        );
        Ok(result)
    }
}
