//! Quality scoring configuration

use serde::{Deserialize, Serialize};

/// Score below which blocks are pruned in batch mode
pub const DEFAULT_PRUNE_FLOOR: u8 = 50;

/// Batch scoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Blocks scoring below this are deleted when pruning is requested
    pub prune_floor: u8,
    /// Prune low-quality blocks after scoring
    pub prune: bool,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            prune_floor: DEFAULT_PRUNE_FLOOR,
            prune: false,
        }
    }
}
