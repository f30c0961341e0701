//! Quality scoring types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis weights in the overall score. They sum to 1.
pub const WEIGHTS: [(Axis, f64); 6] = [
    (Axis::Performance, 0.25),
    (Axis::Accessibility, 0.20),
    (Axis::Semantic, 0.15),
    (Axis::CodeQuality, 0.15),
    (Axis::Responsiveness, 0.15),
    (Axis::Compliance, 0.10),
];

/// One scoring dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Performance,
    Accessibility,
    Semantic,
    CodeQuality,
    Responsiveness,
    Compliance,
}

impl Axis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Performance => "performance",
            Self::Accessibility => "accessibility",
            Self::Semantic => "semantic",
            Self::CodeQuality => "code_quality",
            Self::Responsiveness => "responsiveness",
            Self::Compliance => "compliance",
        }
    }
}

/// Quality tier from the overall score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Gold,
    Silver,
    Bronze,
    Unrated,
}

impl QualityTier {
    /// `>= 98` gold, `>= 93` silver, `>= 85` bronze
    pub fn from_score(score: u8) -> Self {
        match score {
            98..=u8::MAX => Self::Gold,
            93..=97 => Self::Silver,
            85..=92 => Self::Bronze,
            _ => Self::Unrated,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gold => "gold",
            Self::Silver => "silver",
            Self::Bronze => "bronze",
            Self::Unrated => "unrated",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-axis scores, each 0-100
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityBreakdown {
    pub performance: u8,
    pub accessibility: u8,
    pub semantic: u8,
    pub code_quality: u8,
    pub responsiveness: u8,
    pub compliance: u8,
}

impl QualityBreakdown {
    pub fn get(&self, axis: Axis) -> u8 {
        match axis {
            Axis::Performance => self.performance,
            Axis::Accessibility => self.accessibility,
            Axis::Semantic => self.semantic,
            Axis::CodeQuality => self.code_quality,
            Axis::Responsiveness => self.responsiveness,
            Axis::Compliance => self.compliance,
        }
    }

    /// Weighted sum of the axes, rounded
    pub fn overall(&self) -> u8 {
        let sum: f64 = WEIGHTS
            .iter()
            .map(|(axis, weight)| self.get(*axis) as f64 * weight)
            .sum();
        sum.round().clamp(0.0, 100.0) as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A finding reported by a sub-scorer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub axis: Axis,
    pub severity: Severity,
    pub message: String,
}

/// Full scoring result for one block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityReport {
    pub overall: u8,
    pub breakdown: QualityBreakdown,
    pub issues: Vec<Issue>,
    pub tier: QualityTier,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(QualityTier::from_score(100), QualityTier::Gold);
        assert_eq!(QualityTier::from_score(98), QualityTier::Gold);
        assert_eq!(QualityTier::from_score(97), QualityTier::Silver);
        assert_eq!(QualityTier::from_score(93), QualityTier::Silver);
        assert_eq!(QualityTier::from_score(92), QualityTier::Bronze);
        assert_eq!(QualityTier::from_score(85), QualityTier::Bronze);
        assert_eq!(QualityTier::from_score(84), QualityTier::Unrated);
        assert_eq!(QualityTier::from_score(0), QualityTier::Unrated);
    }

    #[test]
    fn test_weights_sum_to_one() {
        let total: f64 = WEIGHTS.iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_overall_is_weighted_sum() {
        let b = QualityBreakdown {
            performance: 80,
            accessibility: 70,
            semantic: 60,
            code_quality: 60,
            responsiveness: 40,
            compliance: 100,
        };
        // 20 + 14 + 9 + 9 + 6 + 10
        assert_eq!(b.overall(), 68);

        let perfect = QualityBreakdown {
            performance: 100,
            accessibility: 100,
            semantic: 100,
            code_quality: 100,
            responsiveness: 100,
            compliance: 100,
        };
        assert_eq!(perfect.overall(), 100);
    }
}
