//! Multi-axis block quality scoring
//!
//! [`QualityScorer`] rates one block's markup; [`BatchScorer`] scores every
//! block of a site, persists the results and optionally prunes weak blocks.

mod analysis;
mod axes;
mod batch;
mod types;

pub use analysis::{MarkupFacts, NamingConvention};
pub use batch::{BatchScoreResult, BatchScorer};
pub use types::{Axis, Issue, QualityBreakdown, QualityReport, QualityTier, Severity, WEIGHTS};

use crate::extraction::InteractivityFlags;

/// Scores block HTML on six axes
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityScorer;

impl QualityScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, html: &str, flags: &InteractivityFlags) -> QualityReport {
        let facts = MarkupFacts::analyze(html, flags);

        let (performance, mut issues) = axes::performance(&facts);
        let (accessibility, i) = axes::accessibility(&facts);
        issues.extend(i);
        let (semantic, i) = axes::semantic(&facts);
        issues.extend(i);
        let (code_quality, i) = axes::code_quality(&facts);
        issues.extend(i);
        let (responsiveness, i) = axes::responsiveness(&facts);
        issues.extend(i);
        let (compliance, i) = axes::compliance(&facts);
        issues.extend(i);

        let breakdown = QualityBreakdown {
            performance,
            accessibility,
            semantic,
            code_quality,
            responsiveness,
            compliance,
        };
        let overall = breakdown.overall();

        QualityReport {
            overall,
            breakdown,
            issues,
            tier: QualityTier::from_score(overall),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "",
        "<div></div>",
        r#"<div class="cards"><div><div><picture><source srcset="a.webp"><img src="a.jpg" alt="A" loading="lazy" width="4" height="3"></picture></div><div><h3>Title</h3><p><a href="/more">More</a></p></div></div></div>"#,
        r##"<font color="red"><center onclick="x()"><a href="#">x</a><li>y</li><h1>a</h1><h6>b</h6><script>alert(1)</script></center></font>"##,
        "<<<>>> not html at all &&&",
    ];

    #[test]
    fn test_overall_is_bounded_weighted_sum() {
        let scorer = QualityScorer::new();
        for html in SAMPLES {
            let report = scorer.score(html, &InteractivityFlags::default());
            assert!(report.overall <= 100);
            let expected: f64 = WEIGHTS
                .iter()
                .map(|(axis, w)| report.breakdown.get(*axis) as f64 * w)
                .sum();
            assert_eq!(report.overall, expected.round() as u8, "{}", html);
            assert_eq!(report.tier, QualityTier::from_score(report.overall));
        }
    }

    #[test]
    fn test_canonical_block_outscores_legacy_markup() {
        let scorer = QualityScorer::new();
        let good = scorer.score(SAMPLES[2], &InteractivityFlags::default());
        let bad = scorer.score(SAMPLES[3], &InteractivityFlags::default());
        assert!(good.overall > bad.overall);
        assert!(good.overall >= 85, "got {}", good.overall);
        assert!(bad.issues.iter().any(|i| i.severity == Severity::Error));
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let scorer = QualityScorer::new();
        let a = scorer.score(SAMPLES[2], &InteractivityFlags::default());
        let b = scorer.score(SAMPLES[2], &InteractivityFlags::default());
        assert_eq!(a, b);
    }
}
