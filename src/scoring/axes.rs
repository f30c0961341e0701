//! The six sub-scorers
//!
//! Each starts from a baseline, adds or subtracts bounded deltas for the
//! signals it reads from [`MarkupFacts`], and clamps to 0..=100.

use super::analysis::{MarkupFacts, NamingConvention};
use super::types::{Axis, Issue, Severity};

/// Markup above this size is penalized as oversized
pub const OVERSIZED_HTML_BYTES: usize = 50_000;
/// Markup below this size earns the small-payload bonus
pub const SMALL_HTML_BYTES: usize = 5_000;
/// Lines longer than this count as poor formatting
pub const LONG_LINE_CHARS: usize = 500;
/// More classes than this on one element is penalized
pub const MAX_CLASSES_PER_ELEMENT: usize = 5;
/// More utility classes than this is treated as spam
pub const UTILITY_CLASS_LIMIT: usize = 10;

/// Running score for one axis
struct Tally {
    axis: Axis,
    score: i32,
    issues: Vec<Issue>,
}

impl Tally {
    fn new(axis: Axis, baseline: i32) -> Self {
        Self {
            axis,
            score: baseline,
            issues: Vec::new(),
        }
    }

    fn add(&mut self, delta: i32) {
        self.score += delta;
    }

    fn issue(&mut self, delta: i32, severity: Severity, message: impl Into<String>) {
        self.score += delta;
        self.issues.push(Issue {
            axis: self.axis,
            severity,
            message: message.into(),
        });
    }

    fn finish(self) -> (u8, Vec<Issue>) {
        (self.score.clamp(0, 100) as u8, self.issues)
    }
}

/// Scale `ratio` in 0..=1 to at most `max` points
fn scaled(ratio: f64, max: i32) -> i32 {
    (ratio.clamp(0.0, 1.0) * max as f64).round() as i32
}

pub fn performance(f: &MarkupFacts) -> (u8, Vec<Issue>) {
    let mut t = Tally::new(Axis::Performance, 60);

    if f.inline_styles == 0 {
        t.add(10);
    } else {
        t.issue(
            -(f.inline_styles.min(5) as i32) * 2,
            Severity::Warning,
            format!("{} inline style attribute(s)", f.inline_styles),
        );
    }

    if f.inline_scripts == 0 {
        t.add(10);
    } else {
        t.issue(-15, Severity::Error, "inline scripts in block markup");
    }

    if f.html_len > OVERSIZED_HTML_BYTES {
        t.issue(
            -15,
            Severity::Warning,
            format!("oversized markup ({} bytes)", f.html_len),
        );
    } else if f.html_len < SMALL_HTML_BYTES {
        t.add(10);
    }

    if f.images > 0 {
        t.add(scaled(MarkupFacts::ratio(f.images_lazy, f.images), 5));
        let dimensioned = MarkupFacts::ratio(f.images_dimensioned, f.images);
        t.add(scaled(dimensioned, 5));
        if dimensioned < 1.0 {
            t.issue(0, Severity::Info, "images without explicit width and height");
        }
    } else {
        t.add(10);
    }

    t.finish()
}

pub fn accessibility(f: &MarkupFacts) -> (u8, Vec<Issue>) {
    let mut t = Tally::new(Axis::Accessibility, 50);

    if f.images > 0 {
        let coverage = MarkupFacts::ratio(f.images_with_alt, f.images);
        t.add(scaled(coverage, 20));
        if coverage < 1.0 {
            t.issue(
                -10,
                Severity::Error,
                format!("{} image(s) missing alt text", f.images - f.images_with_alt),
            );
        }
    } else {
        t.add(20);
    }

    if f.links > 0 {
        let valid = MarkupFacts::ratio(f.valid_links, f.links);
        t.add(scaled(valid, 15));
        if valid < 1.0 {
            t.issue(
                -5,
                Severity::Warning,
                format!("{} link(s) with empty or bare '#' target", f.links - f.valid_links),
            );
        }
    } else {
        t.add(15);
    }

    if f.has_headings() {
        t.add(10);
    } else {
        t.issue(0, Severity::Info, "no headings");
    }

    if f.aria_attrs > 0 {
        t.add(5);
    }

    t.finish()
}

pub fn semantic(f: &MarkupFacts) -> (u8, Vec<Issue>) {
    let mut t = Tally::new(Axis::Semantic, 50);

    if f.has_headings() {
        if f.heading_hierarchy_valid() {
            t.add(15);
        } else {
            t.issue(-10, Severity::Warning, "heading levels skip");
        }
    }

    if f.lists > 0 {
        t.add(10);
    }
    if f.orphan_list_items > 0 {
        t.issue(
            -10,
            Severity::Error,
            format!("{} <li> outside a list", f.orphan_list_items),
        );
    }

    if f.sectioning_tags > 0 {
        t.add(10);
    }
    if f.pictures > 0 {
        t.add(10);
    }
    if f.paragraphs > 0 {
        t.add(5);
    }

    t.finish()
}

pub fn code_quality(f: &MarkupFacts) -> (u8, Vec<Issue>) {
    let mut t = Tally::new(Axis::CodeQuality, 50);

    match f.naming() {
        NamingConvention::Bem => t.add(20),
        NamingConvention::Kebab => t.add(15),
        NamingConvention::Plain => {
            t.add(5);
            if !f.class_tokens.is_empty() {
                t.issue(0, Severity::Info, "inconsistent class naming");
            }
        }
    }

    if f.utility_classes > UTILITY_CLASS_LIMIT {
        t.issue(
            -15,
            Severity::Warning,
            format!("{} utility classes", f.utility_classes),
        );
    }
    if f.max_classes_on_element > MAX_CLASSES_PER_ELEMENT {
        t.issue(
            -5,
            Severity::Info,
            format!("{} classes on a single element", f.max_classes_on_element),
        );
    }

    if f.event_handlers == 0 {
        t.add(10);
    } else {
        t.issue(-10, Severity::Warning, "inline event handlers");
    }

    if f.deprecated_tags == 0 {
        t.add(10);
    } else {
        t.issue(
            -15,
            Severity::Error,
            format!("{} deprecated tag(s)", f.deprecated_tags),
        );
    }

    if f.max_line_len <= LONG_LINE_CHARS {
        t.add(5);
    } else {
        t.issue(-5, Severity::Info, "very long lines");
    }

    t.finish()
}

pub fn responsiveness(f: &MarkupFacts) -> (u8, Vec<Issue>) {
    let mut t = Tally::new(Axis::Responsiveness, 60);

    if f.full_responsive_images() {
        t.add(25);
    } else if f.pictures > 0 || f.srcsets > 0 {
        t.add(10);
    } else if f.images > 0 {
        t.issue(-10, Severity::Info, "images without picture/srcset");
    }

    if f.large_fixed_widths == 0 {
        t.add(15);
    } else {
        t.issue(
            -(f.large_fixed_widths.min(3) as i32) * 10,
            Severity::Warning,
            format!("{} fixed width(s) above 1000px", f.large_fixed_widths),
        );
    }

    t.finish()
}

pub fn compliance(f: &MarkupFacts) -> (u8, Vec<Issue>) {
    let mut t = Tally::new(Axis::Compliance, 40);

    if f.canonical_structure {
        t.add(25);
    } else {
        t.issue(0, Severity::Info, "not a block/row/column div structure");
    }

    if f.full_responsive_images() {
        t.add(10);
    }

    if f.framework_artifacts == 0 {
        t.add(15);
    } else {
        t.issue(
            -15,
            Severity::Warning,
            format!("{} other-framework artifact(s)", f.framework_artifacts),
        );
    }

    if f.valid_links == f.links {
        t.add(10);
    }

    t.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::InteractivityFlags;

    fn facts(html: &str) -> MarkupFacts {
        MarkupFacts::analyze(html, &InteractivityFlags::default())
    }

    #[test]
    fn test_alt_text_drives_accessibility() {
        let with_alt = accessibility(&facts(r#"<div class="a"><img src="x" alt="x"></div>"#)).0;
        let without = accessibility(&facts(r#"<div class="a"><img src="x"></div>"#));
        assert!(with_alt > without.0);
        assert!(without.1.iter().any(|i| i.severity == Severity::Error));
    }

    #[test]
    fn test_inline_script_lowers_performance() {
        let clean = performance(&facts(r#"<div class="a"><p>x</p></div>"#)).0;
        let scripted = performance(&facts(r#"<div class="a"><script>x()</script></div>"#)).0;
        assert!(scripted < clean);
    }

    #[test]
    fn test_naming_ranks_code_quality() {
        let bem = code_quality(&facts(r#"<div class="card card__body"></div>"#)).0;
        let kebab = code_quality(&facts(r#"<div class="card card-body"></div>"#)).0;
        let plain = code_quality(&facts(r#"<div class="Card cardBody"></div>"#)).0;
        assert!(bem > kebab);
        assert!(kebab > plain);
    }

    #[test]
    fn test_div_structure_not_penalized_semantically() {
        let divs = semantic(&facts(r#"<div class="a"><div><div>x</div></div></div>"#));
        assert_eq!(divs.0, 50);
        assert!(divs.1.is_empty());
    }

    #[test]
    fn test_fixed_widths_lower_responsiveness() {
        let fluid = responsiveness(&facts(r#"<div class="a"></div>"#)).0;
        let fixed = responsiveness(&facts(r#"<div class="a" style="width: 1600px"></div>"#)).0;
        assert_eq!(fluid, 75);
        assert_eq!(fixed, 50);
    }

    #[test]
    fn test_scores_stay_in_range() {
        let worst = facts(
            r##"<font><li><a href="#">x</a></li><center onclick="x()"><script>1</script></center>
            <div class="ng-x m-1 p-2 w-4 h-8 flex grid block hidden gap-2 mt-3 mb-4" style="width:2000px;min-width:3000px"></div>
            <h1>a</h1><h5>b</h5><img src="a"><img src="b"></font>"##,
        );
        for (score, _) in [
            performance(&worst),
            accessibility(&worst),
            semantic(&worst),
            code_quality(&worst),
            responsiveness(&worst),
            compliance(&worst),
        ] {
            assert!(score <= 100);
        }
    }
}
