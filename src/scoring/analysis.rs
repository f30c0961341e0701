//! Measurable facts about a block's markup
//!
//! The HTML is parsed once; every sub-scorer reads from the resulting
//! [`MarkupFacts`].

use regex::Regex;
use scraper::{ElementRef, Html};
use std::sync::OnceLock;

use crate::extraction::InteractivityFlags;

static RE_UTILITY: OnceLock<Regex> = OnceLock::new();
static RE_FIXED_WIDTH: OnceLock<Regex> = OnceLock::new();
static RE_KEBAB: OnceLock<Regex> = OnceLock::new();
static RE_BEM: OnceLock<Regex> = OnceLock::new();

/// Widths above this many pixels count as "very large fixed widths"
pub const LARGE_FIXED_WIDTH_PX: u32 = 1000;

const SECTIONING_TAGS: &[&str] = &[
    "section", "article", "nav", "aside", "header", "footer", "main", "figure",
];

const DEPRECATED_TAGS: &[&str] = &[
    "font", "center", "marquee", "blink", "big", "strike", "tt", "frame", "frameset", "acronym",
];

/// Class prefixes and attributes left behind by other front-end frameworks
const FRAMEWORK_CLASS_PREFIXES: &[&str] = &["ng-", "wp-block", "elementor", "svelte-", "css-"];
const FRAMEWORK_ATTR_PREFIXES: &[&str] = &[
    "data-reactroot",
    "data-reactid",
    "data-v-",
    "_ngcontent",
    "ng-",
    "v-",
    "x-data",
    "data-svelte",
];

#[derive(Debug, Clone, Default)]
pub struct MarkupFacts {
    pub html_len: usize,
    pub max_line_len: usize,

    pub inline_styles: usize,
    pub inline_scripts: usize,
    pub event_handlers: usize,
    pub aria_attrs: usize,

    pub images: usize,
    pub images_with_alt: usize,
    pub images_lazy: usize,
    pub images_dimensioned: usize,

    pub links: usize,
    pub valid_links: usize,

    /// Heading levels in document order
    pub headings: Vec<u8>,
    pub paragraphs: usize,
    pub lists: usize,
    /// `<li>` outside `<ul>`/`<ol>`
    pub orphan_list_items: usize,
    pub sectioning_tags: usize,

    pub pictures: usize,
    pub pictures_with_source: usize,
    pub srcsets: usize,

    pub class_tokens: Vec<String>,
    pub max_classes_on_element: usize,
    pub utility_classes: usize,

    pub deprecated_tags: usize,
    pub large_fixed_widths: usize,
    pub framework_artifacts: usize,

    /// Root div whose children are row divs of column divs
    pub canonical_structure: bool,
}

impl MarkupFacts {
    pub fn analyze(html: &str, flags: &InteractivityFlags) -> Self {
        let mut facts = MarkupFacts {
            html_len: html.len(),
            max_line_len: html.lines().map(|l| l.trim_end().len()).max().unwrap_or(0),
            ..Default::default()
        };

        let fragment = Html::parse_fragment(html);
        let root = fragment.root_element();

        for node in root.descendants() {
            let Some(el) = ElementRef::wrap(node) else {
                continue;
            };
            facts.visit(el);
        }

        facts.canonical_structure = root
            .children()
            .filter_map(ElementRef::wrap)
            .next()
            .map_or(false, is_canonical_block);

        // Flags come from extraction and may see markup outside this fragment
        if flags.inline_scripts && facts.inline_scripts == 0 {
            facts.inline_scripts = 1;
        }
        if flags.event_handlers && facts.event_handlers == 0 {
            facts.event_handlers = 1;
        }
        if flags.aria_interaction && facts.aria_attrs == 0 {
            facts.aria_attrs = 1;
        }

        facts
    }

    fn visit(&mut self, el: ElementRef) {
        let value = el.value();
        let tag = value.name();

        match tag {
            "html" => return,
            "script" => self.inline_scripts += 1,
            "img" => {
                self.images += 1;
                if value.attr("alt").is_some() {
                    self.images_with_alt += 1;
                }
                if value.attr("loading") == Some("lazy") {
                    self.images_lazy += 1;
                }
                if value.attr("width").is_some() && value.attr("height").is_some() {
                    self.images_dimensioned += 1;
                }
            }
            "a" => {
                self.links += 1;
                let valid = value.attr("href").map_or(false, |h| {
                    let h = h.trim();
                    !h.is_empty() && h != "#" && !h.to_ascii_lowercase().starts_with("javascript:")
                });
                if valid {
                    self.valid_links += 1;
                }
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                if let Some(level) = tag[1..].parse::<u8>().ok() {
                    self.headings.push(level);
                }
            }
            "p" => self.paragraphs += 1,
            "ul" | "ol" => self.lists += 1,
            "li" => {
                let in_list = el
                    .parent()
                    .and_then(ElementRef::wrap)
                    .map_or(false, |p| matches!(p.value().name(), "ul" | "ol"));
                if !in_list {
                    self.orphan_list_items += 1;
                }
            }
            "picture" => {
                self.pictures += 1;
                let has_source = el
                    .children()
                    .filter_map(ElementRef::wrap)
                    .any(|c| c.value().name() == "source");
                if has_source {
                    self.pictures_with_source += 1;
                }
            }
            _ => {}
        }

        if SECTIONING_TAGS.contains(&tag) {
            self.sectioning_tags += 1;
        }
        if DEPRECATED_TAGS.contains(&tag) {
            self.deprecated_tags += 1;
        }

        for (key, attr_value) in value.attrs() {
            match key {
                "style" => {
                    self.inline_styles += 1;
                    self.large_fixed_widths += count_large_widths(attr_value);
                }
                "width" => {
                    if attr_value.trim_end_matches("px").parse::<u32>().map_or(false, |w| w > LARGE_FIXED_WIDTH_PX)
                        && tag != "img"
                        && tag != "source"
                    {
                        self.large_fixed_widths += 1;
                    }
                }
                "srcset" => self.srcsets += 1,
                _ => {}
            }
            if key.len() > 2 && key.starts_with("on") {
                self.event_handlers += 1;
            }
            if key.starts_with("aria-") || key == "role" {
                self.aria_attrs += 1;
            }
            if FRAMEWORK_ATTR_PREFIXES.iter().any(|p| key.starts_with(p)) {
                self.framework_artifacts += 1;
            }
        }

        if let Some(class) = value.attr("class") {
            let tokens: Vec<&str> = class.split_whitespace().collect();
            self.max_classes_on_element = self.max_classes_on_element.max(tokens.len());
            let re_utility = utility_regex();
            for token in tokens {
                if re_utility.is_match(token) {
                    self.utility_classes += 1;
                }
                if FRAMEWORK_CLASS_PREFIXES.iter().any(|p| token.starts_with(p)) {
                    self.framework_artifacts += 1;
                }
                self.class_tokens.push(token.to_string());
            }
        }
    }

    pub fn has_headings(&self) -> bool {
        !self.headings.is_empty()
    }

    /// Heading levels never jump more than one level deeper
    pub fn heading_hierarchy_valid(&self) -> bool {
        self.headings
            .windows(2)
            .all(|pair| pair[1] <= pair[0] + 1)
    }

    /// Ratio helper that treats an empty denominator as fully satisfied
    pub fn ratio(part: usize, whole: usize) -> f64 {
        if whole == 0 {
            1.0
        } else {
            part as f64 / whole as f64
        }
    }

    /// `<picture>` with `<source>` plus `srcset` somewhere
    pub fn full_responsive_images(&self) -> bool {
        self.pictures_with_source > 0 && self.srcsets > 0
    }

    pub fn naming(&self) -> NamingConvention {
        if self.class_tokens.is_empty() {
            return NamingConvention::Plain;
        }
        let re_kebab = RE_KEBAB.get_or_init(|| Regex::new(r"^[a-z][a-z0-9]*(?:-[a-z0-9]+)*$").unwrap());
        let re_bem = RE_BEM.get_or_init(|| {
            Regex::new(r"^[a-z][a-z0-9]*(?:-[a-z0-9]+)*(?:__[a-z0-9]+(?:-[a-z0-9]+)*)?(?:--[a-z0-9]+(?:-[a-z0-9]+)*)?$")
                .unwrap()
        });

        let all_bem = self.class_tokens.iter().all(|t| re_bem.is_match(t));
        let uses_bem = self
            .class_tokens
            .iter()
            .any(|t| t.contains("__") || t.contains("--"));
        if all_bem && uses_bem {
            NamingConvention::Bem
        } else if self.class_tokens.iter().all(|t| re_kebab.is_match(t)) {
            NamingConvention::Kebab
        } else {
            NamingConvention::Plain
        }
    }
}

/// Class naming style, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingConvention {
    Bem,
    Kebab,
    Plain,
}

fn utility_regex() -> &'static Regex {
    RE_UTILITY.get_or_init(|| {
        Regex::new(
            r"^(?:[mp][trblxy]?-\d+|w-\d+|h-\d+|text-(?:xs|sm|lg|xl|\d?xl|left|right|center)|bg-[a-z]+-\d+|flex|inline-flex|grid|block|hidden|items-[a-z]+|justify-[a-z]+|gap-\d+|col-(?:xs|sm|md|lg)-\d+|d-[a-z]+)$",
        )
        .unwrap()
    })
}

fn count_large_widths(style: &str) -> usize {
    let re = RE_FIXED_WIDTH.get_or_init(|| {
        Regex::new(r"(?i)(?:^|[;\s])(?:min-)?width\s*:\s*(\d+)px").unwrap()
    });
    re.captures_iter(style)
        .filter(|cap| cap[1].parse::<u32>().map_or(false, |w| w > LARGE_FIXED_WIDTH_PX))
        .count()
}

fn is_canonical_block(root: ElementRef) -> bool {
    if root.value().name() != "div" || root.value().attr("class").is_none() {
        return false;
    }
    let rows: Vec<ElementRef> = root.children().filter_map(ElementRef::wrap).collect();
    !rows.is_empty()
        && rows.iter().all(|row| {
            row.value().name() == "div"
                && row
                    .children()
                    .filter_map(ElementRef::wrap)
                    .all(|col| col.value().name() == "div")
                && row.children().filter_map(ElementRef::wrap).next().is_some()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(html: &str) -> MarkupFacts {
        MarkupFacts::analyze(html, &InteractivityFlags::default())
    }

    #[test]
    fn test_image_and_link_counts() {
        let f = facts(
            r##"<div class="cards"><img src="a" alt="A" loading="lazy" width="10" height="10"><img src="b">
            <a href="/ok">ok</a><a href="#">bad</a><a>none</a></div>"##,
        );
        assert_eq!(f.images, 2);
        assert_eq!(f.images_with_alt, 1);
        assert_eq!(f.images_lazy, 1);
        assert_eq!(f.images_dimensioned, 1);
        assert_eq!(f.links, 3);
        assert_eq!(f.valid_links, 1);
    }

    #[test]
    fn test_heading_hierarchy() {
        assert!(facts("<div><h2>a</h2><h3>b</h3><h2>c</h2></div>").heading_hierarchy_valid());
        assert!(!facts("<div><h1>a</h1><h4>b</h4></div>").heading_hierarchy_valid());
    }

    #[test]
    fn test_canonical_structure() {
        assert!(facts(r#"<div class="cards"><div><div>a</div><div>b</div></div></div>"#).canonical_structure);
        assert!(!facts(r#"<div class="cards"><ul><li>a</li></ul></div>"#).canonical_structure);
        assert!(!facts(r#"<section class="cards"><div><div>a</div></div></section>"#).canonical_structure);
    }

    #[test]
    fn test_naming_conventions() {
        assert_eq!(facts(r#"<div class="card card__title card--wide"></div>"#).naming(), NamingConvention::Bem);
        assert_eq!(facts(r#"<div class="card-title hero"></div>"#).naming(), NamingConvention::Kebab);
        assert_eq!(facts(r#"<div class="CardTitle"></div>"#).naming(), NamingConvention::Plain);
    }

    #[test]
    fn test_artifacts_and_widths() {
        let f = facts(
            r#"<div class="wp-block-group" data-v-123 style="width: 1400px"><font>x</font><table width="1200"></table></div>"#,
        );
        assert_eq!(f.framework_artifacts, 2);
        assert_eq!(f.large_fixed_widths, 2);
        assert_eq!(f.deprecated_tags, 1);
    }

    #[test]
    fn test_flags_merge() {
        let flags = InteractivityFlags {
            inline_scripts: true,
            ..Default::default()
        };
        let f = MarkupFacts::analyze("<div></div>", &flags);
        assert_eq!(f.inline_scripts, 1);
    }
}
