//! Section and block detection
//!
//! Pages follow a section/block convention: top-level `section` containers
//! hold blocks whose first class token is the block name, optionally followed
//! by a `{name}-{variant}` token. Detection is best-effort; markup that does
//! not fit is skipped.

use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

use super::clean;
use super::tokens;
use super::types::ExtractedBlock;

/// Class keyword marking a section container
pub const SECTION_CLASS: &str = "section";

/// Section-prefixed classes that are not sections
pub const SECTION_COMPOUND_EXCLUSIONS: &[&str] = &["section-metadata"];

/// First class tokens never treated as block names
pub const DENY_LIST: &[&str] = &[
    "section",
    "section-metadata",
    "default-content-wrapper",
    "button-container",
    "button",
    "icon",
    "block",
    "row",
    "col",
    "column",
    "container",
    "wrapper",
    "inner",
    "content",
    "clearfix",
    "hidden",
    "visually-hidden",
    "sr-only",
    "flex",
    "grid",
    "img",
    "image",
    "picture",
];

/// Utility suffixes of layout wrappers
const WRAPPER_SUFFIXES: &[&str] = &["-wrapper", "-container"];

/// Detects blocks in page HTML
pub struct BlockExtractor {
    /// `[class]` and `main`
    selectors: Option<(Selector, Selector)>,
}

impl Default for BlockExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockExtractor {
    pub fn new() -> Self {
        let selectors = match (Selector::parse("[class]"), Selector::parse("main")) {
            (Ok(classed), Ok(main)) => Some((classed, main)),
            _ => None,
        };
        Self { selectors }
    }

    /// Extract blocks from one page, in document order
    pub fn extract(&self, html: &str) -> Vec<ExtractedBlock> {
        let Some((classed, main)) = &self.selectors else {
            return Vec::new();
        };
        let document = Html::parse_document(html);

        let mut scopes: Vec<ElementRef> = document
            .select(classed)
            .filter(|el| {
                is_section(el)
                    && !el
                        .ancestors()
                        .filter_map(ElementRef::wrap)
                        .any(|a| is_section(&a))
            })
            .collect();
        if scopes.is_empty() {
            scopes.extend(document.select(main).next());
        }

        let mut blocks = Vec::new();
        for scope in scopes {
            let mut seen_names: HashSet<String> = HashSet::new();
            scan(scope, &mut seen_names, &mut blocks);
        }

        blocks
    }
}

/// Walk `parent` in document order. An accepted block's subtree belongs to
/// it and is not scanned further.
fn scan(parent: ElementRef, seen_names: &mut HashSet<String>, blocks: &mut Vec<ExtractedBlock>) {
    for el in parent.children().filter_map(ElementRef::wrap) {
        let tokens: Vec<&str> = el
            .value()
            .attr("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default();

        if let Some(name) = tokens.first().copied() {
            if is_block_name(name) && seen_names.insert(name.to_string()) {
                let variant = tokens.get(1).and_then(|t| variant_of(name, t));
                let ordinal = blocks.iter().filter(|b| b.name == name).count();
                blocks.push(build_block(el, name, variant, ordinal));
                continue;
            }
        }
        scan(el, seen_names, blocks);
    }
}

fn is_section(el: &ElementRef) -> bool {
    let Some(first) = el.value().attr("class").and_then(|c| c.split_whitespace().next()) else {
        return false;
    };
    first.starts_with(SECTION_CLASS) && !SECTION_COMPOUND_EXCLUSIONS.contains(&first)
}

/// Whether a first class token can name a block
pub fn is_block_name(name: &str) -> bool {
    if DENY_LIST.contains(&name) || name.starts_with("icon-") {
        return false;
    }
    if WRAPPER_SUFFIXES.iter().any(|s| name.ends_with(s)) {
        return false;
    }
    name.chars().next().map_or(false, |c| c.is_ascii_alphabetic())
}

/// Variant suffix when `token` is `{name}-{variant}`
pub fn variant_of(name: &str, token: &str) -> Option<String> {
    let suffix = token.strip_prefix(name)?.strip_prefix('-')?;
    if suffix.is_empty() || suffix == "wrapper" {
        return None;
    }
    Some(suffix.to_string())
}

fn build_block(el: ElementRef, name: &str, variant: Option<String>, ordinal: usize) -> ExtractedBlock {
    let styles = clean::style_text(el);
    ExtractedBlock {
        name: name.to_string(),
        variant,
        ordinal,
        raw_html: el.html(),
        clean_html: clean::clean_html(el),
        design_tokens: tokens::design_tokens(&styles),
        content_model: clean::content_model(el),
        css_variables: tokens::css_variables(&styles),
        interactivity: clean::interactivity(el),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body><header class="nav">nav</header><main>
        <div class="section hero-container">
          <div class="hero-wrapper">
            <div class="hero hero-dark block" data-block-name="hero" style="background: #002b5c">
              <div><div><picture><img src="h.jpg" alt="Hero"></picture><h1>Title</h1></div></div>
            </div>
          </div>
          <div class="default-content-wrapper"><p class="button-container"><a class="button" href="/go">Go</a></p></div>
          <div class="section-metadata"><div><div>Style</div><div>dark</div></div></div>
        </div>
        <div class="section">
          <div class="cards-wrapper">
            <div class="cards block">
              <ul><li><div class="cards-card-image"><img src="c.jpg" alt="c"></div></li></ul>
            </div>
          </div>
          <div class="columns columns-wrapper">
            <div><div>one</div><div>two</div></div>
          </div>
          <div class="cards block"><p>second cards in the same section</p></div>
        </div>
    </main></body></html>"#;

    fn names(blocks: &[ExtractedBlock]) -> Vec<(String, Option<String>)> {
        blocks.iter().map(|b| (b.name.clone(), b.variant.clone())).collect()
    }

    #[test]
    fn test_ordinal_counts_same_named_blocks_only() {
        let html = r#"<main>
            <div class="section"><div class="banner"><p>new</p></div><div class="cards"><p>a</p></div></div>
            <div class="section"><div class="hero"><p>h</p></div><div class="cards"><p>b</p></div></div>
        </main>"#;
        let blocks = BlockExtractor::new().extract(html);
        let keys: Vec<(&str, usize)> = blocks.iter().map(|b| (b.name.as_str(), b.ordinal)).collect();
        assert_eq!(keys, vec![("banner", 0), ("cards", 0), ("hero", 0), ("cards", 1)]);
    }

    #[test]
    fn test_sections_and_blocks() {
        let blocks = BlockExtractor::new().extract(PAGE);
        assert_eq!(
            names(&blocks),
            vec![
                ("hero".to_string(), Some("dark".to_string())),
                ("cards".to_string(), None),
                ("columns".to_string(), None),
            ]
        );
        assert!(blocks.iter().all(|b| b.ordinal == 0));
        assert_eq!(blocks[0].design_tokens.colors, vec!["#002b5c"]);
        assert!(!blocks[0].clean_html.contains("style="));
        assert!(blocks[0].clean_html.contains("data-block-name=\"hero\""));
    }

    #[test]
    fn test_main_fallback_without_sections() {
        let html = r#"<main><div class="teaser"><p>x</p></div><div class="icon icon-search"></div></main>"#;
        let blocks = BlockExtractor::new().extract(html);
        assert_eq!(names(&blocks), vec![("teaser".to_string(), None)]);
    }

    #[test]
    fn test_no_main_no_sections_is_empty() {
        assert!(BlockExtractor::new().extract("<div class=\"x\"></div>").is_empty());
        assert!(BlockExtractor::new().extract("").is_empty());
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let extractor = BlockExtractor::new();
        let first = extractor.extract(PAGE);
        let second = extractor.extract(PAGE);
        assert_eq!(names(&first), names(&second));
        assert_eq!(first, second);
    }

    #[test]
    fn test_variant_rules() {
        assert_eq!(variant_of("cards", "cards-horizontal"), Some("horizontal".to_string()));
        assert_eq!(variant_of("cards", "cards-wrapper"), None);
        assert_eq!(variant_of("cards", "block"), None);
        assert_eq!(variant_of("cards", "cards-"), None);
    }

    #[test]
    fn test_block_name_rules() {
        assert!(is_block_name("hero"));
        assert!(!is_block_name("hero-wrapper"));
        assert!(!is_block_name("hero-container"));
        assert!(!is_block_name("button"));
        assert!(!is_block_name("icon-search"));
        assert!(!is_block_name("2col"));
    }
}
