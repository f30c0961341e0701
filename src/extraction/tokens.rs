//! Design-token and CSS custom-property extraction
//!
//! Works on the styling text of a block: inline `style` attributes, `<style>`
//! contents and presentational colour attributes, concatenated.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use super::types::DesignTokens;

static RE_HEX: OnceLock<Regex> = OnceLock::new();
static RE_FUNC_COLOR: OnceLock<Regex> = OnceLock::new();
static RE_FONT_FAMILY: OnceLock<Regex> = OnceLock::new();
static RE_SPACING: OnceLock<Regex> = OnceLock::new();
static RE_VAR_USAGE: OnceLock<Regex> = OnceLock::new();
static RE_VAR_DECL: OnceLock<Regex> = OnceLock::new();

fn push_unique(list: &mut Vec<String>, value: &str) {
    let value = value.trim();
    if !value.is_empty() && !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

/// Colors, font families and spacing values in `styles`
pub fn design_tokens(styles: &str) -> DesignTokens {
    let re_hex = RE_HEX.get_or_init(|| {
        Regex::new(r"#(?:[0-9a-fA-F]{8}|[0-9a-fA-F]{6}|[0-9a-fA-F]{3,4})\b").unwrap()
    });
    let re_func = RE_FUNC_COLOR
        .get_or_init(|| Regex::new(r"(?i)\b(?:rgba?|hsla?)\([^)]*\)").unwrap());
    let re_font = RE_FONT_FAMILY
        .get_or_init(|| Regex::new(r#"(?i)font-family\s*:\s*([^;}"]+)"#).unwrap());
    let re_spacing = RE_SPACING.get_or_init(|| {
        Regex::new(r#"(?i)(?:^|[\s;{"])(?:margin|padding|gap|row-gap|column-gap)(?:-(?:top|right|bottom|left|inline|block))?\s*:\s*([^;}"]+)"#)
            .unwrap()
    });

    let mut tokens = DesignTokens::default();
    for m in re_hex.find_iter(styles) {
        push_unique(&mut tokens.colors, &m.as_str().to_ascii_lowercase());
    }
    for m in re_func.find_iter(styles) {
        let normalized: String = m.as_str().split_whitespace().collect::<Vec<_>>().join(" ");
        push_unique(&mut tokens.colors, &normalized.to_ascii_lowercase());
    }
    for cap in re_font.captures_iter(styles) {
        push_unique(&mut tokens.fonts, &cap[1]);
    }
    for cap in re_spacing.captures_iter(styles) {
        push_unique(&mut tokens.spacing, &cap[1]);
    }
    tokens
}

/// CSS custom properties referenced or declared in `styles`.
///
/// `var(--x, fallback)` records the fallback (empty when absent); a
/// `--x: value` declaration overrides it.
pub fn css_variables(styles: &str) -> BTreeMap<String, String> {
    let re_usage = RE_VAR_USAGE.get_or_init(|| {
        Regex::new(r"var\(\s*(--[A-Za-z0-9_-]+)\s*(?:,\s*([^)]*))?\)").unwrap()
    });
    let re_decl = RE_VAR_DECL
        .get_or_init(|| Regex::new(r#"(--[A-Za-z0-9_-]+)\s*:\s*([^;}"]+)"#).unwrap());

    let mut vars = BTreeMap::new();
    for cap in re_usage.captures_iter(styles) {
        let fallback = cap.get(2).map(|m| m.as_str().trim()).unwrap_or("");
        let entry = vars.entry(cap[1].to_string()).or_insert_with(String::new);
        if entry.is_empty() {
            *entry = fallback.to_string();
        }
    }
    for cap in re_decl.captures_iter(styles) {
        vars.insert(cap[1].to_string(), cap[2].trim().to_string());
    }
    vars
}
