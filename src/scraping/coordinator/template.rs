//! Page template inference

use crate::types::TemplateType;

/// Path keywords checked in order; the first hit wins
const PATH_KEYWORDS: &[(TemplateType, &[&str])] = &[
    (
        TemplateType::Article,
        &["blog", "news", "article", "post", "insights", "stories", "press"],
    ),
    (
        TemplateType::Product,
        &["product", "shop", "catalog", "store", "pricing", "item"],
    ),
    (TemplateType::About, &["about", "team", "company", "who-we-are", "careers"]),
    (TemplateType::Contact, &["contact", "support", "help", "locations"]),
    (
        TemplateType::Landing,
        &["landing", "campaign", "promo", "offer", "lp"],
    ),
];

/// Classify a page from its path, falling back to HTML markers
pub(super) fn infer_template(path: &str, html: &str) -> TemplateType {
    let path = path.split('?').next().unwrap_or("").to_ascii_lowercase();
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() || trimmed == "index.html" {
        return TemplateType::Homepage;
    }

    let segments: Vec<&str> = trimmed.split(['/', '-', '_', '.']).collect();
    for (template, keywords) in PATH_KEYWORDS {
        let hit = keywords.iter().any(|k| {
            if k.contains('-') {
                trimmed.contains(k)
            } else {
                segments
                    .iter()
                    .any(|s| *s == *k || s.strip_suffix('s') == Some(*k))
            }
        });
        if hit {
            return *template;
        }
    }

    let html = html.to_ascii_lowercase();
    if html.contains("og:type\" content=\"article") || html.contains("<article") {
        TemplateType::Article
    } else if html.contains("schema.org/product") || html.contains("add-to-cart") {
        TemplateType::Product
    } else if html.contains("<form") && (html.contains("type=\"email\"") || html.contains("contact")) {
        TemplateType::Contact
    } else if html.contains("class=\"hero") && html.contains("cta") {
        TemplateType::Landing
    } else {
        TemplateType::Generic
    }
}
