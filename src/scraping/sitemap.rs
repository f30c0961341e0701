//! Sitemap parsing
//!
//! Handles both `<urlset>` documents and `<sitemapindex>` documents. Index
//! documents are followed one level deep, into at most
//! [`MAX_CHILD_SITEMAPS`] children.

use quick_xml::events::Event;
use quick_xml::Reader;
use url::Url;

use super::fetcher::PageFetcher;

/// Child sitemaps followed per sitemap index
pub const MAX_CHILD_SITEMAPS: usize = 5;

/// One `<url>` entry of a sitemap
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: Option<String>,
    pub priority: Option<f32>,
}

/// A parsed sitemap document
#[derive(Debug, Clone, PartialEq)]
pub enum SitemapDocument {
    /// `<sitemapindex>`: locations of child sitemaps
    Index(Vec<String>),
    /// `<urlset>`: page entries
    UrlSet(Vec<SitemapEntry>),
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    None,
    Loc,
    Lastmod,
    Priority,
}

/// Parse sitemap XML without touching the network
pub fn parse_sitemap_xml(xml: &str) -> Result<SitemapDocument, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut is_index = false;
    let mut children = Vec::new();
    let mut entries = Vec::new();

    let mut current: Option<SitemapEntry> = None;
    let mut in_sitemap = false;
    let mut field = Field::None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"sitemapindex" => is_index = true,
                b"sitemap" => in_sitemap = true,
                b"url" => {
                    current = Some(SitemapEntry {
                        loc: String::new(),
                        lastmod: None,
                        priority: None,
                    })
                }
                b"loc" => field = Field::Loc,
                b"lastmod" => field = Field::Lastmod,
                b"priority" => field = Field::Priority,
                _ => {}
            },
            Event::Text(e) => {
                let text = e.unescape()?.trim().to_string();
                apply_text(&mut current, &mut children, in_sitemap, field, text);
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e.into_inner()).trim().to_string();
                apply_text(&mut current, &mut children, in_sitemap, field, text);
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"loc" | b"lastmod" | b"priority" => field = Field::None,
                b"sitemap" => in_sitemap = false,
                b"url" => {
                    if let Some(entry) = current.take() {
                        if !entry.loc.is_empty() {
                            entries.push(entry);
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if is_index {
        Ok(SitemapDocument::Index(children))
    } else {
        Ok(SitemapDocument::UrlSet(entries))
    }
}

fn apply_text(
    current: &mut Option<SitemapEntry>,
    children: &mut Vec<String>,
    in_sitemap: bool,
    field: Field,
    text: String,
) {
    if text.is_empty() {
        return;
    }
    if in_sitemap {
        if field == Field::Loc {
            children.push(text);
        }
        return;
    }
    if let Some(entry) = current.as_mut() {
        match field {
            Field::Loc => entry.loc = text,
            Field::Lastmod => entry.lastmod = Some(text),
            Field::Priority => entry.priority = text.parse().ok(),
            Field::None => {}
        }
    }
}

/// Fetch and parse a sitemap, following an index into at most
/// [`MAX_CHILD_SITEMAPS`] children.
///
/// Unreachable or malformed sitemaps yield an empty list.
pub async fn parse_sitemap(fetcher: &dyn PageFetcher, url: &str) -> Vec<SitemapEntry> {
    match fetch_document(fetcher, url).await {
        Some(SitemapDocument::UrlSet(entries)) => entries,
        Some(SitemapDocument::Index(children)) => {
            if children.len() > MAX_CHILD_SITEMAPS {
                tracing::debug!(
                    sitemap = url,
                    children = children.len(),
                    "sitemap index truncated to {} children",
                    MAX_CHILD_SITEMAPS
                );
            }
            let mut entries = Vec::new();
            for child in children.iter().take(MAX_CHILD_SITEMAPS) {
                // Nested indexes are not followed further
                if let Some(SitemapDocument::UrlSet(child_entries)) =
                    fetch_document(fetcher, child).await
                {
                    entries.extend(child_entries);
                }
            }
            entries
        }
        None => Vec::new(),
    }
}

async fn fetch_document(fetcher: &dyn PageFetcher, url: &str) -> Option<SitemapDocument> {
    let parsed = match Url::parse(url) {
        Ok(u) => u,
        Err(e) => {
            tracing::debug!(sitemap = url, "invalid sitemap URL: {}", e);
            return None;
        }
    };

    let response = match fetcher.fetch(&parsed).await {
        Ok(r) if r.is_success() => r,
        Ok(r) => {
            tracing::debug!(sitemap = url, status = r.status_code, "sitemap not available");
            return None;
        }
        Err(e) => {
            tracing::debug!(sitemap = url, "sitemap fetch failed: {}", e);
            return None;
        }
    };

    match parse_sitemap_xml(&response.body) {
        Ok(doc) => Some(doc),
        Err(e) => {
            tracing::debug!(sitemap = url, "malformed sitemap: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticFetcher;

    const URLSET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url>
    <loc>https://example.com/</loc>
    <lastmod>2024-05-01</lastmod>
    <priority>1.0</priority>
  </url>
  <url>
    <loc>https://example.com/about?a=1&amp;b=2</loc>
  </url>
</urlset>"#;

    fn index_with(children: usize) -> String {
        let mut xml = String::from(r#"<?xml version="1.0"?><sitemapindex>"#);
        for i in 0..children {
            xml.push_str(&format!(
                "<sitemap><loc>https://example.com/sitemap-{}.xml</loc></sitemap>",
                i
            ));
        }
        xml.push_str("</sitemapindex>");
        xml
    }

    #[test]
    fn test_parse_urlset() {
        let doc = parse_sitemap_xml(URLSET).unwrap();
        let SitemapDocument::UrlSet(entries) = doc else {
            panic!("expected urlset");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].loc, "https://example.com/");
        assert_eq!(entries[0].lastmod.as_deref(), Some("2024-05-01"));
        assert_eq!(entries[0].priority, Some(1.0));
        assert_eq!(entries[1].loc, "https://example.com/about?a=1&b=2");
        assert_eq!(entries[1].priority, None);
    }

    #[test]
    fn test_parse_index() {
        let doc = parse_sitemap_xml(&index_with(2)).unwrap();
        assert_eq!(
            doc,
            SitemapDocument::Index(vec![
                "https://example.com/sitemap-0.xml".to_string(),
                "https://example.com/sitemap-1.xml".to_string(),
            ])
        );
    }

    #[tokio::test]
    async fn test_index_follows_at_most_five_children() {
        let fetcher = StaticFetcher::new();
        fetcher.add_page("https://example.com/sitemap.xml", &index_with(7));
        for i in 0..7 {
            fetcher.add_page(
                &format!("https://example.com/sitemap-{}.xml", i),
                &format!(
                    "<urlset><url><loc>https://example.com/page-{}</loc></url></urlset>",
                    i
                ),
            );
        }

        let entries = parse_sitemap(&fetcher, "https://example.com/sitemap.xml").await;
        assert_eq!(entries.len(), 5);
        assert_eq!(fetcher.request_count("https://example.com/sitemap-5.xml"), 0);
        assert_eq!(fetcher.request_count("https://example.com/sitemap-6.xml"), 0);
    }

    #[tokio::test]
    async fn test_unreachable_or_malformed_is_empty() {
        let fetcher = StaticFetcher::new();
        fetcher.add_page("https://example.com/broken.xml", "<urlset><url><loc>x</url>");

        assert!(parse_sitemap(&fetcher, "https://example.com/missing.xml").await.is_empty());
        assert!(parse_sitemap(&fetcher, "https://example.com/broken.xml").await.is_empty());
        assert!(parse_sitemap(&fetcher, "not a url").await.is_empty());
    }
}
