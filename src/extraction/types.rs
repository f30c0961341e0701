//! Extraction types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Styling values found in a block's markup, each list de-duplicated in
/// first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignTokens {
    pub colors: Vec<String>,
    pub fonts: Vec<String>,
    pub spacing: Vec<String>,
}

impl DesignTokens {
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty() && self.fonts.is_empty() && self.spacing.is_empty()
    }
}

/// Role of an element in a content model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Image,
    Link,
    List,
    Element,
}

impl ContentKind {
    pub fn for_tag(tag: &str) -> Self {
        match tag {
            "img" | "picture" | "source" | "svg" | "video" | "figure" => Self::Image,
            "a" => Self::Link,
            "ul" | "ol" | "li" | "dl" | "dt" | "dd" => Self::List,
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "p" | "span" | "strong" | "em" | "b"
            | "i" | "blockquote" | "figcaption" | "label" | "small" | "code" | "pre" => Self::Text,
            _ => Self::Element,
        }
    }
}

/// One distinct tag+class pair of a block, in first-seen order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentNode {
    pub tag: String,
    pub class: Option<String>,
    pub kind: ContentKind,
    /// Nesting depth below the block root
    pub depth: usize,
}

/// Client-side behaviour detected in a block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractivityFlags {
    pub inline_scripts: bool,
    pub event_handlers: bool,
    pub aria_interaction: bool,
}

impl InteractivityFlags {
    /// Whether the block needs JavaScript to behave
    pub fn has_javascript(&self) -> bool {
        self.inline_scripts || self.event_handlers || self.aria_interaction
    }
}

/// A block found in one page
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedBlock {
    pub name: String,
    /// Suffix of a `{name}-{variant}` class token
    pub variant: Option<String>,
    /// Number of earlier blocks on the page with the same name.
    ///
    /// Stays put when unrelated blocks are added or removed above it.
    pub ordinal: usize,
    pub raw_html: String,
    pub clean_html: String,
    pub design_tokens: DesignTokens,
    pub content_model: Vec<ContentNode>,
    pub css_variables: BTreeMap<String, String>,
    pub interactivity: InteractivityFlags,
}
