//! Block extraction
//!
//! Turns stored page HTML into Block records:
//! - `BlockExtractor`: section/block detection over a parsed DOM
//! - `tokens`: colours, fonts, spacing and CSS custom properties
//! - `clean`: cleaned HTML, interactivity flags, content-model skeleton
//! - `SiteExtractor`: per-site stage persisting blocks and the design system

mod clean;
mod extractor;
mod pipeline;
mod tokens;
mod types;

pub use extractor::{is_block_name, variant_of, BlockExtractor, DENY_LIST, SECTION_CLASS};
pub use pipeline::{roll_up_design_system, SiteExtractionResult, SiteExtractor, DETECTOR};
pub use tokens::{css_variables, design_tokens};
pub use types::*;
